use super::entry::{Extractable, FileEntry, FileType, Location};
use crate::{
    cursor::ByteCursor,
    dictionary::NameLookup,
    error::{JunaiError, Result},
    util,
};
use scroll::{Pread, Pwrite, LE};

pub const ENTRY_COUNT_KEY: u32 = 0x26ACA46E;
pub const ENTRY_SIZE: usize = 21;

#[derive(Debug, Clone, Copy, Pread, Pwrite)]
struct TableRow {
    name_hash: u64,
    file_type: u8,
    offset: u32,
    size_compressed: u32,
    size_original: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    pub name_hash: u64,
    pub file_type: FileType,
    pub offset: u32,
    pub size_compressed: u32,
    pub size_original: u32,
}

impl RawEntry {
    pub fn read<T: AsRef<[u8]>>(cursor: &mut ByteCursor<T>) -> Result<Self> {
        let row = cursor
            .read_bytes(ENTRY_SIZE)?
            .pread_with::<TableRow>(0, LE)?;
        let value = row.file_type ^ row.name_hash as u8;
        let file_type = FileType::from_u8(value).ok_or(
            JunaiError::UnknownFileType {
                name_hash: row.name_hash,
                value,
            },
        )?;
        let hash_mask = row.name_hash as u32;
        Ok(Self {
            name_hash: row.name_hash,
            file_type,
            offset: row.offset ^ hash_mask,
            size_compressed: row.size_compressed ^ hash_mask,
            size_original: row.size_original ^ hash_mask,
        })
    }

    pub fn resolve(self, names: &dyn NameLookup) -> Result<FileEntry> {
        let file_name = names.lookup(self.name_hash).map(str::to_owned);
        let mut fields = [self.offset, self.size_compressed, self.size_original];
        if self.file_type != FileType::Compressed {
            match &file_name {
                Some(name) => apply_name_mask(&mut fields, name)?,
                None => {
                    log::debug!(
                        "Unresolved {:?} entry {:016X}",
                        self.file_type,
                        self.name_hash
                    );
                    return Ok(FileEntry::Unresolved {
                        name_hash: self.name_hash,
                        file_type: self.file_type,
                    });
                }
            }
        }
        let [offset, size_compressed, size_original] = fields;
        Ok(FileEntry::Extractable(Extractable {
            name_hash: self.name_hash,
            file_type: self.file_type,
            file_name,
            location: Some(Location {
                offset,
                size_compressed,
                size_original,
            }),
        }))
    }
}

fn apply_name_mask(fields: &mut [u32; 3], name: &str) -> Result<()> {
    let name_bytes = util::encode_name(name)?;
    let len = name_bytes.len();
    if len == 0 {
        return Err(JunaiError::InvalidName(name.to_owned()));
    }
    fields[0] ^= name_bytes[len >> 1] as u32;
    fields[1] ^= name_bytes[len >> 2] as u32;
    fields[2] ^= name_bytes[len >> 3] as u32;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveTable {
    pub entries: Vec<FileEntry>,
}

impl ArchiveTable {
    pub fn new(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    pub fn decode<T: AsRef<[u8]>>(
        cursor: &mut ByteCursor<T>,
        names: &dyn NameLookup,
    ) -> Result<Self> {
        if cursor.tell() != 0 {
            return Err(JunaiError::InvalidState(format!(
                "File table must be read from offset 0, cursor is at {:#X}",
                cursor.tell()
            )));
        }
        let entry_count = cursor.read_u32_le()? ^ ENTRY_COUNT_KEY;
        log::debug!("Entry count: {}", entry_count);

        let mut entries = Vec::with_capacity(
            (entry_count as usize).min(cursor.remaining() / ENTRY_SIZE),
        );
        for _ in 0..entry_count {
            entries.push(RawEntry::read(cursor)?.resolve(names)?);
        }
        let table = Self { entries };
        log::debug!(
            "Resolved {}/{} entries",
            table.extractable_count(),
            entry_count
        );
        Ok(table)
    }

    /// Unresolved entries are not written; the entry count only covers the
    /// rows that are.
    pub fn encode(&self, cursor: &mut ByteCursor<Vec<u8>>) -> Result<()> {
        if cursor.tell() != 0 {
            return Err(JunaiError::InvalidState(format!(
                "File table must be written at offset 0, cursor is at {:#X}",
                cursor.tell()
            )));
        }
        let entry_count = util::checked_u32(self.extractable_count(), "Entry count")?;
        cursor.write_u32_le(entry_count ^ ENTRY_COUNT_KEY)?;

        let mut row = [0; ENTRY_SIZE];
        for entry in &self.entries {
            match entry {
                FileEntry::Extractable(entry) => {
                    row.pwrite_with(encode_row(entry)?, 0, LE)?;
                    cursor.write_bytes(&row);
                }
                FileEntry::Unresolved { name_hash, .. } => {
                    log::warn!("Ignoring unextractable file {:016x}", name_hash);
                }
            }
        }
        Ok(())
    }

    pub fn extractable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_extractable()).count()
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.extractable_count() * ENTRY_SIZE
    }

    pub fn extractable(&self) -> impl Iterator<Item = &Extractable> + '_ {
        self.entries.iter().filter_map(FileEntry::as_extractable)
    }
}

fn encode_row(entry: &Extractable) -> Result<TableRow> {
    let location = entry.location.ok_or_else(|| {
        JunaiError::InvalidState(format!(
            "Entry {:016X} has no content location yet",
            entry.name_hash
        ))
    })?;
    let mut fields = [
        location.offset,
        location.size_compressed,
        location.size_original,
    ];
    if entry.file_type != FileType::Compressed {
        let name = entry.file_name.as_deref().ok_or_else(|| {
            JunaiError::InvalidState(format!(
                "{:?} entry {:016X} needs a file name",
                entry.file_type, entry.name_hash
            ))
        })?;
        apply_name_mask(&mut fields, name)?;
    }
    let hash_mask = entry.name_hash as u32;
    Ok(TableRow {
        name_hash: entry.name_hash,
        file_type: entry.file_type as u8 ^ entry.name_hash as u8,
        offset: fields[0] ^ hash_mask,
        size_compressed: fields[1] ^ hash_mask,
        size_original: fields[2] ^ hash_mask,
    })
}
