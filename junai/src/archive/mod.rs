pub mod content;
pub mod entry;
pub mod manifest;
pub mod table;

pub use content::{read_content, write_content, SCRIPT_HASH};
pub use entry::{Extractable, FileEntry, FileType, Location};
pub use manifest::{Conversion, Manifest, ManifestEntry, MANIFEST_FILE_NAME};
pub use table::{ArchiveTable, RawEntry};

use crate::{
    cursor::ByteCursor,
    dictionary::NameLookup,
    error::Result,
    resource::tlg::{InnerFormat, Tag, TlgFormat, TlgImage},
    util,
};
use anyhow::Context;
use bytes::Bytes;
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator,
};
use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
};

#[derive(Debug)]
pub struct Archive {
    data: Bytes,
    table: ArchiveTable,
}

impl Archive {
    pub fn open(path: &Path, names: &dyn NameLookup) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Could not read {:?}", path))?;
        let archive = Self::from_bytes(Bytes::from(data), names)
            .with_context(|| format!("Could not parse {:?}", path))?;
        Ok(archive)
    }

    pub fn from_bytes(data: Bytes, names: &dyn NameLookup) -> Result<Self> {
        let mut cursor = ByteCursor::new(data.clone());
        let table = ArchiveTable::decode(&mut cursor, names)?;
        Ok(Self { data, table })
    }

    pub fn table(&self) -> &ArchiveTable {
        &self.table
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.table.entries
    }

    pub fn extract(&self, entry: &Extractable) -> Result<Vec<u8>> {
        read_content(&mut ByteCursor::new(self.data.clone()), entry)
    }

    pub fn unpack(
        &self,
        output_dir: &Path,
        convert: bool,
    ) -> anyhow::Result<Manifest> {
        self.unpack_with(output_dir, convert, |_| ())
    }

    pub fn unpack_with<F>(
        &self,
        output_dir: &Path,
        convert: bool,
        on_entry: F,
    ) -> anyhow::Result<Manifest>
    where
        F: Fn(&ManifestEntry) + Sync + Send,
    {
        let plan = OutputPlan::new(&self.table.entries);
        let entries = self
            .table
            .entries
            .par_iter()
            .zip(plan.paths.par_iter())
            .enumerate()
            .map(|(index, (entry, path))| -> anyhow::Result<ManifestEntry> {
                let manifest_entry = match (entry, path) {
                    (FileEntry::Extractable(entry), Some(path)) => self
                        .unpack_entry(
                            index, entry, path, &plan, output_dir, convert,
                        )?,
                    _ => unresolved_entry(index, entry),
                };
                on_entry(&manifest_entry);
                Ok(manifest_entry)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let manifest = Manifest::new(entries);
        manifest.save(output_dir)?;
        log::info!(
            "Unpacked {}/{} entries to {:?}",
            self.table.extractable_count(),
            self.table.entries.len(),
            output_dir
        );
        Ok(manifest)
    }

    fn unpack_entry(
        &self,
        index: usize,
        entry: &Extractable,
        path: &Path,
        plan: &OutputPlan,
        output_dir: &Path,
        convert: bool,
    ) -> anyhow::Result<ManifestEntry> {
        let mut path = path.to_path_buf();
        let mut buf = self
            .extract(entry)
            .with_context(|| format!("Could not extract {:?}", path))?;
        let mut conversion = None;
        if convert {
            if let Some(format) = TlgFormat::detect(&buf) {
                let mut png_path = path.clone().into_os_string();
                png_path.push(".png");
                let png_path = PathBuf::from(png_path);
                if plan.is_taken(&png_path) {
                    log::warn!(
                        "Not converting {:?}, {:?} is another entry",
                        path,
                        png_path
                    );
                } else {
                    match tlg_to_png(&buf) {
                        Ok((png, tags)) => {
                            path = png_path;
                            buf = png;
                            conversion = Some(Conversion::Tlg { format, tags });
                        }
                        Err(e) => log::warn!(
                            "Could not convert {:?}, saving as is: {:#}",
                            path,
                            e
                        ),
                    }
                }
            }
        }
        log::debug!("Extracting resource: {:?} {:X?}", path, entry);
        util::save_file(&output_dir.join(&path), &buf)?;
        Ok(ManifestEntry {
            index,
            file_type: entry.file_type,
            name_hash: entry.name_hash,
            file_name: entry.file_name.clone(),
            path: Some(path),
            conversion,
        })
    }
}

fn unresolved_entry(index: usize, entry: &FileEntry) -> ManifestEntry {
    log::warn!(
        "Skipping unresolved {:?} entry {:016x}",
        entry.file_type(),
        entry.name_hash()
    );
    ManifestEntry {
        index,
        file_type: entry.file_type(),
        name_hash: entry.name_hash(),
        file_name: None,
        path: None,
        conversion: None,
    }
}

// Unique per run, never the manifest file
#[derive(Debug)]
struct OutputPlan {
    paths: Vec<Option<PathBuf>>,
    taken: HashSet<PathBuf>,
}

impl OutputPlan {
    fn new(entries: &[FileEntry]) -> Self {
        let mut taken = HashSet::new();
        taken.insert(PathBuf::from(MANIFEST_FILE_NAME));
        let paths = entries
            .iter()
            .map(|entry| -> Option<PathBuf> {
                let entry = entry.as_extractable()?;
                let mut path = output_path(entry);
                if path.as_os_str().is_empty() || taken.contains(&path) {
                    let renamed = fallback_path(&taken, entry.name_hash);
                    log::warn!(
                        "Output path {:?} of {:016x} is taken, using {:?}",
                        path,
                        entry.name_hash,
                        renamed
                    );
                    path = renamed;
                }
                taken.insert(path.clone());
                Some(path)
            })
            .collect();
        Self { paths, taken }
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.taken.contains(path)
    }
}

fn output_path(entry: &Extractable) -> PathBuf {
    match &entry.file_name {
        Some(name) => Path::new(&name.replace('\\', "/"))
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect(),
        None => PathBuf::from(format!("{:016x}.dat", entry.name_hash)),
    }
}

fn fallback_path(taken: &HashSet<PathBuf>, name_hash: u64) -> PathBuf {
    std::iter::once(format!("{:016x}.dat", name_hash))
        .chain((1..).map(|n| format!("{:016x}.{}.dat", name_hash, n)))
        .map(PathBuf::from)
        .find(|path| !taken.contains(path))
        .unwrap_or_default()
}

fn tlg_to_png(buf: &[u8]) -> anyhow::Result<(Vec<u8>, Vec<Tag>)> {
    let TlgImage {
        width,
        height,
        pixels,
        tags,
    } = TlgImage::from_bytes(buf)?;
    Ok((util::image::raw_to_png(width, height, pixels)?, tags))
}

/// Unresolved entries stay in the returned table but are not written.
pub fn repack(
    input_dir: &Path,
    manifest: &Manifest,
    output_path: &Path,
) -> anyhow::Result<ArchiveTable> {
    let contents = manifest
        .entries
        .par_iter()
        .map(|entry| load_entry(input_dir, entry))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut table = ArchiveTable::new(
        manifest
            .entries
            .iter()
            .map(ManifestEntry::to_file_entry)
            .collect(),
    );
    let mut cursor = ByteCursor::new(Vec::new());
    cursor.seek(table.encoded_size());
    for (entry, content) in table.entries.iter_mut().zip(&contents) {
        if let (Some(entry), Some(content)) = (entry.as_extractable_mut(), content)
        {
            write_content(&mut cursor, entry, content).with_context(|| {
                format!("Could not write entry {:016x}", entry.name_hash)
            })?;
        }
    }
    cursor.seek(0);
    table.encode(&mut cursor)?;
    util::save_file(output_path, cursor.get_ref())?;
    log::info!(
        "Packed {}/{} entries into {:?}",
        table.extractable_count(),
        table.entries.len(),
        output_path
    );
    Ok(table)
}

fn load_entry(
    input_dir: &Path,
    entry: &ManifestEntry,
) -> anyhow::Result<Option<Vec<u8>>> {
    let path = match &entry.path {
        Some(path) => input_dir.join(path),
        None => return Ok(None),
    };
    let buf = std::fs::read(&path)
        .with_context(|| format!("Could not read {:?}", path))?;
    let buf = match &entry.conversion {
        None => buf,
        Some(Conversion::Tlg { format, tags }) => {
            let (width, height, pixels) = util::image::png_to_raw(&buf)
                .with_context(|| format!("Could not decode {:?}", path))?;
            let mut image = TlgImage::new(width, height, pixels);
            match format {
                TlgFormat::Tlg0 => {
                    image.tags = tags.clone();
                    image.to_bytes()?
                }
                TlgFormat::Tlg5 | TlgFormat::Tlg6 => {
                    InnerFormat::Tlg5.encode(&image)?
                }
            }
        }
    };
    Ok(Some(buf))
}
