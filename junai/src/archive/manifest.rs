use super::entry::{Extractable, FileEntry, FileType};
use crate::resource::tlg::{Tag, TlgFormat};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by_key(|entry| entry.index);
        Self { entries }
    }

    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let file = File::open(&path)
            .with_context(|| format!("Could not open {:?}", path))?;
        let manifest: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse {:?}", path))?;
        Ok(manifest)
    }

    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE_NAME);
        let file = File::create(&path)
            .with_context(|| format!("Could not create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub file_type: FileType,
    pub name_hash: u64,
    pub file_name: Option<String>,
    /// Relative to the unpack directory. `None` for unresolved entries.
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<Conversion>,
}

impl ManifestEntry {
    pub fn to_file_entry(&self) -> FileEntry {
        match self.path {
            Some(_) => FileEntry::Extractable(Extractable::new(
                self.name_hash,
                self.file_type,
                self.file_name.clone(),
            )),
            None => FileEntry::Unresolved {
                name_hash: self.name_hash,
                file_type: self.file_type,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conversion {
    Tlg { format: TlgFormat, tags: Vec<Tag> },
}
