use crate::{error::Result, util};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Plain = 0,
    Obfuscated = 1,
    Compressed = 2,
}

impl FileType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Plain),
            1 => Some(Self::Obfuscated),
            2 => Some(Self::Compressed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: u32,
    pub size_compressed: u32,
    pub size_original: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractable {
    pub name_hash: u64,
    pub file_type: FileType,
    pub file_name: Option<String>,
    pub location: Option<Location>,
}

impl Extractable {
    pub fn new(
        name_hash: u64,
        file_type: FileType,
        file_name: Option<String>,
    ) -> Self {
        Self {
            name_hash,
            file_type,
            file_name,
            location: None,
        }
    }

    pub fn from_name(name: &str, file_type: FileType) -> Result<Self> {
        Ok(Self::new(
            util::name_hash(name)?,
            file_type,
            Some(name.to_owned()),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    Extractable(Extractable),
    /// Plain or obfuscated entry whose name is unknown. Its offset and sizes
    /// are masked with name bytes and can not be recovered.
    Unresolved { name_hash: u64, file_type: FileType },
}

impl FileEntry {
    pub fn name_hash(&self) -> u64 {
        match self {
            Self::Extractable(entry) => entry.name_hash,
            Self::Unresolved { name_hash, .. } => *name_hash,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::Extractable(entry) => entry.file_type,
            Self::Unresolved { file_type, .. } => *file_type,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.as_extractable()?.file_name.as_deref()
    }

    pub fn is_extractable(&self) -> bool {
        matches!(self, Self::Extractable(_))
    }

    pub fn as_extractable(&self) -> Option<&Extractable> {
        match self {
            Self::Extractable(entry) => Some(entry),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn as_extractable_mut(&mut self) -> Option<&mut Extractable> {
        match self {
            Self::Extractable(entry) => Some(entry),
            Self::Unresolved { .. } => None,
        }
    }
}
