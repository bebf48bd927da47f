use crate::{error::Result, util};
use anyhow::Context;
use std::{collections::HashMap, path::Path};

pub trait NameLookup: Send + Sync {
    fn lookup(&self, name_hash: u64) -> Option<&str>;
}

impl NameLookup for HashMap<u64, String> {
    fn lookup(&self, name_hash: u64) -> Option<&str> {
        self.get(&name_hash).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameDictionary {
    names: HashMap<u64, String>,
}

impl NameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dictionary = Self::new();
        for name in names {
            let name = name.into();
            if let Err(err) = dictionary.insert(name) {
                log::warn!("Skipping file name: {}", err);
            }
        }
        dictionary
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let list = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read name list {:?}", path))?;
        let dictionary = Self::from_names(
            list.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        );
        log::info!("Loaded {} file names from {:?}", dictionary.len(), path);
        Ok(dictionary)
    }

    pub fn insert(&mut self, name: String) -> Result<u64> {
        let name_hash = util::name_hash(&name)?;
        if let Some(previous) = self.names.get(&name_hash) {
            if *previous != name {
                log::warn!(
                    "Hash collision {:016X}: {:?} replaces {:?}",
                    name_hash,
                    name,
                    previous
                );
            }
        }
        self.names.insert(name_hash, name);
        Ok(name_hash)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameLookup for NameDictionary {
    fn lookup(&self, name_hash: u64) -> Option<&str> {
        self.names.lookup(name_hash)
    }
}
