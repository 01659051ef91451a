use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Mapping from logical resource key to content fingerprint.
///
/// Produced by the build and fixed for the lifetime of one worker version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTable {
    entries: BTreeMap<String, String>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_json(&contents)?;
        debug!(path = %path.display(), count = table.len(), "Loaded resource table");
        Ok(table)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Snapshot of the resource table from the last completed activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    table: ResourceTable,
}

impl Manifest {
    pub fn snapshot(table: &ResourceTable) -> Self {
        Self {
            table: table.clone(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        self.table.to_json()
    }

    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.table.fingerprint(key)
    }

    /// A cached resource may be reused only if the key is still published and
    /// its fingerprint did not change since this manifest was written.
    pub fn is_current(&self, key: &str, current: &ResourceTable) -> bool {
        match current.fingerprint(key) {
            Some(fingerprint) => self.fingerprint(key) == Some(fingerprint),
            None => false,
        }
    }

    /// Keys whose fingerprint differs from `current`, or that `current` dropped.
    pub fn changed_keys<'a>(&'a self, current: &'a ResourceTable) -> Vec<&'a str> {
        self.table
            .keys()
            .filter(|key| !self.is_current(key, current))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
