//! File-backed cache storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<namespace>/index.json        name + URL -> entry metadata
//! <root>/<namespace>/<sha256>.body     response body, named by URL digest
//! ```
//!
//! Files are written to a temporary name and renamed into place, so a reader
//! never sees a half-written index or body.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CacheEntry, CacheStorage};
use crate::error::{CacheError, Result};
use crate::net::Response;

const INDEX_FILE: &str = "index.json";
const BODY_EXTENSION: &str = "body";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    body_file: String,
    response_url: String,
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NamespaceIndex {
    name: String,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

impl NamespaceIndex {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

pub struct DiskStorage {
    root: PathBuf,
    // Serializes read-modify-write cycles on index files.
    write_lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `namespace`. Distinct names always map to distinct
    /// directories: bytes outside `[A-Za-z0-9.-]`, `_` itself and a leading
    /// `.` are escaped as `_xx`.
    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        if namespace.is_empty() {
            return self.root.join("_");
        }
        let mut dir_name = String::with_capacity(namespace.len());
        for (i, byte) in namespace.bytes().enumerate() {
            let keep = byte.is_ascii_alphanumeric() || byte == b'-' || (byte == b'.' && i > 0);
            if keep {
                dir_name.push(char::from(byte));
            } else {
                dir_name.push_str(&format!("_{:02x}", byte));
            }
        }
        self.root.join(dir_name)
    }

    fn body_file_name(url: &str) -> String {
        format!("{}.{}", hex::encode(Sha256::digest(url.as_bytes())), BODY_EXTENSION)
    }

    async fn load_index(&self, namespace: &str) -> Result<Option<NamespaceIndex>> {
        let path = self.namespace_dir(namespace).join(INDEX_FILE);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let index: NamespaceIndex = serde_json::from_slice(&contents).map_err(|e| {
            CacheError::Storage(format!("Failed to parse index {}: {}", path.display(), e))
        })?;
        Ok(Some(index))
    }

    async fn save_index(&self, namespace: &str, index: &NamespaceIndex) -> Result<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await?;
        let contents = serde_json::to_vec_pretty(index)?;
        write_atomic(&dir.join(INDEX_FILE), &contents).await
    }

    async fn load_or_create_index(&self, namespace: &str) -> Result<NamespaceIndex> {
        Ok(self
            .load_index(namespace)
            .await?
            .unwrap_or_else(|| NamespaceIndex::empty(namespace)))
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.load_index(namespace).await?.is_none() {
            debug!(namespace = namespace, "Creating cache namespace");
            self.save_index(namespace, &NamespaceIndex::empty(namespace))
                .await?;
        }
        Ok(())
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        Ok(self.load_index(namespace).await?.is_some())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => {
                debug!(namespace = namespace, "Deleted cache namespace");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let index_path = item.path().join(INDEX_FILE);
            match fs::read(&index_path).await {
                Ok(contents) => match serde_json::from_slice::<NamespaceIndex>(&contents) {
                    Ok(index) => names.push(index.name),
                    Err(e) => {
                        warn!(path = %index_path.display(), error = %e, "Skipping unreadable cache index")
                    }
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .load_index(namespace)
            .await?
            .map(|index| index.entries.into_keys().collect())
            .unwrap_or_default())
    }

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<CacheEntry>> {
        let Some(index) = self.load_index(namespace).await? else {
            return Ok(None);
        };
        let Some(stored) = index.entries.get(url) else {
            return Ok(None);
        };
        let body_path = self.namespace_dir(namespace).join(&stored.body_file);
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(namespace = namespace, url = url, "Cache index points at a missing body");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(CacheEntry {
            response: Response {
                url: stored.response_url.clone(),
                status: stored.status,
                headers: stored.headers.clone(),
                body,
            },
            cached_at: stored.cached_at,
        }))
    }

    async fn put(&self, namespace: &str, url: &str, response: Response) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_or_create_index(namespace).await?;
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await?;

        let body_file = Self::body_file_name(url);
        write_atomic(&dir.join(&body_file), &response.body).await?;

        index.entries.insert(
            url.to_string(),
            StoredEntry {
                body_file,
                response_url: response.url,
                status: response.status,
                headers: response.headers,
                cached_at: Utc::now(),
            },
        );
        self.save_index(namespace, &index).await
    }

    async fn delete(&self, namespace: &str, url: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut index) = self.load_index(namespace).await? else {
            return Ok(false);
        };
        let Some(stored) = index.entries.remove(url) else {
            return Ok(false);
        };
        self.save_index(namespace, &index).await?;

        let body_path = self.namespace_dir(namespace).join(&stored.body_file);
        if let Err(e) = fs::remove_file(&body_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %body_path.display(), error = %e, "Failed to remove cached body");
            }
        }
        Ok(true)
    }
}
