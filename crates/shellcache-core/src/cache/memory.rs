use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheStorage};
use crate::error::Result;
use crate::net::Response;

type Namespace = BTreeMap<String, CacheEntry>;

/// In-process cache storage.
///
/// Keys are listed in URL order rather than insertion order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    caches: RwLock<BTreeMap<String, Namespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        self.caches
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        Ok(self.caches.read().await.contains_key(namespace))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.caches.write().await.remove(namespace).is_some())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .caches
            .read()
            .await
            .get(namespace)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    async fn put(&self, namespace: &str, url: &str, response: Response) -> Result<()> {
        self.caches
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(url.to_string(), CacheEntry::new(response));
        Ok(())
    }

    async fn delete(&self, namespace: &str, url: &str) -> Result<bool> {
        Ok(self
            .caches
            .write()
            .await
            .get_mut(namespace)
            .map(|entries| entries.remove(url).is_some())
            .unwrap_or(false))
    }
}
