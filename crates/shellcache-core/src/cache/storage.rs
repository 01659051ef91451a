use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::debug;

use super::CacheEntry;
use crate::error::{CacheError, Result};
use crate::key::cache_url;
use crate::net::{Fetcher, Request, Response};

/// Maximum number of concurrent fetches issued by [`Cache::add_all`].
const MAX_CONCURRENT_FETCHES: usize = 8;

/// Backend holding named cache namespaces of URL -> response entries.
///
/// Every individual operation is atomic. Writing to a namespace that does not
/// exist creates it; reading from one yields nothing.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn open(&self, namespace: &str) -> Result<()>;

    async fn has(&self, namespace: &str) -> Result<bool>;

    /// Remove the namespace and every entry in it. Returns whether it existed.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    async fn namespaces(&self) -> Result<Vec<String>>;

    /// Request URLs stored in the namespace.
    async fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<CacheEntry>>;

    /// Store `response` under `url`, replacing any previous entry.
    async fn put(&self, namespace: &str, url: &str, response: Response) -> Result<()>;

    async fn delete(&self, namespace: &str, url: &str) -> Result<bool>;
}

/// Handle on one opened namespace.
#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl Cache {
    pub async fn open(storage: Arc<dyn CacheStorage>, name: &str) -> Result<Self> {
        storage.open(name).await?;
        Ok(Self {
            storage,
            name: name.to_string(),
        })
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.storage.keys(&self.name).await
    }

    /// Look up the entry for `url`, ignoring its fragment.
    pub async fn match_url(&self, url: &str) -> Result<Option<Response>> {
        Ok(self
            .storage
            .get(&self.name, cache_url(url))
            .await?
            .map(CacheEntry::into_response))
    }

    /// Store `response` under `url` without its fragment.
    pub async fn put(&self, url: &str, response: Response) -> Result<()> {
        self.storage.put(&self.name, cache_url(url), response).await
    }

    pub async fn delete(&self, url: &str) -> Result<bool> {
        self.storage.delete(&self.name, cache_url(url)).await
    }

    /// Fetch every request and store the responses, all or nothing.
    ///
    /// Nothing is written unless every fetch succeeded with an ok status.
    /// Returns the number of entries stored.
    pub async fn add_all(&self, fetcher: &dyn Fetcher, requests: Vec<Request>) -> Result<usize> {
        if requests.is_empty() {
            return Ok(0);
        }
        debug!(cache = %self.name, count = requests.len(), "Fetching resources");

        let results: Vec<Result<(String, Response)>> = stream::iter(requests)
            .map(|request| async move {
                let response = fetcher.fetch(&request).await?;
                Ok::<_, CacheError>((request.url.to_string(), response))
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for result in results {
            let (url, response) = result?;
            if !response.is_ok() {
                return Err(CacheError::bad_status(&url, response.status));
            }
            fetched.push((url, response));
        }

        let count = fetched.len();
        for (url, response) in fetched {
            self.put(&url, response).await?;
        }
        Ok(count)
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("name", &self.name).finish()
    }
}
