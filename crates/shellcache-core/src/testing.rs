//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::{CacheEntry, CacheStorage, MemoryStorage};
use crate::error::{CacheError, Result};
use crate::key::cache_url;
use crate::net::{Fetcher, Request, Response};

/// Fetcher answering from a fixed URL -> response table.
///
/// Unknown URLs and any request made while offline fail with a network error.
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Response>>,
    online: AtomicBool,
    requests: Mutex<Vec<Request>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(self, url: &str, body: &str) -> Self {
        self.set_response(url, Response::ok(url, body));
        self
    }

    pub fn serve_status(self, url: &str, status: u16) -> Self {
        self.set_response(url, Response::new(url, status, "error"));
        self
    }

    pub fn set_response(&self, url: &str, response: Response) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.online.load(Ordering::SeqCst) {
            return Err(CacheError::Network("offline".to_string()));
        }
        self.responses
            .lock()
            .unwrap()
            .get(cache_url(request.url.as_str()))
            .cloned()
            .ok_or_else(|| CacheError::Network(format!("no route to {}", request.url)))
    }
}

/// Memory storage whose writes to one namespace can be made to fail.
#[derive(Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    fail_puts_to: Mutex<Option<String>>,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts_to(&self, namespace: Option<&str>) {
        *self.fail_puts_to.lock().unwrap() = namespace.map(str::to_string);
    }
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        self.inner.open(namespace).await
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        self.inner.has(namespace).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        self.inner.delete_namespace(namespace).await
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        self.inner.namespaces().await
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        self.inner.keys(namespace).await
    }

    async fn get(&self, namespace: &str, url: &str) -> Result<Option<CacheEntry>> {
        self.inner.get(namespace, url).await
    }

    async fn put(&self, namespace: &str, url: &str, response: Response) -> Result<()> {
        let failing = self.fail_puts_to.lock().unwrap().clone();
        if failing.as_deref() == Some(namespace) {
            return Err(CacheError::Storage(format!("quota exceeded in {}", namespace)));
        }
        self.inner.put(namespace, url, response).await
    }

    async fn delete(&self, namespace: &str, url: &str) -> Result<bool> {
        self.inner.delete(namespace, url).await
    }
}
