//! The cache manager: install, activate, fetch and message handlers.
//!
//! Install fetches the app shell into the temp namespace. Activate reconciles
//! the content namespace against the manifest persisted by the previous
//! version, so resources whose fingerprint did not change survive an upgrade
//! without being downloaded again. Fetch serves published resources from the
//! content namespace, except the root document which is fetched online first.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use super::lifecycle::{Lifecycle, WorkerState};
use super::message::{Message, MessageOutcome};
use crate::cache::{Cache, CacheStorage};
use crate::config::{WorkerConfig, MANIFEST_KEY};
use crate::error::{CacheError, Result};
use crate::key::{logical_key, request_key, resource_url, ROOT_KEY};
use crate::net::{CacheMode, Fetcher, Request, Response};
use crate::resources::Manifest;

/// How an activation treated the existing content namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    /// No prior manifest: content was cleared and rebuilt from the app shell.
    Fresh,
    /// Prior manifest found: only stale entries were evicted.
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub mode: ActivationMode,
    /// Resource keys evicted from the content namespace.
    pub evicted: Vec<String>,
    /// Number of app-shell entries copied from temp into content.
    pub copied: usize,
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not ours to answer; the host performs the request normally.
    PassThrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { source, .. } => Some(*source),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, FetchOutcome::PassThrough)
    }
}

/// Snapshot of the namespaces for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub content_entries: usize,
    pub temp_entries: usize,
    pub manifest: Option<Manifest>,
    /// Published resource keys with no entry in the content namespace.
    pub missing: Vec<String>,
}

/// Cache worker for one version of the web bundle.
///
/// Clone is cheap; clones share storage, fetcher and lifecycle state.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: RwLock<Lifecycle>,
}

impl CacheManager {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                storage,
                fetcher,
                lifecycle: RwLock::new(Lifecycle::new()),
            }),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Current lifecycle snapshot.
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner
            .lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_lifecycle(&self, f: impl FnOnce(&mut Lifecycle)) {
        let mut lifecycle = self
            .inner
            .lifecycle
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut lifecycle);
    }

    fn set_state(&self, state: WorkerState) {
        debug!(state = ?state, "Worker state changed");
        self.update_lifecycle(|l| l.set_state(state));
    }

    async fn open(&self, namespace: &str) -> Result<Cache> {
        Cache::open(Arc::clone(&self.inner.storage), namespace).await
    }

    async fn content(&self) -> Result<Cache> {
        self.open(&self.config().namespaces().content).await
    }

    fn resource_request(&self, key: &str) -> Result<Request> {
        Ok(Request::get(resource_url(self.config().scope(), key)?))
    }

    // ===== Install =====

    /// Fetch the app shell into the temp namespace.
    ///
    /// Requests skip-waiting first. Every shell file is fetched bypassing HTTP
    /// caches; if any of them fails, nothing is stored and this version
    /// becomes redundant. Returns the number of files stored.
    pub async fn on_install(&self) -> Result<usize> {
        self.update_lifecycle(|l| l.skip_waiting());
        self.set_state(WorkerState::Installing);

        match self.install_app_shell().await {
            Ok(stored) => {
                info!(files = stored, "Installed app shell");
                self.set_state(WorkerState::Installed);
                Ok(stored)
            }
            Err(e) => {
                error!(error = %e, "Failed to install app shell");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn install_app_shell(&self) -> Result<usize> {
        let temp = self.open(&self.config().namespaces().temp).await?;
        let requests = self
            .config()
            .app_shell()
            .iter()
            .map(|key| Ok(self.resource_request(key)?.with_cache_mode(CacheMode::Reload)))
            .collect::<Result<Vec<_>>>()?;
        temp.add_all(self.inner.fetcher.as_ref(), requests).await
    }

    // ===== Activate =====

    /// Reconcile the content namespace with this version's resource table.
    ///
    /// On any failure all three namespaces are deleted, so the next
    /// activation starts from the no-manifest path, and the cause is returned
    /// wrapped in [`CacheError::Activation`].
    pub async fn on_activate(&self) -> Result<ActivationReport> {
        self.set_state(WorkerState::Activating);

        let result = self.reconcile().await;
        self.set_state(WorkerState::Activated);

        match result {
            Ok(report) => {
                info!(
                    mode = ?report.mode,
                    evicted = report.evicted.len(),
                    copied = report.copied,
                    "Activated cache"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Failed to upgrade cache");
                self.reset().await;
                Err(CacheError::Activation(Box::new(e)))
            }
        }
    }

    async fn reconcile(&self) -> Result<ActivationReport> {
        let namespaces = self.config().namespaces();
        let mut content = self.open(&namespaces.content).await?;
        let temp = self.open(&namespaces.temp).await?;
        let manifest_cache = self.open(&namespaces.manifest).await?;

        let previous = match manifest_cache.match_url(MANIFEST_KEY).await? {
            Some(stored) => Some(Manifest::parse(&stored.body)?),
            None => None,
        };

        let (mode, evicted) = match previous {
            None => {
                debug!("No prior manifest, rebuilding content cache");
                self.inner.storage.delete_namespace(&namespaces.content).await?;
                content = self.open(&namespaces.content).await?;
                (ActivationMode::Fresh, Vec::new())
            }
            Some(old) => {
                let evicted = self.evict_stale(&content, &old).await?;
                (ActivationMode::Incremental, evicted)
            }
        };

        // Shell files fetched for this version win over anything kept above.
        let mut copied = 0;
        for url in temp.keys().await? {
            if let Some(response) = temp.match_url(&url).await? {
                content.put(&url, response).await?;
                copied += 1;
            }
        }
        self.inner.storage.delete_namespace(&namespaces.temp).await?;

        let manifest = Manifest::snapshot(self.config().resources()).to_json()?;
        manifest_cache
            .put(MANIFEST_KEY, Response::ok(MANIFEST_KEY, manifest))
            .await?;

        self.update_lifecycle(|l| l.claim_clients());

        Ok(ActivationReport {
            mode,
            evicted,
            copied,
        })
    }

    /// Delete content entries that are unpublished or changed since `old`.
    async fn evict_stale(&self, content: &Cache, old: &Manifest) -> Result<Vec<String>> {
        let resources = self.config().resources();
        let mut evicted = Vec::new();
        for url in content.keys().await? {
            let key = logical_key(self.config().origin(), &url);
            if !old.is_current(&key, resources) {
                debug!(key = %key, "Evicting stale resource");
                content.delete(&url).await?;
                evicted.push(key);
            }
        }
        Ok(evicted)
    }

    /// Drop every namespace after a failed activation.
    async fn reset(&self) {
        for namespace in self.config().namespaces().all() {
            if let Err(e) = self.inner.storage.delete_namespace(namespace).await {
                warn!(namespace = namespace, error = %e, "Failed to delete cache namespace");
            }
        }
    }

    // ===== Fetch =====

    /// Answer an intercepted request.
    ///
    /// Only GET requests for published resources are answered; everything
    /// else passes through. Network errors on a cache miss propagate.
    pub async fn on_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        if !request.is_get() {
            return Ok(FetchOutcome::PassThrough);
        }

        let key = request_key(self.config().origin(), request.url.as_str());
        if !self.config().resources().contains(&key) {
            debug!(url = %request.url, "Not a published resource, passing through");
            return Ok(FetchOutcome::PassThrough);
        }

        if key == ROOT_KEY {
            return self.online_first(request).await;
        }

        let content = self.content().await?;
        let url = request.url.as_str();
        if let Some(response) = content.match_url(url).await? {
            return Ok(FetchOutcome::Respond {
                response,
                source: ResponseSource::Cache,
            });
        }

        let response = self.inner.fetcher.fetch(request).await?;
        if response.is_ok() {
            if let Err(e) = content.put(url, response.clone()).await {
                warn!(url = url, error = %e, "Failed to cache fetched resource");
            }
        }
        Ok(FetchOutcome::Respond {
            response,
            source: ResponseSource::Network,
        })
    }

    /// Network first, falling back to the cached copy when offline.
    async fn online_first(&self, request: &Request) -> Result<FetchOutcome> {
        let content = self.content().await?;
        let url = request.url.as_str();

        match self.inner.fetcher.fetch(request).await {
            Ok(response) => {
                if let Err(e) = content.put(url, response.clone()).await {
                    warn!(url = url, error = %e, "Failed to refresh cached root document");
                }
                Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(network_error) => {
                debug!(url = url, error = %network_error, "Network unavailable, trying cache");
                match content.match_url(url).await? {
                    Some(response) => Ok(FetchOutcome::Respond {
                        response,
                        source: ResponseSource::Cache,
                    }),
                    None => Err(network_error),
                }
            }
        }
    }

    // ===== Message =====

    /// Handle a control message from a page.
    ///
    /// `downloadOffline` is spawned on the current Tokio runtime, so this must
    /// be called from within one.
    pub fn on_message(&self, payload: &str) -> MessageOutcome {
        match Message::parse(payload) {
            Some(Message::SkipWaiting) => {
                self.update_lifecycle(|l| l.skip_waiting());
                if self.lifecycle().can_activate_now() {
                    info!("Installed worker is ready to activate");
                } else {
                    debug!("Skip waiting requested");
                }
                MessageOutcome::SkipWaiting
            }
            Some(Message::DownloadOffline) => {
                let manager = self.clone();
                let handle = tokio::spawn(async move {
                    let result = manager.download_offline().await;
                    if let Err(ref e) = result {
                        warn!(error = %e, "Offline download failed");
                    }
                    result
                });
                MessageOutcome::DownloadStarted(handle)
            }
            None => {
                debug!(payload = payload, "Ignoring unrecognized message");
                MessageOutcome::Ignored
            }
        }
    }

    /// Fetch every published resource that has no content entry yet.
    ///
    /// All or nothing, like install. Returns the number of resources stored.
    pub async fn download_offline(&self) -> Result<usize> {
        let content = self.content().await?;
        let missing = self.missing_keys(&content.keys().await?);
        let requests = missing
            .iter()
            .map(|key| self.resource_request(key))
            .collect::<Result<Vec<_>>>()?;

        let stored = content.add_all(self.inner.fetcher.as_ref(), requests).await?;
        info!(resources = stored, "Downloaded resources for offline use");
        Ok(stored)
    }

    /// Published keys with no entry among the cached `urls`.
    fn missing_keys(&self, urls: &[String]) -> Vec<String> {
        let cached: HashSet<String> = urls
            .iter()
            .map(|url| logical_key(self.config().origin(), url))
            .collect();
        self.config()
            .resources()
            .keys()
            .filter(|key| !cached.contains(*key))
            .map(str::to_string)
            .collect()
    }

    // ===== Status =====

    /// Read-only summary of the namespaces. Never creates a namespace.
    pub async fn status(&self) -> Result<CacheStatus> {
        let namespaces = self.config().namespaces();
        let storage = &self.inner.storage;

        let content_urls = storage.keys(&namespaces.content).await?;
        let missing = self.missing_keys(&content_urls);
        let content_entries = content_urls.len();
        let temp_entries = storage.keys(&namespaces.temp).await?.len();
        let manifest = match storage.get(&namespaces.manifest, MANIFEST_KEY).await? {
            Some(entry) => Some(Manifest::parse(&entry.response.body)?),
            None => None,
        };

        Ok(CacheStatus {
            content_entries,
            temp_entries,
            manifest,
            missing,
        })
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("origin", &self.config().origin())
            .field("resources", &self.config().resources().len())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::config::Namespaces;
    use crate::net::Method;
    use crate::resources::ResourceTable;
    use crate::testing::{FailingStorage, FakeFetcher};
    use url::Url;

    const ORIGIN: &str = "https://app.example.com";

    fn url(key: &str) -> String {
        Url::parse("https://app.example.com/")
            .unwrap()
            .join(key)
            .unwrap()
            .to_string()
    }

    fn get(key: &str) -> Request {
        Request::get(Url::parse(&url(key)).unwrap())
    }

    fn table(entries: &[(&str, &str)]) -> ResourceTable {
        entries.iter().copied().collect()
    }

    fn manager(
        resources: ResourceTable,
        shell: &[&str],
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<FakeFetcher>,
    ) -> CacheManager {
        let config = WorkerConfig::new(ORIGIN, resources)
            .unwrap()
            .with_app_shell(shell.iter().copied());
        CacheManager::new(config, storage, fetcher).unwrap()
    }

    async fn body(storage: &dyn CacheStorage, namespace: &str, key: &str) -> Option<String> {
        storage
            .get(namespace, &url(key))
            .await
            .unwrap()
            .map(|entry| entry.response.text().into_owned())
    }

    async fn content_keys(storage: &dyn CacheStorage) -> Vec<String> {
        let mut keys: Vec<String> = storage
            .keys(&Namespaces::default().content)
            .await
            .unwrap()
            .iter()
            .map(|u| logical_key(ORIGIN, u))
            .collect();
        keys.sort();
        keys
    }

    async fn seed(storage: &dyn CacheStorage, namespace: &str, key: &str, body: &str) {
        let u = url(key);
        storage.put(namespace, &u, Response::ok(&u, body)).await.unwrap();
    }

    async fn seed_manifest(storage: &dyn CacheStorage, manifest: &ResourceTable) {
        storage
            .put(
                &Namespaces::default().manifest,
                MANIFEST_KEY,
                Response::ok(MANIFEST_KEY, manifest.to_json().unwrap()),
            )
            .await
            .unwrap();
    }

    fn content_ns() -> String {
        Namespaces::default().content
    }

    fn temp_ns() -> String {
        Namespaces::default().temp
    }

    // ===== Install =====

    #[tokio::test]
    async fn test_install_fetches_shell_into_temp() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(
            FakeFetcher::new()
                .serve(&url("index.html"), "<html>")
                .serve(&url("main.dart.js"), "main"),
        );
        let resources = table(&[("/", "r"), ("index.html", "i"), ("main.dart.js", "m")]);
        let worker = manager(resources, &["main.dart.js", "index.html"], storage.clone(), fetcher.clone());

        assert_eq!(worker.on_install().await.unwrap(), 2);

        assert_eq!(body(&*storage, &temp_ns(), "main.dart.js").await.as_deref(), Some("main"));
        assert!(fetcher.requests().iter().all(|r| r.cache_mode == CacheMode::Reload));
        let lifecycle = worker.lifecycle();
        assert_eq!(lifecycle.state(), WorkerState::Installed);
        assert!(lifecycle.skips_waiting());
    }

    #[tokio::test]
    async fn test_install_failure_makes_worker_redundant() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("main.dart.js"), "main"));
        let resources = table(&[("index.html", "i"), ("main.dart.js", "m")]);
        let worker = manager(resources, &["main.dart.js", "index.html"], storage.clone(), fetcher);

        assert!(worker.on_install().await.is_err());
        assert_eq!(worker.lifecycle().state(), WorkerState::Redundant);
        assert!(storage.keys(&temp_ns()).await.unwrap().is_empty());
    }

    // ===== Activate =====

    #[tokio::test]
    async fn test_fresh_activation_replaces_content_with_temp() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "leftover.js", "old").await;
        seed(&*storage, &temp_ns(), "a.js", "a").await;
        seed(&*storage, &temp_ns(), "index.html", "<html>").await;
        let resources = table(&[("a.js", "h1"), ("index.html", "h2"), ("b.js", "h3")]);
        let worker = manager(resources.clone(), &["a.js"], storage.clone(), Arc::new(FakeFetcher::new()));

        let report = worker.on_activate().await.unwrap();

        assert_eq!(report.mode, ActivationMode::Fresh);
        assert_eq!(report.copied, 2);
        assert_eq!(content_keys(&*storage).await, vec!["a.js", "index.html"]);
        assert!(!storage.has(&temp_ns()).await.unwrap());

        let status = worker.status().await.unwrap();
        assert_eq!(status.manifest, Some(Manifest::snapshot(&resources)));

        let lifecycle = worker.lifecycle();
        assert!(lifecycle.is_active());
        assert!(lifecycle.controls_clients());
    }

    #[tokio::test]
    async fn test_incremental_activation_keeps_unchanged_and_prefers_temp() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "a.js", "old a").await;
        seed(&*storage, &content_ns(), "b.js", "original b").await;
        seed(&*storage, &temp_ns(), "a.js", "new a").await;
        seed_manifest(&*storage, &table(&[("a.js", "h0"), ("b.js", "h2")])).await;

        let resources = table(&[("a.js", "h1"), ("b.js", "h2")]);
        let worker = manager(resources, &["a.js"], storage.clone(), Arc::new(FakeFetcher::new()));

        let report = worker.on_activate().await.unwrap();

        assert_eq!(report.mode, ActivationMode::Incremental);
        assert_eq!(report.evicted, vec!["a.js".to_string()]);
        assert_eq!(body(&*storage, &content_ns(), "a.js").await.as_deref(), Some("new a"));
        assert_eq!(body(&*storage, &content_ns(), "b.js").await.as_deref(), Some("original b"));
    }

    #[tokio::test]
    async fn test_activation_evicts_changed_and_unpublished() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "changed.js", "v1").await;
        seed(&*storage, &content_ns(), "removed.js", "v1").await;
        seed(&*storage, &content_ns(), "kept.js", "v1").await;
        seed(&*storage, &content_ns(), "new.js", "untracked").await;
        seed(&*storage, &temp_ns(), "index.html", "<html>").await;
        seed_manifest(
            &*storage,
            &table(&[("changed.js", "c1"), ("removed.js", "r1"), ("kept.js", "k1"), ("index.html", "i1")]),
        )
        .await;

        let resources = table(&[("changed.js", "c2"), ("kept.js", "k1"), ("new.js", "n1"), ("index.html", "i2")]);
        let worker = manager(resources, &["index.html"], storage.clone(), Arc::new(FakeFetcher::new()));

        let mut evicted = worker.on_activate().await.unwrap().evicted;
        evicted.sort();

        // new.js is published but unknown to the old manifest, so its cached
        // copy cannot be trusted either.
        assert_eq!(evicted, vec!["changed.js", "new.js", "removed.js"]);
        assert_eq!(content_keys(&*storage).await, vec!["index.html", "kept.js"]);
    }

    #[tokio::test]
    async fn test_activation_evicts_versioned_and_foreign_urls() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "style.css", "css").await;
        seed(&*storage, &content_ns(), "style.css?v=123", "versioned css").await;
        seed(&*storage, &content_ns(), "https://cdn.example.org/font.ttf", "font").await;
        let resources = table(&[("style.css", "s1")]);
        seed_manifest(&*storage, &resources).await;
        let worker = manager(resources, &[], storage.clone(), Arc::new(FakeFetcher::new()));

        let mut evicted = worker.on_activate().await.unwrap().evicted;
        evicted.sort();

        assert_eq!(evicted, vec!["https://cdn.example.org/font.ttf", "style.css?v=123"]);
        assert_eq!(content_keys(&*storage).await, vec!["style.css"]);
    }

    #[tokio::test]
    async fn test_activation_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &temp_ns(), "index.html", "<html>").await;
        seed(&*storage, &content_ns(), "b.js", "b").await;
        let resources = table(&[("index.html", "i"), ("b.js", "h")]);
        seed_manifest(&*storage, &resources).await;
        let worker = manager(resources, &["index.html"], storage.clone(), Arc::new(FakeFetcher::new()));

        worker.on_activate().await.unwrap();
        let first = content_keys(&*storage).await;

        let report = worker.on_activate().await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(report.copied, 0);
        assert_eq!(content_keys(&*storage).await, first);
        assert_eq!(body(&*storage, &content_ns(), "index.html").await.as_deref(), Some("<html>"));
    }

    #[tokio::test]
    async fn test_activation_failure_resets_every_namespace() {
        let storage = Arc::new(FailingStorage::new());
        seed(&*storage, &content_ns(), "a.js", "a").await;
        seed(&*storage, &temp_ns(), "index.html", "<html>").await;
        let resources = table(&[("a.js", "h"), ("index.html", "i")]);
        seed_manifest(&*storage, &resources).await;
        storage.fail_puts_to(Some(&Namespaces::default().manifest));

        let worker = manager(resources, &["index.html"], storage.clone(), Arc::new(FakeFetcher::new()));
        let err = worker.on_activate().await.unwrap_err();

        assert!(matches!(err, CacheError::Activation(_)));
        assert!(storage.namespaces().await.unwrap().is_empty());
        assert!(worker.lifecycle().is_active());
        assert!(!worker.lifecycle().controls_clients());

        // The next activation takes the no-manifest path.
        storage.fail_puts_to(None);
        let report = worker.on_activate().await.unwrap();
        assert_eq!(report.mode, ActivationMode::Fresh);
    }

    #[tokio::test]
    async fn test_activation_with_corrupt_manifest_resets() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "a.js", "a").await;
        storage
            .put(&Namespaces::default().manifest, MANIFEST_KEY, Response::ok(MANIFEST_KEY, "not json"))
            .await
            .unwrap();
        let worker = manager(table(&[("a.js", "h")]), &[], storage.clone(), Arc::new(FakeFetcher::new()));

        assert!(worker.on_activate().await.is_err());
        assert!(storage.namespaces().await.unwrap().is_empty());
    }

    // ===== Fetch =====

    #[tokio::test]
    async fn test_fetch_passes_through_non_get() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = manager(table(&[("a.js", "h")]), &[], storage, Arc::new(FakeFetcher::new()));

        let request = Request::new(Method::POST, Url::parse(&url("a.js")).unwrap());
        assert!(worker.on_fetch(&request).await.unwrap().is_pass_through());
    }

    #[tokio::test]
    async fn test_fetch_passes_through_unpublished_even_if_cached() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "api/items", "cached").await;
        let fetcher = Arc::new(FakeFetcher::new());
        let worker = manager(table(&[("a.js", "h")]), &[], storage, fetcher.clone());

        assert!(worker.on_fetch(&get("api/items")).await.unwrap().is_pass_through());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_serves_cache_hit() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "a.js", "cached a").await;
        let fetcher = Arc::new(FakeFetcher::new());
        let worker = manager(table(&[("a.js", "h")]), &[], storage, fetcher.clone());

        let outcome = worker.on_fetch(&get("a.js")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "cached a");
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_miss_populates_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("a.js"), "fresh a"));
        let worker = manager(table(&[("a.js", "h")]), &[], storage.clone(), fetcher.clone());

        let outcome = worker.on_fetch(&get("a.js")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(body(&*storage, &content_ns(), "a.js").await.as_deref(), Some("fresh a"));

        let outcome = worker.on_fetch(&get("a.js")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_does_not_cache_error_status() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve_status(&url("a.js"), 503));
        let worker = manager(table(&[("a.js", "h")]), &[], storage.clone(), fetcher);

        let outcome = worker.on_fetch(&get("a.js")).await.unwrap();
        assert_eq!(outcome.response().unwrap().status, 503);
        assert!(storage.keys(&content_ns()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_miss_propagates_network_error() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_online(false);
        let worker = manager(table(&[("a.js", "h")]), &[], storage, fetcher);

        let err = worker.on_fetch(&get("a.js")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_fetch_normalizes_version_query() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("style.css?v=123"), "body {}"));
        let worker = manager(table(&[("style.css", "h")]), &[], storage, fetcher);

        let outcome = worker.on_fetch(&get("style.css?v=123")).await.unwrap();
        assert!(!outcome.is_pass_through());
        assert_eq!(outcome.response().unwrap().text(), "body {}");
    }

    #[tokio::test]
    async fn test_root_is_fetched_online_first() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "/", "stale root").await;
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("/"), "live root"));
        let worker = manager(table(&[("/", "h")]), &[], storage.clone(), fetcher);

        let outcome = worker.on_fetch(&get("/")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(outcome.response().unwrap().text(), "live root");
        assert_eq!(body(&*storage, &content_ns(), "/").await.as_deref(), Some("live root"));
    }

    #[tokio::test]
    async fn test_root_falls_back_to_cache_offline() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "/", "cached root").await;
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_online(false);
        let worker = manager(table(&[("/", "h")]), &[], storage, fetcher);

        let outcome = worker.on_fetch(&get("/")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "cached root");
    }

    #[tokio::test]
    async fn test_root_offline_without_cache_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_online(false);
        let worker = manager(table(&[("/", "h")]), &[], storage, fetcher);

        assert!(worker.on_fetch(&get("/")).await.unwrap_err().is_network());
    }

    #[tokio::test]
    async fn test_hash_route_offline_uses_cached_root() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("/"), "live root"));
        let worker = manager(table(&[("/", "h")]), &[], storage.clone(), fetcher.clone());

        worker.on_fetch(&get("/")).await.unwrap();
        fetcher.set_online(false);

        let outcome = worker.on_fetch(&get("/#/settings")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "live root");
    }

    #[tokio::test]
    async fn test_hash_route_online_shares_root_entry() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("/"), "live root"));
        let worker = manager(table(&[("/", "h")]), &[], storage.clone(), fetcher);

        let outcome = worker.on_fetch(&get("/#/settings")).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Network));
        assert_eq!(content_keys(&*storage).await, vec!["/"]);
    }

    #[tokio::test]
    async fn test_fetch_miss_survives_failed_store() {
        let storage = Arc::new(FailingStorage::new());
        storage.fail_puts_to(Some(&content_ns()));
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("a.js"), "fresh a"));
        let worker = manager(table(&[("a.js", "h")]), &[], storage.clone(), fetcher);

        match worker.on_fetch(&get("a.js")).await.unwrap() {
            FetchOutcome::Respond { response, source } => {
                assert_eq!(source, ResponseSource::Network);
                assert_eq!(response.text(), "fresh a");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(storage.keys(&content_ns()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_refresh_survives_failed_store() {
        let storage = Arc::new(FailingStorage::new());
        storage.fail_puts_to(Some(&content_ns()));
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("/"), "live root"));
        let worker = manager(table(&[("/", "h")]), &[], storage.clone(), fetcher);

        match worker.on_fetch(&get("/")).await.unwrap() {
            FetchOutcome::Respond { response, source } => {
                assert_eq!(source, ResponseSource::Network);
                assert_eq!(response.text(), "live root");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(storage.keys(&content_ns()).await.unwrap().is_empty());
    }

    // ===== Message =====

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = manager(table(&[]), &[], storage, Arc::new(FakeFetcher::new()));

        assert!(!worker.lifecycle().skips_waiting());
        assert!(matches!(worker.on_message("skipWaiting"), MessageOutcome::SkipWaiting));
        assert!(worker.lifecycle().skips_waiting());
    }

    #[tokio::test]
    async fn test_skip_waiting_after_install_is_ready_to_activate() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("index.html"), "<html>"));
        let worker = manager(table(&[("index.html", "i")]), &["index.html"], storage, fetcher);

        assert!(!worker.lifecycle().can_activate_now());
        worker.on_install().await.unwrap();
        worker.on_message("skipWaiting");
        assert!(worker.lifecycle().can_activate_now());

        worker.on_activate().await.unwrap();
        assert!(!worker.lifecycle().can_activate_now());
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = manager(table(&[]), &[], storage, Arc::new(FakeFetcher::new()));

        assert!(matches!(worker.on_message("reload"), MessageOutcome::Ignored));
        assert!(!worker.lifecycle().skips_waiting());
    }

    #[tokio::test]
    async fn test_download_offline_fetches_only_missing() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "a.js", "a").await;
        let fetcher = Arc::new(
            FakeFetcher::new()
                .serve(&url("/"), "root")
                .serve(&url("b.js"), "b")
                .serve(&url("assets/c.png"), "c"),
        );
        let worker = manager(
            table(&[("/", "r"), ("a.js", "h1"), ("b.js", "h2"), ("assets/c.png", "h3")]),
            &[],
            storage.clone(),
            fetcher.clone(),
        );

        let handle = match worker.on_message("downloadOffline") {
            MessageOutcome::DownloadStarted(handle) => handle,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(handle.await.unwrap().unwrap(), 3);

        assert_eq!(
            fetcher.requested_urls(),
            vec![url("/"), url("assets/c.png"), url("b.js")]
        );
        assert_eq!(content_keys(&*storage).await, vec!["/", "a.js", "assets/c.png", "b.js"]);
        assert!(worker.status().await.unwrap().missing.is_empty());
    }

    #[tokio::test]
    async fn test_download_offline_ignores_versioned_entries() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&*storage, &content_ns(), "style.css?v=1", "old css").await;
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("style.css"), "css"));
        let worker = manager(table(&[("style.css", "h")]), &[], storage.clone(), fetcher.clone());

        assert_eq!(worker.status().await.unwrap().missing, vec!["style.css"]);
        assert_eq!(worker.download_offline().await.unwrap(), 1);
        assert_eq!(fetcher.requested_urls(), vec![url("style.css")]);
        assert_eq!(body(&*storage, &content_ns(), "style.css").await.as_deref(), Some("css"));
    }

    #[tokio::test]
    async fn test_status_does_not_create_namespaces() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = manager(table(&[("a.js", "h")]), &[], storage.clone(), Arc::new(FakeFetcher::new()));

        let status = worker.status().await.unwrap();
        assert_eq!(status.content_entries, 0);
        assert_eq!(status.missing, vec!["a.js"]);
        assert!(storage.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_offline_is_all_or_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(FakeFetcher::new().serve(&url("a.js"), "a"));
        let worker = manager(table(&[("a.js", "h1"), ("b.js", "h2")]), &[], storage.clone(), fetcher);

        assert!(worker.download_offline().await.is_err());
        assert!(storage.keys(&content_ns()).await.unwrap().is_empty());
    }

    // ===== Upgrade cycle =====

    #[tokio::test]
    async fn test_upgrade_reuses_unchanged_resources() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(
            FakeFetcher::new()
                .serve(&url("index.html"), "v1 index")
                .serve(&url("lib.js"), "v1 lib"),
        );
        let v1 = table(&[("index.html", "i1"), ("lib.js", "l1")]);
        let worker = manager(v1, &["index.html"], storage.clone(), fetcher.clone());
        worker.on_install().await.unwrap();
        worker.on_activate().await.unwrap();
        worker.download_offline().await.unwrap();

        // Version 2 changes only the shell.
        fetcher.set_response(&url("index.html"), Response::ok(url("index.html"), "v2 index"));
        let v2 = table(&[("index.html", "i2"), ("lib.js", "l1")]);
        let worker = manager(v2, &["index.html"], storage.clone(), fetcher.clone());
        worker.on_install().await.unwrap();
        let report = worker.on_activate().await.unwrap();

        assert_eq!(report.mode, ActivationMode::Incremental);
        assert_eq!(report.evicted, vec!["index.html".to_string()]);
        assert_eq!(body(&*storage, &content_ns(), "index.html").await.as_deref(), Some("v2 index"));
        assert_eq!(body(&*storage, &content_ns(), "lib.js").await.as_deref(), Some("v1 lib"));

        let lib_fetches = fetcher
            .requests()
            .iter()
            .filter(|r| r.url.as_str() == url("lib.js"))
            .count();
        assert_eq!(lib_fetches, 1);
    }
}
