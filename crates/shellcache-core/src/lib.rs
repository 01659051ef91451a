//! # shellcache-core
//!
//! Offline cache for a compiled web application bundle.
//!
//! A build tool publishes a resource table mapping every file of the bundle
//! to a content fingerprint. [`CacheManager`] uses it to:
//!
//! - fetch the app shell on install,
//! - reconcile cached files against the previous version on activate,
//!   keeping every file whose fingerprint did not change,
//! - answer requests for published files from the cache (the root document
//!   is fetched online first),
//! - download everything not cached yet on request.
//!
//! ```text
//! CacheManager
//!     ├── WorkerConfig (origin, ResourceTable, app shell, namespace names)
//!     ├── CacheStorage (MemoryStorage | DiskStorage)
//!     │       ├── content   request URL -> response
//!     │       ├── temp      app shell during install
//!     │       └── manifest  "manifest" -> previous ResourceTable
//!     └── Fetcher (HttpFetcher)
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod net;
pub mod resources;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Cache, CacheEntry, CacheStorage, DiskStorage, MemoryStorage};
pub use config::{Namespaces, WorkerConfig, MANIFEST_KEY};
pub use error::{CacheError, Result};
pub use net::{CacheMode, Fetcher, HttpFetcher, Method, Request, Response};
pub use resources::{Manifest, ResourceTable, ScriptResources, DEFAULT_APP_SHELL};
pub use worker::{
    ActivationMode, ActivationReport, CacheManager, CacheStatus, FetchOutcome, Lifecycle,
    Message, MessageOutcome, ResponseSource, WorkerState,
};
