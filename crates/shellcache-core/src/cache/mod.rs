//! Named cache namespaces.
//!
//! A [`CacheStorage`] backend holds any number of namespaces, each a map from
//! request URL to a stored response. The lifecycle handlers work through
//! [`Cache`] handles opened on a backend.
//!
//! Backends:
//! - [`MemoryStorage`]: in-process, used by embedders and tests
//! - [`DiskStorage`]: one directory per namespace, survives restarts

pub mod disk;
pub mod entry;
pub mod memory;
pub mod storage;

pub use disk::DiskStorage;
pub use entry::CacheEntry;
pub use memory::MemoryStorage;
pub use storage::{Cache, CacheStorage};
