//! Lifecycle handlers of the cache worker.
//!
//! [`CacheManager`] exposes the four entry points a host drives: install,
//! activate, fetch and message. The host owns the event loop and decides when
//! each one runs.

pub mod lifecycle;
pub mod manager;
pub mod message;

pub use lifecycle::{Lifecycle, WorkerState};
pub use manager::{
    ActivationMode, ActivationReport, CacheManager, CacheStatus, FetchOutcome, ResponseSource,
};
pub use message::{Message, MessageOutcome};
