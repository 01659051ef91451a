//! Network side of the cache: request/response values and the fetcher seam.
//!
//! The lifecycle handlers only see the [`Fetcher`] trait. [`HttpFetcher`]
//! is the production implementation over `reqwest`; tests substitute a
//! scripted fetcher.

pub mod client;
pub mod types;

pub use client::HttpFetcher;
pub use types::{CacheMode, Fetcher, Method, Request, Response};
