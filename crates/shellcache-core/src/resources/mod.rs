//! Resource table and manifest.
//!
//! The resource table maps every published file of the web bundle to a
//! content fingerprint. A [`Manifest`] is the same mapping as persisted by the
//! previous activation, and is diffed against the current table to decide
//! which cached files can be kept.

pub mod script;
pub mod table;

pub use script::ScriptResources;
pub use table::{Manifest, ResourceTable};

/// Files required to boot the application, fetched during install.
pub const DEFAULT_APP_SHELL: &[&str] = &[
    "main.dart.js",
    "index.html",
    "flutter_bootstrap.js",
    "assets/AssetManifest.bin.json",
    "assets/FontManifest.json",
];
