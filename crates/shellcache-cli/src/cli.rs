//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Offline cache for a compiled web application bundle.
///
/// Drives the install, activate, fetch and message lifecycle events against
/// an on-disk cache.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin serving the application, e.g. https://app.example.com
    #[arg(long, global = true, env = "SHELLCACHE_ORIGIN")]
    pub origin: Option<String>,

    /// Resource table: JSON file or generated service worker script
    #[arg(long, global = true, env = "SHELLCACHE_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// Directory holding the cache namespaces
    #[arg(long, global = true, env = "SHELLCACHE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the app shell into the temp cache
    Install,

    /// Reconcile the content cache with the current resource table
    Activate,

    /// Install, then activate
    Update,

    /// Answer a request the way the worker would
    Fetch(FetchArgs),

    /// Post a control message (skipWaiting, downloadOffline)
    Message(MessageArgs),

    /// Show cache namespaces and what is missing for offline use
    Status(StatusArgs),

    /// Save the current origin, resources and cache dir as defaults
    Init,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path relative to the origin
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the body here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Message payload
    pub payload: String,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// List every content entry with its age
    #[arg(long)]
    pub entries: bool,
}
