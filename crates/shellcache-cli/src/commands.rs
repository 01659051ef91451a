//! Command implementations.
//!
//! Each command builds a [`Session`] from flags and saved configuration, then
//! drives one lifecycle event of the cache worker against the on-disk cache.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shellcache_core::key::logical_key;
use shellcache_core::{
    ActivationReport, CacheManager, CacheStorage, DiskStorage, FetchOutcome, Fetcher,
    HttpFetcher, Method, MessageOutcome, Request, ResourceTable, ResponseSource,
    ScriptResources, WorkerConfig, DEFAULT_APP_SHELL,
};
use tracing::{debug, info};
use url::Url;

use crate::cli::{Cli, FetchArgs, MessageArgs, StatusArgs};
use crate::config::Config;

/// Everything a command needs to drive the worker.
pub struct Session {
    pub manager: CacheManager,
    pub storage: Arc<DiskStorage>,
    pub fetcher: Arc<HttpFetcher>,
}

impl Session {
    pub fn build(cli: &Cli, config: &Config) -> Result<Self> {
        let origin = cli
            .origin
            .clone()
            .or_else(|| config.origin.clone())
            .context("No origin configured; pass --origin or run `shellcache init`")?;
        let resources_path = cli
            .resources
            .clone()
            .or_else(|| config.resources.clone())
            .context("No resource table configured; pass --resources or run `shellcache init`")?;

        let (table, script_shell) = load_resources(&resources_path)?;
        let app_shell = config
            .app_shell
            .clone()
            .or(script_shell)
            .unwrap_or_else(|| DEFAULT_APP_SHELL.iter().map(|s| s.to_string()).collect());

        let mut worker_config = WorkerConfig::new(&origin, table)?.with_app_shell(app_shell);
        if let Some(ref namespaces) = config.namespaces {
            worker_config = worker_config.with_namespaces(namespaces.clone());
        }

        let cache_dir = match cli.cache_dir {
            Some(ref dir) => dir.clone(),
            None => config.cache_dir(worker_config.scope().authority())?,
        };
        debug!(cache_dir = %cache_dir.display(), "Using cache directory");

        let storage = Arc::new(DiskStorage::new(cache_dir)?);
        let fetcher = Arc::new(HttpFetcher::with_timeout(
            config.request_timeout_secs.map(Duration::from_secs),
        )?);
        let manager = CacheManager::new(worker_config, storage.clone(), fetcher.clone())?;

        Ok(Self {
            manager,
            storage,
            fetcher,
        })
    }
}

/// Load a resource table from JSON, or from a generated worker script along
/// with the app shell it declares.
fn load_resources(path: &Path) -> Result<(ResourceTable, Option<Vec<String>>)> {
    let is_script = path.extension().and_then(|e| e.to_str()) == Some("js");
    if is_script {
        let script = ScriptResources::load(path)
            .with_context(|| format!("Failed to read worker script: {}", path.display()))?;
        Ok((script.table, script.app_shell))
    } else {
        let table = ResourceTable::load(path)
            .with_context(|| format!("Failed to read resource table: {}", path.display()))?;
        Ok((table, None))
    }
}

pub async fn install(session: &Session) -> Result<()> {
    let stored = session.manager.on_install().await?;
    println!("Installed {} app shell files", stored);
    Ok(())
}

pub async fn activate(session: &Session) -> Result<()> {
    let report = session.manager.on_activate().await?;
    print_report(&report);
    Ok(())
}

pub async fn update(session: &Session) -> Result<()> {
    install(session).await?;
    activate(session).await
}

fn print_report(report: &ActivationReport) {
    println!(
        "Activated ({:?}): {} shell files copied, {} stale entries evicted",
        report.mode,
        report.copied,
        report.evicted.len()
    );
    for key in &report.evicted {
        println!("  evicted {}", key);
    }
}

pub async fn fetch(session: &Session, args: &FetchArgs) -> Result<()> {
    let url = resolve_url(session.manager.config().scope(), &args.url)?;
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;
    let request = Request::new(method, url);

    let (response, source) = match session.manager.on_fetch(&request).await? {
        FetchOutcome::PassThrough => {
            info!(url = %request.url, "Not intercepted, fetching directly");
            (session.fetcher.fetch(&request).await?, "pass-through")
        }
        FetchOutcome::Respond { response, source } => {
            let source = match source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
            };
            (response, source)
        }
    };

    eprintln!("{} {} ({})", response.status, request.url, source);
    match args.output {
        Some(ref path) => std::fs::write(path, &response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(&response.body)?,
    }
    Ok(())
}

fn resolve_url(scope: &Url, input: &str) -> Result<Url> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => scope
            .join(input)
            .with_context(|| format!("Invalid URL: {}", input)),
        Err(e) => Err(e).with_context(|| format!("Invalid URL: {}", input)),
    }
}

pub async fn message(session: &Session, args: &MessageArgs) -> Result<()> {
    match session.manager.on_message(&args.payload) {
        MessageOutcome::SkipWaiting => println!("Worker will skip waiting"),
        MessageOutcome::DownloadStarted(handle) => {
            let stored = handle.await.context("Offline download task failed")??;
            println!("Downloaded {} resources for offline use", stored);
        }
        MessageOutcome::Ignored => println!("Ignored unrecognized message '{}'", args.payload),
    }
    Ok(())
}

pub async fn status(session: &Session, args: &StatusArgs) -> Result<()> {
    let config = session.manager.config();
    let status = session.manager.status().await?;

    println!("Origin:     {}", config.origin());
    println!("Cache dir:  {}", session.storage.root().display());
    println!("Resources:  {}", config.resources().len());
    println!("Content:    {} entries", status.content_entries);
    if status.temp_entries > 0 {
        println!("Temp:       {} entries (install not activated)", status.temp_entries);
    }
    match status.manifest {
        Some(ref manifest) => {
            let changed = manifest.changed_keys(config.resources());
            println!(
                "Manifest:   {} entries, {} changed or removed since",
                manifest.len(),
                changed.len()
            );
        }
        None => println!("Manifest:   none (next activation rebuilds the cache)"),
    }
    println!("Missing:    {} resources not available offline", status.missing.len());

    if args.entries {
        let content = &config.namespaces().content;
        for url in session.storage.keys(content).await? {
            if let Some(entry) = session.storage.get(content, &url).await? {
                println!(
                    "  {:>3}  {:>9}  {}",
                    entry.response.status,
                    entry.age_display(),
                    logical_key(config.origin(), &url)
                );
            }
        }
    }
    Ok(())
}

/// Persist the effective origin, resources and cache dir as defaults.
pub fn init(cli: &Cli, mut config: Config, path: Option<&Path>) -> Result<()> {
    if let Some(ref origin) = cli.origin {
        config.origin = Some(origin.clone());
    }
    if let Some(ref resources) = cli.resources {
        config.resources = Some(absolute(resources)?);
    }
    if let Some(ref cache_dir) = cli.cache_dir {
        config.cache_dir = Some(absolute(cache_dir)?);
    }
    config.save(path)?;
    println!("Saved configuration");
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
