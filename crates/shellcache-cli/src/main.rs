//! shellcache - offline cache for a compiled web application bundle.
//!
//! Runs the worker lifecycle from the command line against an on-disk cache:
//! install the app shell, activate a new version, answer fetches and post
//! control messages.

mod cli;
mod commands;
mod config;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::Session;
use config::Config;

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` wins over `-v`. The returned guard flushes the log file on drop.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config = Config::load(cli.config.as_deref())?;

    if let Commands::Init = cli.command {
        return commands::init(&cli, config, cli.config.as_deref());
    }

    let session = Session::build(&cli, &config)?;
    info!(origin = %session.manager.config().origin(), "shellcache starting");

    match cli.command {
        Commands::Install => commands::install(&session).await,
        Commands::Activate => commands::activate(&session).await,
        Commands::Update => commands::update(&session).await,
        Commands::Fetch(ref args) => commands::fetch(&session, args).await,
        Commands::Message(ref args) => commands::message(&session, args).await,
        Commands::Status(ref args) => commands::status(&session, args).await,
        Commands::Init => Ok(()),
    }
}
