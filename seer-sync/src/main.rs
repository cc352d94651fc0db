//! Seer Sync - Main entry point
//!
//! Runs one sync cycle against the configured server, or batch-formats the
//! JSON files of an existing mirror.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use seer_sync::format::format_tree;
use seer_sync::{utils, Config, HttpTransport, JsonFormatter, SyncEngine};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server root URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Mirror directory (overrides config)
    #[arg(long, value_name = "DIR")]
    mirror_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every file whose hash changed since the last sync (default)
    Sync {
        /// Only list the files that would be downloaded
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-indent every JSON file under a directory
    Format {
        /// Directory to process
        dir: PathBuf,

        /// Directory names to skip
        #[arg(long = "exclude", value_name = "NAME", default_values = [".git", "venv", "node_modules"])]
        exclude: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = args.base_url {
        config.remote.base_url = base_url;
    }
    if let Some(mirror_dir) = args.mirror_dir {
        config.sync.mirror_dir = mirror_dir;
    }
    config.validate()?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    match args.command.unwrap_or(Command::Sync { dry_run: false }) {
        Command::Sync { dry_run } => sync(config, dry_run).await,
        Command::Format { dir, exclude } => {
            let summary = format_tree(&JsonFormatter::default(), &dir, &exclude)?;
            if summary.formatted < summary.found {
                bail!(
                    "{} of {} JSON files could not be formatted",
                    summary.found - summary.formatted,
                    summary.found
                );
            }
            Ok(())
        }
    }
}

async fn sync(config: Config, dry_run: bool) -> Result<()> {
    tracing::info!(
        "Starting seer-sync v{} (server: {}, mirror: {})",
        env!("CARGO_PKG_VERSION"),
        config.remote.base_url,
        config.sync.mirror_dir.display()
    );

    let transport = HttpTransport::from_config(&config.remote)?;
    let engine = SyncEngine::new(config, transport, JsonFormatter::default());

    if dry_run {
        let plan = engine.plan().await?;
        tracing::info!("{} file(s) would be updated", plan.changed.len());
        for file in &plan.changed {
            println!("{}\t{}", file.remote_path(), file.local_path());
        }
        return Ok(());
    }

    let outcome = engine.run().await?;
    tracing::info!(
        "Sync finished: {} changed, {} succeeded, {} failed",
        outcome.changed,
        outcome.report.succeeded,
        outcome.report.failed()
    );
    for failure in &outcome.report.failures {
        tracing::error!("  {}: {}", failure.file.local_path(), failure.error);
    }

    if !outcome.report.is_complete() {
        bail!("{} file(s) failed to sync", outcome.report.failed());
    }
    Ok(())
}
