//! Baton Ingest - delivery bundle ingestion agent

use anyhow::Result;
use baton_common::logging::{init_logging, LogConfig, LogLevel};
use baton_ingest::config::IngestConfig;
use baton_ingest::orchestrator::Orchestrator;
use baton_ingest::registration::ProcessIdentity;
use baton_ingest::registry::PgRegistry;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "baton-ingest")]
#[command(author, version, about = "Delivery bundle ingestion agent")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Report progress (info-level logging; default is warnings only)
    #[arg(short, long)]
    verbose: bool,

    /// Debug output (overrides --verbose)
    #[arg(short, long)]
    debug: bool,

    /// Verify and resolve bundles without touching the archive or registry
    #[arg(long)]
    dry_run: bool,

    /// Keep per-bundle scratch workspaces for inspection
    #[arg(long)]
    keep_scratch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Output target and directory may come from the environment; the CLI
    // flags always decide the level.
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level(cli.verbose, cli.debug))
        .with_file_prefix("baton-ingest");

    init_logging(&log_config)?;

    let config = IngestConfig::load(&cli.config)?;

    let identity = ProcessIdentity {
        exec_name: "baton-ingest".to_string(),
        exec_host: hostname::get()?.to_string_lossy().to_string(),
    };

    let mut registry = PgRegistry::connect(&config.database).await?;

    let orchestrator = Orchestrator::new(config, identity, cli.dry_run, cli.keep_scratch);
    let stats = orchestrator.run(&mut registry).await?;

    info!(
        scanned = stats.scanned,
        ingested = stats.ingested,
        quarantined = stats.quarantined,
        skipped = stats.skipped,
        "Ingestion pass complete"
    );
    Ok(())
}

/// Quiet by default: warnings only, `-v` surfaces progress, `-d` everything
fn log_level(verbose: bool, debug: bool) -> LogLevel {
    if debug {
        LogLevel::Debug
    } else if verbose {
        LogLevel::Info
    } else {
        LogLevel::Warn
    }
}
