//! Tidewater main entry point
//!
//! This is the command-line interface for the Tidewater news ingestion core.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tidewater::config::{load_config_with_hash, Config};
use tidewater::orchestrator::{IngestContext, Orchestrator, RunMode, RunOptions};
use tidewater::report::{load_statistics, print_run_report, print_statistics};
use tracing_subscriber::EnvFilter;

/// Tidewater: a polite news ingestion core
///
/// Tidewater discovers article links from feeds, sitemaps and listing
/// pages, fetches them under per-host politeness limits, and records each
/// article once in per-source and merged delimited stores.
#[derive(Parser, Debug)]
#[command(name = "tidewater")]
#[command(version = "1.0.0")]
#[command(about = "A polite news ingestion core", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Run only these sources (repeatable); default is every source
    #[arg(short, long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Run mode: full, incremental or backlog
    #[arg(short, long, default_value = "full")]
    mode: RunMode,

    /// Cap extractions per source (useful for test runs)
    #[arg(long, value_name = "N")]
    max_articles: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be ingested without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show row counts of the record stores and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, &cli.sources)?;

    if cli.dry_run {
        handle_dry_run(&config, &sources, cli.mode);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let options = RunOptions::new(cli.mode).with_max_articles(cli.max_articles);
        handle_ingest(config, config_hash, sources, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidewater=info,warn"),
            1 => EnvFilter::new("tidewater=debug,info"),
            2 => EnvFilter::new("tidewater=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves `--source` flags against the configured sources
fn select_sources(config: &Config, requested: &[String]) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(config.sources.iter().map(|s| s.name.clone()).collect());
    }
    for name in requested {
        if config.source(name).is_none() {
            bail!("source '{}' is not configured", name);
        }
    }
    Ok(requested.to_vec())
}

/// Handles the --dry-run mode: shows what a run would do
fn handle_dry_run(config: &Config, sources: &[String], mode: RunMode) {
    println!("=== Tidewater Dry Run ({}) ===\n", mode);

    println!("User Agent: {}", config.user_agent.header_value());
    println!(
        "Politeness: {}ms between requests (+{}ms jitter), {} concurrent per host",
        config.politeness.delay_between_requests,
        config.politeness.delay_jitter,
        config.politeness.max_concurrent
    );
    println!(
        "Retry: up to {} retries, base delay {}ms",
        config.retry.max_retries, config.retry.base_delay
    );
    println!(
        "Store: {} (merged: {}, min extract {} chars)",
        config.store.data_dir, config.store.merged_file, config.store.min_extract_length
    );
    if let Some(db) = &config.store.database_path {
        println!("Database: {}", db);
    }
    println!(
        "Triage: {}",
        if config.triage.enabled {
            format!(
                "enabled (high >= {}, medium >= {})",
                config.triage.high_threshold, config.triage.medium_threshold
            )
        } else {
            "disabled".to_string()
        }
    );

    println!("\nSources ({}):", sources.len());
    for name in sources {
        let Some(source) = config.source(name) else {
            continue;
        };
        println!("  - {}", source.name);
        for feed in &source.rss {
            println!("    rss      {}", feed);
        }
        if mode != RunMode::Incremental || source.rss.is_empty() {
            for sitemap in &source.sitemaps {
                println!("    sitemap  {}", sitemap);
            }
            for listing in &source.listings {
                println!("    listing  {}", listing.url);
            }
        }
        if let Some(cap) = source.max_articles {
            println!("    cap      {} articles", cap);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows row counts of the stores
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let stats = load_statistics(&config.store).context("failed to read the record stores")?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the main ingestion run
async fn handle_ingest(
    config: Config,
    config_hash: String,
    sources: Vec<String>,
    options: RunOptions,
) -> anyhow::Result<()> {
    let ctx = Arc::new(IngestContext::new(config, config_hash)?);
    let registry = ctx.feed_registry();
    let orchestrator = Orchestrator::new(Arc::clone(&ctx), registry);

    let signal_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        loop {
            wait_for_signal().await;
            if signal_ctx.request_shutdown() {
                tracing::error!("Second shutdown signal; exiting without flushing");
                std::process::exit(130);
            }
            tracing::warn!("Shutdown requested; finishing current fetch and flushing (signal again to force exit)");
        }
    });

    tracing::info!("Running {} sources in {} mode", sources.len(), options.mode);
    let results = orchestrator.run_all(&sources, &options).await;
    ctx.shutdown().await;

    let mut failed = 0;
    for (source, result) in &results {
        match result {
            Ok(report) => print_run_report(report),
            Err(e) => {
                failed += 1;
                println!("=== {} ===\n  Failed: {}\n", source, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} sources failed", failed, results.len());
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
