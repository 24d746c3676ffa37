//! zip-harvest main entry point
//!
//! This is the command-line interface for the zip-code statistics harvester.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use zip_harvest::config::{config_fingerprint, load_config, Config};
use zip_harvest::crawler::run_harvest;
use zip_harvest::extract::default_locators;
use zip_harvest::output::{load_statistics, print_statistics};
use zip_harvest::storage::open_store;

/// zip-harvest: a resumable zip-code statistics harvester
///
/// Walks the state and zip-code listings of a statistics site, extracts
/// housing, cost-of-living, crime and job-market figures for every zip code
/// and stores one row per zip code in SQLite. Zip codes already stored are
/// never fetched again, so an interrupted harvest can simply be restarted.
#[derive(Parser, Debug)]
#[command(name = "zip-harvest")]
#[command(version)]
#[command(about = "A resumable zip-code statistics harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the database path from the configuration
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Validate config and show the locator table without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(database) = &cli.database {
        config.output.database_path = database.display().to_string();
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("zip_harvest=info,warn"),
            1 => EnvFilter::new("zip_harvest=debug,info"),
            _ => EnvFilter::new("zip_harvest=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the locator table
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== zip-harvest Dry Run ===\n");

    println!("Site:");
    println!("  Root URL: {}", config.site.root_url);
    println!("  State heading: {}", config.site.state_heading);
    println!("  Zip index label: {}", config.site.zip_index_label);
    println!("  Menu selector: {}", config.site.menu_selector);

    println!("\nFetcher:");
    println!("  Max retries: {}", config.fetcher.max_retries);
    println!(
        "  Backoff: {}ms doubling to {}ms (jitter: {})",
        config.fetcher.base_delay_ms, config.fetcher.max_delay_ms, config.fetcher.jitter
    );
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetcher.timeout_secs, config.fetcher.connect_timeout_secs
    );
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!(
        "  On target error: {:?}",
        config.crawler.on_target_error
    );

    let persisted = config.crawler.persisted();
    let locators = default_locators().context("Failed to build locator table")?;
    println!("\nLocators ({}):", locators.len());
    for locator in &locators {
        let marker = if persisted.contains(&locator.field) {
            ' '
        } else {
            '-'
        };
        println!(" {} {}", marker, locator.describe());
    }

    let hash = config_fingerprint(config).context("Failed to fingerprint configuration")?;
    println!("\n✓ Configuration is valid (hash: {})", hash);
    println!(
        "✓ Would persist {} of {} statistics",
        persisted.len(),
        locators.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> Result<()> {
    tracing::info!(
        "Harvesting from {} into {}",
        config.site.root_url,
        config.output.database_path
    );

    let summary = run_harvest(config).await.context("Harvest failed")?;

    tracing::info!(
        "Harvest completed: {} zip codes seen, {} written, {} already stored, {} failed",
        summary.targets_seen,
        summary.persisted,
        summary.skipped_existing,
        summary.failed
    );

    Ok(())
}
