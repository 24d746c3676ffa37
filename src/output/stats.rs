//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{FailureRecord, RunRecord, Store};
use crate::HarvestError;
use chrono::{DateTime, Utc};

/// Number of failure markers shown by `print_statistics`
const RECENT_FAILURES: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of stored zip codes
    pub total_records: u64,

    /// Stored zip codes per state, ordered by state name
    pub records_by_state: Vec<(String, u64)>,

    /// Total number of failure markers
    pub total_failures: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Most recent failure markers, newest last
    pub recent_failures: Vec<FailureRecord>,
}

impl StoreStatistics {
    /// Wall-clock duration of the latest run, if it has finished
    pub fn latest_run_seconds(&self) -> Option<i64> {
        let run = self.latest_run.as_ref()?;
        let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = run.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(store: &dyn Store) -> Result<StoreStatistics, HarvestError> {
    let total_records = store.count_records()?;
    let records_by_state = store.records_by_state()?;
    let total_failures = store.count_failures()?;
    let latest_run = store.latest_run()?;

    let mut recent_failures = store.failures()?;
    let skip = recent_failures.len().saturating_sub(RECENT_FAILURES);
    recent_failures.drain(..skip);

    Ok(StoreStatistics {
        total_records,
        records_by_state,
        total_failures,
        latest_run,
        recent_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Zip codes stored: {}", stats.total_records);
    println!("  States covered: {}", stats.records_by_state.len());
    println!("  Failure markers: {}", stats.total_failures);
    println!();

    if !stats.records_by_state.is_empty() {
        println!("Zip Codes by State:");
        for (state, count) in &stats.records_by_state {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", state, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = stats.latest_run_seconds() {
                println!("  Duration: {}s", seconds);
            }
            println!("  Zip codes seen: {}", run.targets_seen);
            println!("  Records written: {}", run.records_written);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }

    if !stats.recent_failures.is_empty() {
        println!();
        println!("Recent Failures ({} of {}):", stats.recent_failures.len(), stats.total_failures);
        for failure in &stats.recent_failures {
            println!(
                "  - {} ({}, {}) at {} (run {}): {}",
                failure.zip_code,
                failure.city,
                failure.state,
                failure.stage,
                failure.run_id,
                failure.error
            );
        }
    }
}
