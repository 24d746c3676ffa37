//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::CrawlTarget;
use crate::record::StatRecord;
use crate::state::TargetStage;
use crate::storage::{FailureRecord, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid zip code key: {0}")]
    InvalidKey(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes take `&mut self`; a store is owned by exactly one coordinator.
pub trait Store {
    /// Creates any missing tables; safe to call repeatedly
    fn ensure_schema(&mut self) -> StorageResult<()>;

    // ===== Records =====

    /// Returns true if a record exists for the zip code
    fn exists(&self, zip_code: i64) -> StorageResult<bool>;

    /// Inserts a record unless one already exists for its zip code
    ///
    /// # Returns
    ///
    /// `true` if a row was written, `false` if the zip code was already present
    fn insert(&mut self, record: &StatRecord) -> StorageResult<bool>;

    /// Gets the record for a zip code
    fn get(&self, zip_code: i64) -> StorageResult<Option<StatRecord>>;

    /// Total number of stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Record counts per state, ordered by state name
    fn records_by_state(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Fingerprint of the effective configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as completed with a finish timestamp and its counters
    fn complete_run(&mut self, run_id: i64, targets_seen: u64, records_written: u64)
        -> StorageResult<()>;

    /// Marks a run as failed with a finish timestamp and its counters
    fn fail_run(&mut self, run_id: i64, targets_seen: u64, records_written: u64)
        -> StorageResult<()>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Failure Markers =====

    /// Records that a target was skipped after failing at `stage`
    fn record_failure(
        &mut self,
        run_id: i64,
        target: &CrawlTarget,
        stage: TargetStage,
        error: &str,
    ) -> StorageResult<()>;

    /// Total number of failure markers
    fn count_failures(&self) -> StorageResult<u64>;

    /// All failure markers, oldest first
    fn failures(&self) -> StorageResult<Vec<FailureRecord>>;
}
