//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading record, run and failure statistics from the store
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};
