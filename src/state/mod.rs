//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TargetStage`: where processing of one zip code is (skip check, fetches, extraction, persist)
//! - `RunPhase`: where the whole run is (init, crawling a state/zip position, done)

mod stage;

pub use stage::{RunPhase, TargetStage};
