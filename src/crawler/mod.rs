//! Crawler module for page fetching and harvest orchestration
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with capped exponential retry
//! - HTML parsing and text-anchored element lookup
//! - Discovery of zip-code targets from the root page
//! - Overall harvest coordination

mod coordinator;
mod discover;
mod fetcher;
pub mod page;

pub use coordinator::{run_harvest, Coordinator, RunSummary};
pub use discover::{
    city_pattern, find_zip_index, parse_state_links, parse_zip_links, zip_pattern, CrawlTarget,
    LinkDiscoverer, StateLink,
};
pub use fetcher::{build_http_client, is_retriable_status, Fetcher, RetryPolicy};
pub use page::Page;
