//! Configuration module for zip-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every section is optional, so the harvester also runs with no
//! configuration file at all.
//!
//! # Example
//!
//! ```no_run
//! use zip_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("zip-harvest.toml")).unwrap();
//! println!("Crawl starts at: {}", config.site.root_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ErrorPolicy, FetcherConfig, OutputConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{config_fingerprint, load_config, parse_config};
pub use validation::validate;
