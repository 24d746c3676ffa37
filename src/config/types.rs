use crate::record::Field;
use serde::{Deserialize, Serialize};

/// Main configuration structure for zip-harvest
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

/// Entry point and navigation labels of the statistics site
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Root listing page; every other URL is discovered from it
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Heading text preceding the list of state links
    #[serde(rename = "state-heading")]
    pub state_heading: String,

    /// Label of the link from a state page to its zip-code index
    #[serde(rename = "zip-index-label")]
    pub zip_index_label: String,

    /// CSS selector of the category menu on the detail page
    #[serde(rename = "menu-selector")]
    pub menu_selector: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_url: "https://www.bestplaces.net/find/".to_string(),
            state_heading: "Click a State and Browse".to_string(),
            zip_index_label: "Zip Codes".to_string(),
            menu_selector: "ul.list-group".to_string(),
        }
    }
}

/// HTTP retry and timeout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Retries after the first attempt before giving up
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds); doubles on each retry
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Adds up to 20% random jitter to each delay
    pub jitter: bool,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 9999,
            base_delay_ms: 1000,
            max_delay_ms: 120_000,
            jitter: true,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", skip_serializing_if = "Option::is_none")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "bestplaces.db".to_string(),
        }
    }
}

/// What the coordinator does when a single zip code fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole run
    #[default]
    Abort,

    /// Record a failure marker for the zip code and continue
    Skip,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    #[serde(rename = "on-target-error")]
    pub on_target_error: ErrorPolicy,

    /// Statistics actually written; the rest are stored as NULL. All when unset.
    #[serde(rename = "persisted-fields", skip_serializing_if = "Option::is_none")]
    pub persisted_fields: Option<Vec<Field>>,
}

impl CrawlerConfig {
    /// The effective persisted-field set, in column order
    pub fn persisted(&self) -> Vec<Field> {
        match &self.persisted_fields {
            Some(fields) => Field::ALL
                .iter()
                .copied()
                .filter(|f| fields.contains(f))
                .collect(),
            None => Field::ALL.to_vec(),
        }
    }
}
