//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests returning the page body
//! - Retry with capped exponential backoff for transient failures
//! - Error classification (retriable vs. fatal)

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::crawler::page::Page;
use crate::{FetchError, HarvestError};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Maximum number of redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// How failed requests are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Adds up to 20% random jitter to each delay
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// `min(base * 2^(retry - 1), max)`, plus jitter when enabled.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;

        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let capped = base_ms.saturating_mul(factor).min(max_ms);

        let jitter = if self.jitter && capped >= 5 {
            fastrand::u64(0..=capped / 5)
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }

    /// Total attempts this policy allows, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// A failed attempt, classified for the retry loop
#[derive(Debug)]
enum AttemptError {
    /// Worth retrying (network failure, 408/429/5xx gateway errors)
    Transient(String),
    /// Retrying cannot help
    Fatal(FetchError),
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `fetcher` - Timeout settings
/// * `user_agent` - The user agent identification
///
/// # Example
///
/// ```no_run
/// use zip_harvest::config::{FetcherConfig, UserAgentConfig};
/// use zip_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default(), &UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    fetcher: &FetcherConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(fetcher.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for HTTP statuses that are worth retrying
pub fn is_retriable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Sequential HTTP fetcher with retry
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    pub fn new(fetcher: &FetcherConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client = build_http_client(fetcher, user_agent)?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_config(fetcher),
        })
    }

    /// Replaces the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL and returns its body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Malformed or non-http(s) URL | Immediate `InvalidUrl` |
    /// | HTTP 2xx | Return body |
    /// | HTTP 408, 429, 500, 502, 503, 504 | Retry with backoff |
    /// | Any other status | Immediate `Status` |
    /// | Timeout, connection or body error | Retry with backoff |
    /// | Redirect error (loop, > 10 hops) | Immediate `Client` |
    ///
    /// Once the retry budget is spent, `RetriesExhausted` carries the
    /// attempt count and the last failure.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = validate_url(url)?;
        tracing::info!("Fetching {}", parsed);

        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            let last_error = match self.attempt(&parsed).await {
                Ok(body) => {
                    tracing::debug!("Fetched {} ({} bytes)", parsed, body.len());
                    return Ok(body);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(reason)) => reason,
            };

            if attempt >= max_attempts {
                tracing::error!(
                    "Giving up on {} after {} attempts: {}",
                    parsed,
                    attempt,
                    last_error
                );
                return Err(FetchError::RetriesExhausted {
                    url: parsed.to_string(),
                    attempts: attempt,
                    last_error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                "Attempt {} for {} failed ({}); retrying in {:?}",
                attempt,
                parsed,
                last_error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Fetches a URL and parses the body into a `Page`
    pub async fn fetch_page(&self, url: &Url) -> Result<Page, HarvestError> {
        let body = self.fetch(url.as_str()).await?;
        tracing::debug!("Parsing {}", url);
        Page::parse(&body, url.clone())
    }

    async fn attempt(&self, url: &Url) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(if is_retriable_status(status) {
                AttemptError::Transient(format!("HTTP {}", status.as_u16()))
            } else {
                AttemptError::Fatal(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            });
        }

        response.text().await.map_err(classify_error)
    }
}

/// Rejects URLs the fetcher will never be able to request
fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Classifies a transport error
fn classify_error(e: reqwest::Error) -> AttemptError {
    if e.is_redirect() || e.is_builder() {
        AttemptError::Fatal(FetchError::Client(e))
    } else if e.is_timeout() {
        AttemptError::Transient("request timeout".to_string())
    } else if e.is_connect() {
        AttemptError::Transient(format!("connection failed: {}", e))
    } else {
        AttemptError::Transient(e.to_string())
    }
}
