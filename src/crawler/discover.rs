//! Link discovery: nation → state → zip-code index → crawl targets
//!
//! The discoverer is a lazy cursor. The root page is fetched on the first
//! call, each state's zip-code index only once the previous state's targets
//! have been handed out, so a crawl never holds more than one state's
//! targets in memory and yields them in page order.

use crate::config::SiteConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::page::{element_text, next_sibling_element, Page};
use crate::HarvestError;
use regex::Regex;
use scraper::ElementRef;
use std::fmt;
use url::Url;

/// One zip code to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Zip code as shown on the index page
    pub zip_code: String,
    /// City name, empty if the index did not give one
    pub city: String,
    /// State name as shown on the root page
    pub state: String,
    /// Absolute URL of the zip code's detail page
    pub detail_url: Url,
}

impl CrawlTarget {
    /// Numeric store key; only exactly five ASCII digits qualify
    pub fn zip_key(&self) -> Option<i64> {
        if self.zip_code.len() == 5 && self.zip_code.bytes().all(|b| b.is_ascii_digit()) {
            self.zip_code.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.city.is_empty() {
            write!(f, "{} ({})", self.zip_code, self.state)
        } else {
            write!(f, "{} {}, {}", self.zip_code, self.city, self.state)
        }
    }
}

/// A state listed on the root page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLink {
    pub name: String,
    pub url: Url,
}

/// Lazy, deterministic walk over every zip code reachable from the root page
#[derive(Debug)]
pub struct LinkDiscoverer {
    root_url: Url,
    state_heading: String,
    zip_index_label: String,
    zip_pattern: Regex,
    city_pattern: Regex,
    /// None until the root page has been read
    states: Option<Vec<StateLink>>,
    /// Index of the next state to expand
    next_state: usize,
    targets: Vec<CrawlTarget>,
    next_target: usize,
}

impl LinkDiscoverer {
    pub fn new(site: &SiteConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            root_url: Url::parse(&site.root_url)?,
            state_heading: site.state_heading.clone(),
            zip_index_label: site.zip_index_label.clone(),
            zip_pattern: zip_pattern()?,
            city_pattern: city_pattern()?,
            states: None,
            next_state: 0,
            targets: Vec::new(),
            next_target: 0,
        })
    }

    /// Yields the next crawl target, fetching pages only as needed
    ///
    /// Returns `Ok(None)` once every state has been exhausted. Errors from
    /// the root, state, or index pages are returned as-is; the cursor does
    /// not advance past the page that failed.
    pub async fn next_target(
        &mut self,
        fetcher: &Fetcher,
    ) -> Result<Option<CrawlTarget>, HarvestError> {
        loop {
            if let Some(target) = self.targets.get(self.next_target) {
                self.next_target += 1;
                return Ok(Some(target.clone()));
            }

            if self.states.is_none() {
                let root = fetcher.fetch_page(&self.root_url).await?;
                let states = parse_state_links(&root, &self.state_heading)?;
                tracing::info!("Found {} states on {}", states.len(), self.root_url);
                self.states = Some(states);
            }

            let Some(state) = self
                .states
                .as_ref()
                .and_then(|states| states.get(self.next_state))
                .cloned()
            else {
                return Ok(None);
            };

            let targets = self.expand_state(fetcher, &state).await?;
            self.next_state += 1;
            self.targets = targets;
            self.next_target = 0;
        }
    }

    /// (state index, zip index) of the most recently yielded target
    pub fn position(&self) -> (usize, usize) {
        (
            self.next_state.saturating_sub(1),
            self.next_target.saturating_sub(1),
        )
    }

    /// Number of states found on the root page, once it has been read
    pub fn state_count(&self) -> Option<usize> {
        self.states.as_ref().map(Vec::len)
    }

    async fn expand_state(
        &self,
        fetcher: &Fetcher,
        state: &StateLink,
    ) -> Result<Vec<CrawlTarget>, HarvestError> {
        tracing::info!("Downloading zip codes in {}", state.name);
        let state_page = fetcher.fetch_page(&state.url).await?;

        let Some(index_url) = find_zip_index(&state_page, &self.zip_index_label) else {
            tracing::warn!(
                "No '{}' link on {}; skipping {}",
                self.zip_index_label,
                state.url,
                state.name
            );
            return Ok(Vec::new());
        };

        let index_page = fetcher.fetch_page(&index_url).await?;
        let targets = parse_zip_links(
            &index_page,
            &state.name,
            &self.zip_pattern,
            &self.city_pattern,
        );
        tracing::debug!("{}: {} zip codes", state.name, targets.len());
        Ok(targets)
    }
}

/// Leading five-digit code of a zip anchor's text
pub fn zip_pattern() -> Result<Regex, HarvestError> {
    Ok(Regex::new(r"^\s*(\d{5})")?)
}

/// Parenthesized city name of a zip anchor's text
pub fn city_pattern() -> Result<Regex, HarvestError> {
    Ok(Regex::new(r"\((.*)\)")?)
}

/// Reads the state links listed after the heading labelled `heading`
///
/// # Errors
///
/// `MissingLink` if no heading (h1-h6) carries exactly that text.
pub fn parse_state_links(page: &Page, heading: &str) -> Result<Vec<StateLink>, HarvestError> {
    let missing = || HarvestError::MissingLink {
        url: page.url().to_string(),
        label: heading.to_string(),
    };

    let heading_el = page
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| is_heading(el) && element_text(*el) == heading)
        .ok_or_else(missing)?;

    let list = next_sibling_element(heading_el).ok_or_else(missing)?;

    let states = list
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = page.resolve(href)?;
            Some(StateLink {
                name: element_text(a),
                url,
            })
        })
        .collect();

    Ok(states)
}

fn is_heading(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// URL of the zip-code index linked from a state page
pub fn find_zip_index(page: &Page, label: &str) -> Option<Url> {
    page.link_by_text(page.root(), label)
}

/// Turns every zip-code anchor on an index page into a crawl target
///
/// Anchors whose text does not start with five digits, or that have no
/// usable href, are skipped.
pub fn parse_zip_links(
    page: &Page,
    state: &str,
    zip_pattern: &Regex,
    city_pattern: &Regex,
) -> Vec<CrawlTarget> {
    page.root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .filter_map(|a| {
            let text = element_text(a);
            let zip_code = zip_pattern.captures(&text)?.get(1)?.as_str().to_string();

            let Some(detail_url) = a.value().attr("href").and_then(|href| page.resolve(href))
            else {
                tracing::debug!("Skipping zip anchor '{}' without a usable href", text);
                return None;
            };

            let city = city_pattern
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();

            Some(CrawlTarget {
                zip_code,
                city,
                state: state.to_string(),
                detail_url,
            })
        })
        .collect()
}
