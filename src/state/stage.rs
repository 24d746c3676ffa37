//! Per-target and per-run stage definitions
//!
//! A zip code moves through the `TargetStage`s in order. The stage a target
//! had reached when it failed is recorded with its failure marker.

use crate::extract::PageKind;
use std::fmt;

/// Where processing of a single crawl target currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetStage {
    /// Checking the store for an existing record
    SkipIfExists,

    /// Fetching and parsing the per-zip detail page
    FetchDetail,

    /// Reading the category links from the detail page's menu
    ResolveMenuLinks,

    /// Fetching one of the four category pages
    FetchCategory(PageKind),

    /// Applying the locator table
    Extract,

    /// Converting raw strings into typed values
    Normalize,

    /// Writing the record
    Persist,
}

impl TargetStage {
    /// Converts the stage to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::SkipIfExists => "skip_if_exists",
            Self::FetchDetail => "fetch_detail",
            Self::ResolveMenuLinks => "resolve_menu_links",
            Self::FetchCategory(PageKind::Housing) => "fetch_housing",
            Self::FetchCategory(PageKind::CostOfLiving) => "fetch_cost_of_living",
            Self::FetchCategory(PageKind::Crime) => "fetch_crime",
            Self::FetchCategory(PageKind::JobMarket) => "fetch_job_market",
            Self::FetchCategory(PageKind::Detail) => "fetch_detail",
            Self::Extract => "extract",
            Self::Normalize => "normalize",
            Self::Persist => "persist",
        }
    }

    /// Parses a stage from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "skip_if_exists" => Some(Self::SkipIfExists),
            "fetch_detail" => Some(Self::FetchDetail),
            "resolve_menu_links" => Some(Self::ResolveMenuLinks),
            "fetch_housing" => Some(Self::FetchCategory(PageKind::Housing)),
            "fetch_cost_of_living" => Some(Self::FetchCategory(PageKind::CostOfLiving)),
            "fetch_crime" => Some(Self::FetchCategory(PageKind::Crime)),
            "fetch_job_market" => Some(Self::FetchCategory(PageKind::JobMarket)),
            "extract" => Some(Self::Extract),
            "normalize" => Some(Self::Normalize),
            "persist" => Some(Self::Persist),
            _ => None,
        }
    }
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Where a whole run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    /// Walking the hierarchy; indexes are zero-based and in page order
    Crawling { state_index: usize, zip_index: usize },
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Crawling {
                state_index,
                zip_index,
            } => write!(f, "crawling(state {}, zip {})", state_index, zip_index),
            Self::Done => write!(f, "done"),
        }
    }
}
