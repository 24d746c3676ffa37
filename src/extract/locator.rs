//! Declarative field locators
//!
//! A locator says where a field's value lives relative to an anchor element.
//! Locators are plain data; `extract` interprets all of them with one routine.

use crate::crawler::page::parse_selector;
use crate::record::Field;
use crate::HarvestError;
use regex::Regex;
use scraper::Selector;
use std::fmt;

/// The page of the hierarchy a locator applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// The per-zip detail page
    Detail,
    Housing,
    CostOfLiving,
    Crime,
    JobMarket,
}

impl PageKind {
    /// The category pages reached from the detail page's menu, in fetch order
    pub const CATEGORIES: [PageKind; 4] = [
        PageKind::Housing,
        PageKind::CostOfLiving,
        PageKind::Crime,
        PageKind::JobMarket,
    ];

    /// Label of the menu link leading to this page
    pub fn menu_label(&self) -> Option<&'static str> {
        match self {
            Self::Detail => None,
            Self::Housing => Some("Housing Stats"),
            Self::CostOfLiving => Some("Cost of Living"),
            Self::Crime => Some("Crime"),
            Self::JobMarket => Some("Job Market"),
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Housing => "housing",
            Self::CostOfLiving => "cost_of_living",
            Self::Crime => "crime",
            Self::JobMarket => "job_market",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// How the anchor element is found
#[derive(Debug, Clone)]
pub enum Anchor {
    /// A `tag` element whose text is exactly `text`
    Text { tag: &'static str, text: &'static str },

    /// An element whose text matches `pattern`; with no tag, any text node
    Pattern {
        tag: Option<&'static str>,
        pattern: Regex,
    },
}

/// One hop from the anchor towards the value
#[derive(Debug, Clone)]
pub enum NavStep {
    Parent,
    NextSibling,
    Find(Selector),
}

/// Where a single field's value lives
#[derive(Debug, Clone)]
pub struct FieldLocator {
    pub field: Field,
    pub page: PageKind,
    /// Restricts the anchor search to the first element matching this selector
    pub scope: Option<Selector>,
    pub anchor: Anchor,
    pub path: Vec<NavStep>,
    /// Cuts the value out of free text; first capture group if present
    pub capture: Option<Regex>,
}

impl FieldLocator {
    /// Locator anchored on a `tag` element with exact text
    pub fn text(field: Field, page: PageKind, tag: &'static str, text: &'static str) -> Self {
        Self {
            field,
            page,
            scope: None,
            anchor: Anchor::Text { tag, text },
            path: Vec::new(),
            capture: None,
        }
    }

    /// Locator anchored on the first element (or text node) matching `pattern`
    pub fn pattern(
        field: Field,
        page: PageKind,
        tag: Option<&'static str>,
        pattern: &str,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            field,
            page,
            scope: None,
            anchor: Anchor::Pattern {
                tag,
                pattern: Regex::new(pattern)?,
            },
            path: Vec::new(),
            capture: None,
        })
    }

    /// Restricts the anchor search to the subtree matching `css`
    pub fn within(mut self, css: &str) -> Result<Self, HarvestError> {
        self.scope = Some(parse_selector(css)?);
        Ok(self)
    }

    pub fn path(mut self, steps: impl IntoIterator<Item = NavStep>) -> Self {
        self.path = steps.into_iter().collect();
        self
    }

    pub fn capture(mut self, pattern: &str) -> Result<Self, HarvestError> {
        self.capture = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Short human-readable description, used by `--dry-run`
    pub fn describe(&self) -> String {
        let anchor = match &self.anchor {
            Anchor::Text { tag, text } => format!("<{}> \"{}\"", tag, text),
            Anchor::Pattern { tag: Some(tag), pattern } => format!("<{}> /{}/", tag, pattern),
            Anchor::Pattern { tag: None, pattern } => format!("text /{}/", pattern),
        };
        let path: Vec<&str> = self
            .path
            .iter()
            .map(|step| match step {
                NavStep::Parent => "parent",
                NavStep::NextSibling => "next",
                NavStep::Find(_) => "find",
            })
            .collect();

        let mut out = format!("{} [{}] {}", self.field, self.page, anchor);
        if self.scope.is_some() {
            out.push_str(" (scoped)");
        }
        if !path.is_empty() {
            out.push_str(&format!(" -> {}", path.join(" -> ")));
        }
        if let Some(capture) = &self.capture {
            out.push_str(&format!(" ~ /{}/", capture));
        }
        out
    }
}
