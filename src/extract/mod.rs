//! Field extraction
//!
//! Turns a parsed page plus a locator table into a `PartialRecord`. A field
//! that cannot be located is recorded as `None`; extraction itself never fails.

mod locator;
pub mod table;

pub use locator::{Anchor, FieldLocator, NavStep, PageKind};
pub use table::default_locators;

use crate::crawler::page::{
    element_text, find_by_pattern, find_by_text, next_sibling_element, parent_element,
    select_first_in,
};
use crate::crawler::Page;
use crate::record::Field;
use std::collections::BTreeMap;

/// Raw extraction result for one zip code
///
/// Every `Field` is always present as a key; fields not found hold `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    values: BTreeMap<Field, Option<String>>,
}

impl PartialRecord {
    /// Creates a record with every field set to `None`
    pub fn new() -> Self {
        Self {
            values: Field::ALL.iter().map(|f| (*f, None)).collect(),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).and_then(|v| v.as_deref())
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        self.values.insert(field, value);
    }

    /// Copies every found value from `other` into this record
    pub fn merge(&mut self, other: PartialRecord) {
        for (field, value) in other.values {
            if value.is_some() {
                self.values.insert(field, value);
            }
        }
    }

    /// Fields with no value, in column order
    pub fn missing(&self) -> Vec<Field> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(f, _)| *f)
            .collect()
    }

    /// Iterates over all fields and their raw values, in column order
    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<&str>)> {
        self.values.iter().map(|(f, v)| (*f, v.as_deref()))
    }
}

impl Default for PartialRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies every locator to `page`
///
/// Fields without a locator in `locators`, and fields whose locator finds
/// nothing, are `None` in the result.
pub fn extract(page: &Page, locators: &[FieldLocator]) -> PartialRecord {
    let mut record = PartialRecord::new();

    for locator in locators {
        let value = locate(page, locator);
        if value.is_none() {
            tracing::debug!("{} not found on {}", locator.field, page.url());
        }
        record.set(locator.field, value);
    }

    record
}

/// Resolves one locator against a page
fn locate(page: &Page, locator: &FieldLocator) -> Option<String> {
    let scope = match &locator.scope {
        Some(selector) => page.select_first(selector)?,
        None => page.root(),
    };

    let (mut node, anchor_text) = match &locator.anchor {
        Anchor::Text { tag, text } => (find_by_text(scope, tag, text)?, None),
        Anchor::Pattern { tag, pattern } => {
            let (node, matched) = find_by_pattern(scope, *tag, pattern)?;
            (node, Some(matched))
        }
    };

    for step in &locator.path {
        node = match step {
            NavStep::Parent => parent_element(node)?,
            NavStep::NextSibling => next_sibling_element(node)?,
            NavStep::Find(selector) => select_first_in(node, selector)?,
        };
    }

    // Pattern anchor without a path: capture from the matched text only
    let text = match anchor_text {
        Some(matched) if locator.path.is_empty() => matched,
        _ => element_text(node),
    };
    let raw = match &locator.capture {
        Some(re) => {
            let caps = re.captures(&text)?;
            caps.get(1).or_else(|| caps.get(0))?.as_str().trim().to_string()
        }
        None => text,
    };

    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}
