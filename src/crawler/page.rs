//! HTML page wrapper with text-anchored lookup
//!
//! This module wraps `scraper::Html` and exposes the lookups the harvester
//! needs on loosely structured statistics pages:
//! - Find an element of a given tag whose text is exactly some label
//! - Find an element (or any text node) whose text matches a pattern
//! - Find by tag plus id or class, or by CSS selector
//! - Walk to the parent or to the next element sibling
//! - Resolve link hrefs against the page URL

use crate::HarvestError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fetched and parsed page
#[derive(Debug)]
pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    /// Parses a response body into a navigable document
    ///
    /// # Arguments
    ///
    /// * `body` - The raw HTML body
    /// * `url` - The URL the body was fetched from, used to resolve links
    ///
    /// # Returns
    ///
    /// * `Ok(Page)` - Parsed page (possibly an incomplete tree for malformed markup)
    /// * `Err(HarvestError::Parse)` - The body contains no markup at all
    ///
    /// # Example
    ///
    /// ```
    /// use zip_harvest::crawler::Page;
    /// use url::Url;
    ///
    /// let html = r#"<html><body><p><b>Population</b></p><p>1,234</p></body></html>"#;
    /// let page = Page::parse(html, Url::parse("https://example.com/").unwrap()).unwrap();
    /// assert!(page.find_by_text("b", "Population").is_some());
    /// ```
    pub fn parse(body: &str, url: Url) -> Result<Self, HarvestError> {
        if body.trim().is_empty() {
            return Err(HarvestError::Parse {
                url: url.to_string(),
                message: "empty document".to_string(),
            });
        }

        let html = Html::parse_document(body);
        Ok(Self { url, html })
    }

    /// The URL this page was fetched from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The document's root element
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// First element matching a CSS selector
    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    /// First `tag` element whose text is exactly `text`
    pub fn find_by_text(&self, tag: &str, text: &str) -> Option<ElementRef<'_>> {
        find_by_text(self.root(), tag, text)
    }

    /// First element (or text node parent) matching `pattern`, with the matched text
    pub fn find_by_pattern(
        &self,
        tag: Option<&str>,
        pattern: &Regex,
    ) -> Option<(ElementRef<'_>, String)> {
        find_by_pattern(self.root(), tag, pattern)
    }

    /// First `tag` element with the given id
    pub fn find_by_id(&self, tag: &str, id: &str) -> Option<ElementRef<'_>> {
        elements_named(self.root(), tag)
            .into_iter()
            .find(|el| el.value().id() == Some(id))
    }

    /// First `tag` element carrying the given class
    pub fn find_by_class(&self, tag: &str, class: &str) -> Option<ElementRef<'_>> {
        elements_named(self.root(), tag)
            .into_iter()
            .find(|el| el.value().classes().any(|c| c == class))
    }

    /// Finds the `a` labelled `label` inside `scope` and resolves its href
    ///
    /// Returns None if there is no such anchor, it has no href, or the href
    /// cannot be resolved against this page's URL.
    pub fn link_by_text(&self, scope: ElementRef<'_>, label: &str) -> Option<Url> {
        let anchor = find_by_text(scope, "a", label)?;
        let href = anchor.value().attr("href")?;
        self.resolve(href)
    }

    /// Resolves an href against this page's URL
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }

        let resolved = self.url.join(href).ok()?;
        match resolved.scheme() {
            "http" | "https" => Some(resolved),
            _ => None,
        }
    }
}

/// Parses a CSS selector, mapping failures into `HarvestError::Selector`
pub fn parse_selector(css: &str) -> Result<Selector, HarvestError> {
    Selector::parse(css).map_err(|e| HarvestError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// All descendant elements of `scope` named `tag`, in document order
fn elements_named<'a>(scope: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == tag)
        .collect()
}

/// First `tag` element under `scope` whose whitespace-collapsed text equals `text`
pub fn find_by_text<'a>(scope: ElementRef<'a>, tag: &str, text: &str) -> Option<ElementRef<'a>> {
    elements_named(scope, tag)
        .into_iter()
        .find(|el| element_text(*el) == text)
}

/// First match of `pattern` under `scope`
///
/// With a tag, the element's full text is matched. Without one, individual
/// text nodes are matched and the node's parent element is returned.
/// The second value is the text that matched: the element's collapsed text,
/// or the single text node, never its siblings.
pub fn find_by_pattern<'a>(
    scope: ElementRef<'a>,
    tag: Option<&str>,
    pattern: &Regex,
) -> Option<(ElementRef<'a>, String)> {
    match tag {
        Some(tag) => elements_named(scope, tag).into_iter().find_map(|el| {
            let text = element_text(el);
            pattern.is_match(&text).then_some((el, text))
        }),
        None => scope.descendants().find_map(|node| {
            let text = node.value().as_text()?;
            if !pattern.is_match(text) {
                return None;
            }
            let parent = node.parent().and_then(ElementRef::wrap)?;
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            Some((parent, collapsed))
        }),
    }
}

/// First element under `scope` (excluding `scope` itself) matching `selector`
pub fn select_first_in<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).find(|el| *el != scope)
}

/// Parent element, if the parent is an element
pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Next sibling that is an element, skipping text and comment nodes
pub fn next_sibling_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Element text with runs of whitespace collapsed to single spaces
pub fn element_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
