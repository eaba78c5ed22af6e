//! HTML extraction of referenced resources and e-mail addresses
//!
//! Elements are returned as raw attribute values. Resolving them against the
//! page URL, deduplicating and filtering is left to the tree assembler, which
//! knows which page they belong to.

use std::collections::VecDeque;

use regex::Regex;
use scraper::{Html, Selector};

use crate::tree::ElementKind;

/// Loose e-mail pattern, good enough for harvesting addresses from page text
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}";

/// An element discovered while parsing a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredElement {
    pub kind: ElementKind,
    pub value: String,
}

/// Extracts the referenced resources of the given kinds from an HTML document
///
/// Kinds are processed in the order given; within a kind, elements come in
/// document order. Empty attribute values are dropped.
///
/// # Example
///
/// ```
/// use sitetree::crawler::extract_elements;
/// use sitetree::tree::ElementKind;
///
/// let html = r#"<a href="/a">A</a><img src="/logo.png"><a href="/b">B</a>"#;
/// let found = extract_elements(html, &[ElementKind::Link, ElementKind::Image]);
/// let values: Vec<_> = found.iter().map(|e| e.value.as_str()).collect();
/// assert_eq!(values, vec!["/a", "/b", "/logo.png"]);
/// ```
pub fn extract_elements(html: &str, kinds: &[ElementKind]) -> VecDeque<DiscoveredElement> {
    let document = Html::parse_document(html);
    let mut found = VecDeque::new();

    for kind in kinds {
        let Ok(selector) = Selector::parse(kind.selector()) else {
            continue;
        };

        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(kind.attribute()) {
                let value = value.trim();
                if !value.is_empty() {
                    found.push_back(DiscoveredElement {
                        kind: *kind,
                        value: value.to_string(),
                    });
                }
            }
        }
    }

    found
}

/// Finds e-mail addresses in raw page text
#[derive(Debug, Clone)]
pub struct EmailExtractor {
    pattern: Regex,
}

impl EmailExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(EMAIL_PATTERN)?,
        })
    }

    /// Returns the distinct addresses in `text`, in order of first appearance
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(text) {
            let email = m.as_str();
            if !emails.iter().any(|e| e == email) {
                emails.push(email.to_string());
            }
        }
        emails
    }
}
