//! Serializable shape of a finished crawl

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CrawlStatistics;
use crate::tree::{NodeId, PageTree, PhaseTiming};

/// Phase timing as stored in the output document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingDocument {
    #[serde(with = "super::nanos")]
    pub dns: std::time::Duration,
    #[serde(with = "super::nanos")]
    pub connect: std::time::Duration,
    #[serde(with = "super::nanos")]
    pub tls_handshake: std::time::Duration,
    #[serde(with = "super::nanos")]
    pub first_byte: std::time::Duration,
    #[serde(with = "super::nanos")]
    pub download: std::time::Duration,
}

impl From<PhaseTiming> for TimingDocument {
    fn from(t: PhaseTiming) -> Self {
        Self {
            dns: t.dns,
            connect: t.connect,
            tls_handshake: t.tls_handshake,
            first_byte: t.first_byte,
            download: t.download,
        }
    }
}

/// A page and, recursively, every page attached under it
///
/// The parent link of the in-memory tree is not part of this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub url: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub length: usize,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default)]
    pub time: TimingDocument,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageDocument>,
}

impl PageDocument {
    /// Builds the document for `id` and everything attached below it
    pub fn from_tree(tree: &PageTree, id: NodeId) -> Option<Self> {
        let node = tree.get(id)?;
        Some(Self {
            url: node.url.clone(),
            status_code: node.status_code,
            length: node.length,
            content_type: node.content_type.clone(),
            time: node.time.into(),
            links: node.links.clone(),
            images: node.images.clone(),
            scripts: node.scripts.clone(),
            styles: node.styles.clone(),
            emails: node.emails.clone(),
            children: tree
                .children(id)
                .iter()
                .filter_map(|child| Self::from_tree(tree, *child))
                .collect(),
        })
    }

    /// Number of pages in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// Finds the first page in this subtree with the given URL
    pub fn find(&self, url: &str) -> Option<&PageDocument> {
        if self.url == url {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(url))
    }
}

/// Root of the output document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub root: Option<PageDocument>,
    #[serde(default)]
    pub status_codes: BTreeMap<u16, u64>,
}

impl CrawlResult {
    pub fn new(tree: &PageTree, stats: CrawlStatistics) -> Self {
        Self {
            root: tree.root().and_then(|id| PageDocument::from_tree(tree, id)),
            status_codes: stats.into_status_codes(),
        }
    }

    /// Status-code counts as statistics
    pub fn statistics(&self) -> CrawlStatistics {
        CrawlStatistics::from(self.status_codes.clone())
    }

    /// Number of pages reachable from the root
    pub fn page_count(&self) -> usize {
        self.root.as_ref().map(PageDocument::count).unwrap_or(0)
    }
}
