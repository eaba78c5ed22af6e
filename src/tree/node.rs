use std::fmt;
use std::time::Duration;

use super::NodeId;

/// Latency breakdown of a single request
///
/// Phases that did not happen stay at zero, e.g. `tls_handshake` for a
/// plaintext request or `dns` when the host was an IP literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub dns: Duration,
    pub connect: Duration,
    pub tls_handshake: Duration,
    /// Measured from the start of the request
    pub first_byte: Duration,
    /// Measured from the first response byte
    pub download: Duration,
}

/// Kind of resource referenced from an HTML page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Link,
    Image,
    Script,
    Style,
}

impl ElementKind {
    /// Every kind, in the order elements are extracted from a page
    pub const ALL: [ElementKind; 4] = [Self::Link, Self::Image, Self::Script, Self::Style];

    /// CSS selector matching elements of this kind
    pub fn selector(&self) -> &'static str {
        match self {
            Self::Link => "a[href]",
            Self::Image => "img[src]",
            Self::Script => "script[src]",
            Self::Style => "link[rel='stylesheet']",
        }
    }

    /// Attribute holding the referenced URL
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Link | Self::Style => "href",
            Self::Image | Self::Script => "src",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Link => "link",
            Self::Image => "image",
            Self::Script => "script",
            Self::Style => "style",
        };
        write!(f, "{}", s)
    }
}

/// One fetched resource
#[derive(Debug, Clone, Default)]
pub struct PageNode {
    pub url: String,
    /// Zero until a response or redirect arrives
    pub status_code: u16,
    pub length: usize,
    pub content_type: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    pub emails: Vec<String>,
    pub time: PhaseTiming,
    /// Crawl depth of the request that produced this node
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub(super) attached: bool,
}

impl PageNode {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Resources of the given kind discovered on this page
    pub fn resources(&self, kind: ElementKind) -> &[String] {
        match kind {
            ElementKind::Link => &self.links,
            ElementKind::Image => &self.images,
            ElementKind::Script => &self.scripts,
            ElementKind::Style => &self.styles,
        }
    }

    /// Records a resource unless it is already listed
    ///
    /// Returns true if the resource was new.
    pub fn add_resource(&mut self, kind: ElementKind, url: &str) -> bool {
        let list = match kind {
            ElementKind::Link => &mut self.links,
            ElementKind::Image => &mut self.images,
            ElementKind::Script => &mut self.scripts,
            ElementKind::Style => &mut self.styles,
        };
        push_unique(list, url)
    }

    /// Records an e-mail address unless it is already listed
    pub fn add_email(&mut self, email: &str) -> bool {
        push_unique(&mut self.emails, email)
    }

    /// Returns true once a response or redirect has been recorded
    pub fn is_resolved(&self) -> bool {
        self.status_code != 0
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}
