use std::path::PathBuf;

use serde::Deserialize;

use crate::output::OutputFormat;
use crate::tree::ElementKind;
use crate::url::{domain_of, AllowList};

/// Default cap on response bodies: 10 MiB
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Main configuration structure for sitetree
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl Config {
    /// Maximum crawl depth, `None` when unbounded
    pub fn max_depth(&self) -> Option<u32> {
        u32::try_from(self.scan.max_depth).ok()
    }

    /// Allow-list built from the configured domains and the seed host
    pub fn allow_list(&self) -> AllowList {
        let seed_host = domain_of(&self.scan.url);
        AllowList::new(&self.scan.domains, seed_host.as_deref())
    }
}

/// What to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Seed URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of hops from the seed; -1 means unbounded
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: i64,

    /// Hosts that may be visited besides the seed host (`*.` wildcards allowed)
    #[serde(default)]
    pub domains: Vec<String>,

    /// Record redirect hops as pages of their own
    #[serde(default)]
    pub redirects: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: default_max_depth(),
            domains: Vec::new(),
            redirects: false,
        }
    }
}

fn default_max_depth() -> i64 {
    1
}

/// Which resources are recorded and followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CollectConfig {
    #[serde(default = "default_true")]
    pub links: bool,
    #[serde(default)]
    pub images: bool,
    #[serde(default)]
    pub scripts: bool,
    #[serde(default)]
    pub styles: bool,
    #[serde(default)]
    pub emails: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            links: true,
            images: false,
            scripts: false,
            styles: false,
            emails: false,
        }
    }
}

impl CollectConfig {
    pub fn enabled(&self, kind: ElementKind) -> bool {
        match kind {
            ElementKind::Link => self.links,
            ElementKind::Image => self.images,
            ElementKind::Script => self.scripts,
            ElementKind::Style => self.styles,
        }
    }

    /// Enabled element kinds, in extraction order
    pub fn kinds(&self) -> Vec<ElementKind> {
        ElementKind::ALL
            .into_iter()
            .filter(|k| self.enabled(*k))
            .collect()
    }
}

fn default_true() -> bool {
    true
}

/// HTTP client behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Bodies are truncated at this many bytes; 0 disables the cap
    #[serde(rename = "max-body-size", default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout", default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            insecure: false,
            max_body_size: default_max_body_size(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Where and how the document is written
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file; stdout when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Optional browser rendering of fetched pages
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub browser: Option<Browser>,

    /// Browser binary; discovered automatically when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Per-page render timeout (seconds)
    #[serde(rename = "timeout", default = "default_render_timeout")]
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: None,
            executable: None,
            timeout_secs: default_render_timeout(),
        }
    }
}

fn default_render_timeout() -> u64 {
    30
}

/// Supported rendering browsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}
