//! sitetree: crawl a website into a tree of pages
//!
//! This crate crawls a site from a seed URL up to a bounded depth and rebuilds
//! the crawl as a parent-linked tree of pages, each carrying its status code,
//! content type, discovered resources and per-phase request timing. The tree
//! and aggregate status-code counts are serialized to JSON or YAML.

pub mod config;
pub mod crawler;
pub mod output;
pub mod tree;
pub mod url;

use thiserror::Error;

/// Main error type for sitetree operations
#[derive(Debug, Error)]
pub enum SiteTreeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Render error: {0}")]
    Render(#[from] crawler::RenderError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid value {value:?} for environment variable {name}")]
    Env { name: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Empty URL reference")]
    Empty,
}

/// Result type alias for sitetree operations
pub type Result<T> = std::result::Result<T, SiteTreeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Crawler, TreeAssembler};
pub use output::{CrawlResult, CrawlStatistics, OutputFormat, PageDocument};
pub use tree::{NodeId, PageNode, PageTree, PhaseTiming};
