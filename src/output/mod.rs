//! Output module for crawl results
//!
//! This module handles:
//! - Aggregate status-code statistics
//! - The serializable crawl document (page tree plus statistics)
//! - Rendering the document as JSON or YAML and writing it out

mod document;
mod format;
pub mod stats;

pub use document::{CrawlResult, PageDocument, TimingDocument};
pub use format::{write_result, OutputFormat};
pub use stats::{log_statistics, CrawlStatistics};

use thiserror::Error;

/// Errors raised while producing the output document
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Serde helpers storing a `Duration` as integer nanoseconds
pub(crate) mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
