use std::io::Write;
use std::path::Path;

use serde::Deserialize;

use super::{CrawlResult, OutputError};

/// Encoding of the output document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// Renders the whole document
    pub fn render(&self, result: &CrawlResult) -> Result<String, OutputError> {
        match self {
            Self::Json => Ok(serde_json::to_string_pretty(result)?),
            Self::Yaml => Ok(serde_yaml::to_string(result)?),
        }
    }

    /// Parses a document previously produced by [`OutputFormat::render`]
    pub fn parse(&self, text: &str) -> Result<CrawlResult, OutputError> {
        match self {
            Self::Json => Ok(serde_json::from_str(text)?),
            Self::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Writes the rendered document to `file`, or to stdout when no file is given
///
/// Nothing is written unless rendering succeeded.
pub fn write_result(
    result: &CrawlResult,
    format: OutputFormat,
    file: Option<&Path>,
) -> Result<(), OutputError> {
    let rendered = format.render(result)?;

    match file {
        Some(path) => {
            std::fs::write(path, rendered.as_bytes())?;
            tracing::info!("Wrote {} document to {}", format, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n")?;
            }
            handle.flush()?;
        }
    }

    Ok(())
}
