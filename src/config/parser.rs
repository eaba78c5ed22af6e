use crate::config::types::{Browser, Config};
use crate::output::OutputFormat;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads and parses a configuration file from the given path
///
/// The result is not validated yet: environment variables and command-line
/// flags may still fill in missing values. Call
/// [`validate`](crate::config::validate) once every layer is applied.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sitetree::config::load_config;
///
/// let config = load_config(Path::new("sitetree.toml")).unwrap();
/// println!("Max depth: {}", config.scan.max_depth);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    Ok(toml::from_str(content)?)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two runs can be matched to the same settings.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies `SITETREE_*` variables from the process environment
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_env(config, |name| std::env::var(name).ok())
}

/// Applies `SITETREE_*` variables looked up through `lookup`
///
/// | Variable | Setting |
/// |----------|---------|
/// | `SITETREE_URL` | `scan.url` |
/// | `SITETREE_MAX_DEPTH` | `scan.max-depth` |
/// | `SITETREE_DOMAINS` | `scan.domains` (comma separated) |
/// | `SITETREE_REDIRECTS` | `scan.redirects` |
/// | `SITETREE_OUTPUT` | `output.format` |
/// | `SITETREE_FILE` | `output.file` |
/// | `SITETREE_USER_AGENT` | `client.user-agent` |
/// | `SITETREE_INSECURE` | `client.insecure` |
/// | `SITETREE_MAX_BODY_SIZE` | `client.max-body-size` |
/// | `SITETREE_BROWSER` | `render.browser` |
pub fn apply_env<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SITETREE_URL") {
        config.scan.url = url;
    }
    if let Some(depth) = lookup("SITETREE_MAX_DEPTH") {
        config.scan.max_depth = parse_var("SITETREE_MAX_DEPTH", &depth)?;
    }
    if let Some(domains) = lookup("SITETREE_DOMAINS") {
        config.scan.domains = domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(flag) = lookup("SITETREE_REDIRECTS") {
        config.scan.redirects = parse_bool("SITETREE_REDIRECTS", &flag)?;
    }
    if let Some(format) = lookup("SITETREE_OUTPUT") {
        config.output.format = parse_var::<OutputFormat>("SITETREE_OUTPUT", &format)?;
    }
    if let Some(file) = lookup("SITETREE_FILE") {
        config.output.file = (!file.is_empty()).then(|| PathBuf::from(file));
    }
    if let Some(agent) = lookup("SITETREE_USER_AGENT") {
        config.client.user_agent = (!agent.is_empty()).then_some(agent);
    }
    if let Some(flag) = lookup("SITETREE_INSECURE") {
        config.client.insecure = parse_bool("SITETREE_INSECURE", &flag)?;
    }
    if let Some(size) = lookup("SITETREE_MAX_BODY_SIZE") {
        config.client.max_body_size = parse_var("SITETREE_MAX_BODY_SIZE", &size)?;
    }
    if let Some(browser) = lookup("SITETREE_BROWSER") {
        config.render.browser = if browser.trim().is_empty() {
            None
        } else {
            Some(parse_var::<Browser>("SITETREE_BROWSER", &browser)?)
        };
    }
    Ok(())
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
