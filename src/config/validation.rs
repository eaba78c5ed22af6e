use crate::config::types::{ClientConfig, Config, RenderConfig, ScanConfig};
use crate::url::{parse_seed, validate_pattern};
use crate::{ConfigError, ConfigResult};

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_scan_config(&config.scan)?;
    validate_client_config(&config.client)?;
    validate_render_config(&config.render)?;
    Ok(())
}

/// Validates the seed URL, depth and domain patterns
fn validate_scan_config(config: &ScanConfig) -> ConfigResult<()> {
    if config.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "a seed URL is required".to_string(),
        ));
    }

    parse_seed(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.url, e)))?;

    if config.max_depth < -1 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be -1 (unbounded) or >= 0, got {}",
            config.max_depth
        )));
    }

    for domain in &config.domains {
        validate_pattern(domain)?;
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_client_config(config: &ClientConfig) -> ConfigResult<()> {
    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be blank".to_string(),
            ));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout must be at least 1 second".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(())
}

fn validate_render_config(config: &RenderConfig) -> ConfigResult<()> {
    if config.browser.is_some() && config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "render timeout must be at least 1 second".to_string(),
        ));
    }

    if let Some(path) = &config.executable {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "browser executable {} does not exist",
                path.display()
            )));
        }
    }

    Ok(())
}
