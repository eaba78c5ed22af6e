use crate::{ConfigError, ConfigResult};

/// Checks a host against one allow-list pattern
///
/// `example.test` matches only that host. `*.example.test` matches the bare
/// domain and any subdomain of it.
pub fn matches_pattern(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || host
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Set of hosts a crawl may visit
///
/// The seed URL's host is always part of the list, so an empty configured list
/// restricts the crawl to the seed's own host.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    patterns: Vec<String>,
}

impl AllowList {
    /// Builds an allow-list from configured patterns plus the seed host
    pub fn new<I, S>(patterns: I, seed_host: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if let Some(host) = seed_host {
            let host = host.to_lowercase();
            if !host.is_empty() && !list.iter().any(|p| matches_pattern(p, &host)) {
                list.push(host);
            }
        }

        Self { patterns: list }
    }

    /// Returns true if the host may be visited
    pub fn allows(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.patterns.iter().any(|p| matches_pattern(p, &host))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Rejects patterns that could never match a host
pub fn validate_pattern(pattern: &str) -> ConfigResult<()> {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    if base.is_empty() || base.contains('*') || base.contains('/') || base.contains(':') {
        return Err(ConfigError::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}
