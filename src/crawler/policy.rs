//! Visit policy applied to every discovered URL before it is fetched

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::Config;
use crate::url::{extract_domain, AllowList};

/// Why a URL was not visited
///
/// These are expected outcomes of the crawl policy, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The exact URL was already accepted once in this crawl
    AlreadyVisited,
    /// The visit would be deeper than the configured maximum
    MaxDepth,
    /// The reference was empty or did not resolve to an HTTP(S) URL
    MissingUrl,
    /// The host is not on the allow-list
    ForbiddenDomain,
    /// The page already lists this resource
    Duplicate,
    /// No page is current, so the element cannot be attributed
    NoCurrentPage,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlreadyVisited => "URL already visited",
            Self::MaxDepth => "max depth limit reached",
            Self::MissingUrl => "missing URL",
            Self::ForbiddenDomain => "forbidden domain",
            Self::Duplicate => "duplicate resource",
            Self::NoCurrentPage => "no current page",
        };
        write!(f, "{}", s)
    }
}

/// Crawl-wide visit policy
#[derive(Debug)]
pub struct CrawlPolicy {
    max_depth: Option<u32>,
    allow: AllowList,
    visited: HashSet<String>,
    max_body_size: usize,
}

impl CrawlPolicy {
    /// Creates a policy
    ///
    /// A `max_depth` of `None` means unbounded.
    pub fn new(max_depth: Option<u32>, allow: AllowList, max_body_size: usize) -> Self {
        Self {
            max_depth,
            allow,
            visited: HashSet::new(),
            max_body_size,
        }
    }

    /// Builds the policy described by a crawl configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_depth(),
            config.allow_list(),
            config.client.max_body_size,
        )
    }

    /// Decides whether `candidate` may be fetched at `depth`
    ///
    /// Rules are applied in order: depth, domain, revisit. On acceptance the
    /// URL is marked visited immediately, so a second discovery of the same
    /// URL is rejected even before the first fetch has completed.
    pub fn check(&mut self, candidate: &Url, depth: u32) -> Result<(), SkipReason> {
        if self.max_depth.is_some_and(|max| depth > max) {
            return Err(SkipReason::MaxDepth);
        }

        let host = extract_domain(candidate).ok_or(SkipReason::MissingUrl)?;
        if !self.allow.allows(&host) {
            return Err(SkipReason::ForbiddenDomain);
        }

        if !self.visited.insert(candidate.as_str().to_string()) {
            return Err(SkipReason::AlreadyVisited);
        }

        Ok(())
    }

    /// Applies only the domain rule, used for redirect targets
    pub fn allows_host(&self, candidate: &Url) -> bool {
        extract_domain(candidate).is_some_and(|host| self.allow.allows(&host))
    }

    /// Marks a URL visited without checking it
    pub fn mark_visited(&mut self, url: &Url) {
        self.visited.insert(url.as_str().to_string());
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Body size cap the fetch engine must enforce
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
