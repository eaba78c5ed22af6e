//! Aggregate crawl statistics

use std::collections::BTreeMap;

/// Status-code counts collected during a crawl
///
/// Every response and every redirect hop that produced a page is counted once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    status_codes: BTreeMap<u16, u64>,
}

impl CrawlStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status_code: u16) {
        *self.status_codes.entry(status_code).or_insert(0) += 1;
    }

    pub fn count(&self, status_code: u16) -> u64 {
        self.status_codes.get(&status_code).copied().unwrap_or(0)
    }

    /// Total number of recorded responses
    pub fn total(&self) -> u64 {
        self.status_codes.values().sum()
    }

    pub fn status_codes(&self) -> &BTreeMap<u16, u64> {
        &self.status_codes
    }

    pub fn into_status_codes(self) -> BTreeMap<u16, u64> {
        self.status_codes
    }
}

impl From<BTreeMap<u16, u64>> for CrawlStatistics {
    fn from(status_codes: BTreeMap<u16, u64>) -> Self {
        Self { status_codes }
    }
}

/// Logs a one-line-per-class summary of the statistics
pub fn log_statistics(stats: &CrawlStatistics) {
    tracing::info!("Responses recorded: {}", stats.total());

    // Sort codes by count (descending)
    let mut counts: Vec<_> = stats.status_codes().iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    for (code, count) in counts {
        let percentage = (*count as f64 / stats.total() as f64) * 100.0;
        tracing::info!("  HTTP {}: {} ({:.1}%)", code, count, percentage);
    }
}
