//! Crawler module for page fetching and tree assembly
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with phase timing
//! - Optional headless-browser rendering
//! - HTML element and e-mail extraction
//! - The crawl policy (depth, domain, revisit)
//! - Parent inference and tree assembly from fetch events
//! - Depth-first crawl coordination

mod assembler;
mod coordinator;
mod fetcher;
mod parser;
mod policy;
mod render;
mod resolver;
mod scheduler;
mod timing;
mod transport;

pub use assembler::{Cursor, TreeAssembler, Visit};
pub use coordinator::Crawler;
pub use fetcher::{
    build_http_client, FetchError, FetchResponse, Fetcher, HttpFetcher, MAX_REDIRECTS,
};
pub use parser::{extract_elements, DiscoveredElement, EmailExtractor};
pub use policy::{CrawlPolicy, SkipReason};
pub use render::{find_browser_executable, ChromeRenderer, NoRenderer, RenderError, Renderer};
pub use resolver::{ParentResolver, RequestId};
pub use scheduler::{Frame, Scheduler};
pub use timing::{PhaseClock, PhaseEvent, PhaseMark};
pub use transport::{tls_config, ConnectTiming, ConnectTimingLayer, PhaseRecorder, TimingResolver};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::{validate, Config};
use crate::output::CrawlResult;
use crate::SiteTreeError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and build the crawl policy and an HTTP fetch engine enforcing its body cap
/// 2. Launch the browser when rendering is configured
/// 3. Crawl depth-first from the seed
/// 4. Return the assembled tree and status-code counts
///
/// # Arguments
///
/// * `config` - The crawl configuration, with every layer applied
/// * `stop` - Raising this flag ends the crawl early with a partial tree
///
/// # Returns
///
/// * `Ok(CrawlResult)` - Crawl finished or was stopped
/// * `Err(SiteTreeError)` - The crawl could not be set up
pub async fn crawl(config: &Config, stop: Arc<AtomicBool>) -> Result<CrawlResult, SiteTreeError> {
    validate(config)?;
    let policy = CrawlPolicy::from_config(config);
    let fetcher = HttpFetcher::new(&config.client)?.with_max_body_size(policy.max_body_size());
    let crawler = Crawler::with_policy(config, policy, fetcher)?.with_stop_flag(stop);

    let result = match ChromeRenderer::from_config(&config.render).await? {
        Some(renderer) => crawler.with_renderer(renderer).run().await,
        None => crawler.run().await,
    };

    Ok(result)
}
