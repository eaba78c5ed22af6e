//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Admitting the seed and fetching it
//! - Following redirects, recording each hop when enabled
//! - Optional browser rendering of HTML pages
//! - Feeding responses and discovered elements to the tree assembler
//! - Depth-first traversal through the [`Scheduler`]
//! - Stopping early when the stop flag is raised
//!
//! Requests run one at a time. Request ids grow monotonically from 1 and a
//! page's elements are fully processed, nested visits included, before the
//! driver moves on to the page's next sibling element.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use url::Url;

use crate::config::Config;
use crate::crawler::assembler::TreeAssembler;
use crate::crawler::fetcher::{FetchResponse, Fetcher, MAX_REDIRECTS};
use crate::crawler::parser::extract_elements;
use crate::crawler::policy::CrawlPolicy;
use crate::crawler::render::{NoRenderer, Renderer};
use crate::crawler::resolver::RequestId;
use crate::crawler::scheduler::{Frame, Scheduler};
use crate::output::CrawlResult;
use crate::tree::ElementKind;
use crate::url::parse_seed;
use crate::SiteTreeError;

/// Sequential depth-first crawler
pub struct Crawler<F, R = NoRenderer> {
    fetcher: F,
    renderer: Option<R>,
    assembler: TreeAssembler,
    kinds: Vec<ElementKind>,
    keep_bodies: bool,
    redirects: bool,
    seed: Url,
    next_id: RequestId,
    stop: Arc<AtomicBool>,
}

impl<F: Fetcher> Crawler<F, NoRenderer> {
    /// Creates a crawler for a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `fetcher` - The fetch engine to issue requests with
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(SiteTreeError)` - The seed URL is unusable
    pub fn new(config: &Config, fetcher: F) -> Result<Self, SiteTreeError> {
        Self::with_policy(config, CrawlPolicy::from_config(config), fetcher)
    }

    /// Creates a crawler that enforces an already built `policy`
    pub fn with_policy(
        config: &Config,
        policy: CrawlPolicy,
        fetcher: F,
    ) -> Result<Self, SiteTreeError> {
        let seed = parse_seed(&config.scan.url)?;
        let assembler = TreeAssembler::new(policy, config.collect)?;

        Ok(Self {
            fetcher,
            renderer: None,
            assembler,
            kinds: config.collect.kinds(),
            keep_bodies: config.collect.emails,
            redirects: config.scan.redirects,
            seed,
            next_id: 1,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl<F: Fetcher, R: Renderer> Crawler<F, R> {
    /// Replaces fetched HTML with the renderer's output before parsing
    pub fn with_renderer<R2: Renderer>(self, renderer: R2) -> Crawler<F, R2> {
        Crawler {
            fetcher: self.fetcher,
            renderer: Some(renderer),
            assembler: self.assembler,
            kinds: self.kinds,
            keep_bodies: self.keep_bodies,
            redirects: self.redirects,
            seed: self.seed,
            next_id: self.next_id,
            stop: self.stop,
        }
    }

    /// Uses an externally owned stop flag
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that stops the crawl once set; the partial tree is still returned
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the crawl to completion or until stopped
    pub async fn run(mut self) -> CrawlResult {
        tracing::info!("Starting crawl of {}", self.seed);
        let start_time = Instant::now();

        let seed = self.seed.clone();
        if let Err(reason) = self.assembler.admit(&seed, 0) {
            tracing::warn!("Seed {} rejected: {}", seed, reason);
            return self.assembler.finish();
        }

        let mut scheduler = Scheduler::new();
        if let Some(frame) = self.visit(&seed, 0).await {
            scheduler.push(frame);
        }

        loop {
            if self.is_stopped() {
                tracing::warn!(
                    "Crawl interrupted with {} elements pending, keeping partial tree",
                    scheduler.pending_elements()
                );
                // pages already fetched still get their scrape-complete pass
                while let Some(done) = scheduler.pop() {
                    self.assembler.resume(done.cursor);
                    self.assembler.on_scrape_complete(&done.body);
                }
                self.assembler.seal();
                break;
            }

            let Some(frame) = scheduler.top_mut() else {
                break;
            };
            let cursor = frame.cursor;

            let Some(element) = frame.next_element() else {
                if let Some(done) = scheduler.pop() {
                    self.assembler.resume(done.cursor);
                    self.assembler.on_scrape_complete(&done.body);
                }
                continue;
            };

            self.assembler.resume(cursor);
            match self.assembler.on_html_element(element.kind, &element.value) {
                Ok(visit) => {
                    if let Some(child) = self.visit(&visit.url, visit.depth).await {
                        scheduler.push(child);
                    }
                    // nested visits move the cursor
                    self.assembler.resume(cursor);
                }
                Err(reason) => {
                    tracing::trace!("Skipping {} {}: {}", element.kind, element.value, reason);
                }
            }
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.close().await;
        }

        tracing::info!(
            "Crawl completed: {} pages, {} URLs admitted, in {:?}",
            self.assembler.tree().len(),
            self.assembler.policy().visited_count(),
            start_time.elapsed()
        );

        self.assembler.finish()
    }

    /// Fetches one admitted URL and returns the frame of its elements
    ///
    /// Returns `None` when the request failed or the crawl was stopped.
    async fn visit(&mut self, url: &Url, depth: u32) -> Option<Frame> {
        let id = self.next_request_id();
        self.assembler.on_request_start(id, depth, url.as_str())?;

        let (final_url, response) = self.fetch_following(id, url).await?;

        let node = self.assembler.on_response(
            id,
            response.status,
            response.body.len(),
            response.content_type.as_deref(),
        )?;
        if final_url != *url && !self.redirects {
            self.assembler.rebase(node, final_url.clone());
        }
        let cursor = self.assembler.cursor()?;

        let is_html = response.is_html();
        let mut html = String::from_utf8_lossy(&response.body).into_owned();
        if is_html {
            if let Some(rendered) = self.render(&final_url).await {
                html = rendered;
            }
        }

        let elements = if is_html {
            extract_elements(&html, &self.kinds)
        } else {
            VecDeque::new()
        };
        let body = if self.keep_bodies { html } else { String::new() };

        Some(Frame::new(cursor, elements, body))
    }

    /// Issues request `id`, following redirects
    ///
    /// Each hop is recorded as a page of its own when redirects are recorded;
    /// otherwise only the final response is reported. Returns the URL that
    /// produced the final response along with it. A 3xx that is not followed
    /// becomes the final response.
    async fn fetch_following(&mut self, id: RequestId, url: &Url) -> Option<(Url, FetchResponse)> {
        let mut current = url.clone();
        let mut hops = 0;

        loop {
            let response = match self.fetcher.fetch(&current).await {
                Ok(response) => response,
                Err(e) => {
                    self.assembler.on_error(id, &e);
                    return None;
                }
            };
            self.assembler.on_phases(&response.phases);

            if self.is_stopped() {
                return Some((current, response));
            }
            let Some(target) = response.redirect_target(&current) else {
                return Some((current, response));
            };

            if hops >= MAX_REDIRECTS {
                tracing::warn!("Stopped after {} redirects at {}", hops, current);
                return Some((current, response));
            }
            if !self.assembler.admit_redirect(&target) {
                tracing::debug!("Not following redirect from {} to {}", current, target);
                return Some((current, response));
            }

            if self.redirects {
                self.assembler.on_redirect(response.status, target.as_str());
            } else {
                tracing::debug!("Following redirect from {} to {}", current, target);
            }
            current = target;
            hops += 1;
        }
    }

    async fn render(&self, url: &Url) -> Option<String> {
        let renderer = self.renderer.as_ref()?;
        match renderer.render(url).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!("Rendering {} failed, using fetched body: {}", url, e);
                None
            }
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
