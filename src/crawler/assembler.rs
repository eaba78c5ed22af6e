//! Crawl-tree assembly from fetch events
//!
//! The fetch layer reports a flat, ordered stream of events: a request starts,
//! phases complete, a response or redirect arrives, elements are discovered
//! while parsing, scraping finishes, or the request fails. [`TreeAssembler`]
//! turns that stream into a [`PageTree`] plus status-code statistics.
//!
//! Two pieces of context replace what would otherwise be a global "current
//! page" pointer:
//!
//! - the in-flight request, which receives phase timing and the response;
//! - the [`Cursor`], the page that discovered elements are attributed to.
//!
//! The driver saves the cursor before a nested visit and restores it with
//! [`TreeAssembler::resume`] afterwards, so sibling elements of one page all
//! land on that page.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Instant;

use url::Url;

use crate::config::CollectConfig;
use crate::crawler::parser::EmailExtractor;
use crate::crawler::policy::{CrawlPolicy, SkipReason};
use crate::crawler::resolver::{ParentResolver, RequestId};
use crate::crawler::timing::{PhaseClock, PhaseMark};
use crate::output::{CrawlResult, CrawlStatistics};
use crate::tree::{ElementKind, NodeId, PageNode, PageTree};
use crate::url::resolve_reference;

/// The page discovered elements are attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub node: NodeId,
    pub depth: u32,
}

/// A discovered resource that passed the crawl policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub url: Url,
    pub depth: u32,
    pub kind: ElementKind,
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    node: NodeId,
    depth: u32,
    clock: PhaseClock,
}

/// Builds the page tree from fetch events
#[derive(Debug)]
pub struct TreeAssembler {
    tree: PageTree,
    resolver: ParentResolver,
    policy: CrawlPolicy,
    stats: CrawlStatistics,
    collect: CollectConfig,
    emails: Option<EmailExtractor>,
    bases: HashMap<NodeId, Url>,
    in_flight: Option<InFlight>,
    current: Option<Cursor>,
    sealed: bool,
}

impl TreeAssembler {
    /// Creates an assembler
    ///
    /// Fails only if the e-mail pattern cannot be compiled.
    pub fn new(policy: CrawlPolicy, collect: CollectConfig) -> Result<Self, regex::Error> {
        let emails = if collect.emails {
            Some(EmailExtractor::new()?)
        } else {
            None
        };

        Ok(Self {
            tree: PageTree::new(),
            resolver: ParentResolver::new(),
            policy,
            stats: CrawlStatistics::new(),
            collect,
            emails,
            bases: HashMap::new(),
            in_flight: None,
            current: None,
            sealed: false,
        })
    }

    /// Applies the crawl policy to a URL the driver wants to fetch directly
    pub fn admit(&mut self, url: &Url, depth: u32) -> Result<(), SkipReason> {
        if self.sealed {
            return Err(SkipReason::NoCurrentPage);
        }
        self.policy.check(url, depth)
    }

    /// Decides whether a redirect target may be followed
    ///
    /// Only the domain rule applies; an accepted target is marked visited.
    pub fn admit_redirect(&mut self, target: &Url) -> bool {
        if self.sealed || !self.policy.allows_host(target) {
            return false;
        }
        self.policy.mark_visited(target);
        true
    }

    /// A request for `url` started
    ///
    /// Creates the page, infers its parent and makes it both the in-flight
    /// request and the current page. The first page becomes the root.
    pub fn on_request_start(&mut self, id: RequestId, depth: u32, url: &str) -> Option<NodeId> {
        if self.sealed {
            return None;
        }

        let parent = self.resolver.resolve(id, depth);
        let mut page = PageNode::new(url);
        page.parent = parent;
        page.depth = depth;
        let node = self.tree.insert(page);

        if self.tree.root().is_none() {
            self.tree.set_root(node);
        }

        self.begin(id, node, depth);
        tracing::debug!("request #{} => {} (depth {})", id, url, depth);
        Some(node)
    }

    /// A phase transition of the in-flight request
    ///
    /// Dropped when nothing is in flight.
    pub fn on_phase(&mut self, mark: PhaseMark) {
        if self.sealed {
            return;
        }
        let Some(flight) = self.in_flight.as_mut() else {
            tracing::trace!("Dropping {:?} with no request in flight", mark.event);
            return;
        };
        if let Some(page) = self.tree.get_mut(flight.node) {
            flight.clock.apply(mark, &mut page.time);
        }
    }

    /// Applies a batch of phase marks in order
    pub fn on_phases(&mut self, marks: &[PhaseMark]) {
        for mark in marks {
            self.on_phase(*mark);
        }
    }

    /// The final response for request `id` arrived
    ///
    /// Returns the page that received it, which is the last page of a
    /// redirect chain when redirects were recorded.
    pub fn on_response(
        &mut self,
        id: RequestId,
        status_code: u16,
        body_len: usize,
        content_type: Option<&str>,
    ) -> Option<NodeId> {
        if self.sealed {
            return None;
        }
        let flight = self.take_in_flight(id)?;

        self.complete(&flight, status_code);
        if let Some(page) = self.tree.get_mut(flight.node) {
            page.length = body_len;
            if let Some(ct) = content_type.filter(|ct| !ct.is_empty()) {
                page.content_type = ct.to_string();
            }
        }

        self.current = Some(Cursor {
            node: flight.node,
            depth: flight.depth,
        });
        tracing::debug!("response #{} {} ({} bytes)", id, status_code, body_len);
        Some(flight.node)
    }

    /// The in-flight request was redirected to `target`
    ///
    /// The in-flight page is completed with the redirect status, and a new page
    /// for the target is started under it, so a chain of redirects becomes a
    /// path of single-child pages.
    pub fn on_redirect(&mut self, previous_status: u16, target: &str) -> Option<NodeId> {
        if self.sealed {
            return None;
        }
        let Some(flight) = self.in_flight.take() else {
            tracing::trace!("Dropping redirect to {} with no request in flight", target);
            return None;
        };

        self.complete(&flight, previous_status);
        tracing::debug!("response => {} to {}", previous_status, target);

        let mut page = PageNode::new(target);
        page.parent = Some(flight.node);
        page.depth = flight.depth;
        let node = self.tree.insert(page);

        self.begin(flight.id, node, flight.depth);
        Some(node)
    }

    /// An element of `kind` with attribute `value` was found on the current page
    ///
    /// The value is resolved against the current page's URL. It is recorded on
    /// the page and returned as a [`Visit`] only when it is new for that page
    /// and passes the crawl policy; otherwise the reason is returned.
    pub fn on_html_element(&mut self, kind: ElementKind, value: &str) -> Result<Visit, SkipReason> {
        if self.sealed {
            return Err(SkipReason::NoCurrentPage);
        }
        let cursor = self.current.ok_or(SkipReason::NoCurrentPage)?;
        let page = self.tree.get(cursor.node).ok_or(SkipReason::NoCurrentPage)?;

        let base = match self.bases.get(&cursor.node) {
            Some(base) => base.clone(),
            None => Url::parse(&page.url).map_err(|_| SkipReason::MissingUrl)?,
        };
        let url = resolve_reference(&base, value).map_err(|_| SkipReason::MissingUrl)?;
        if page.resources(kind).iter().any(|r| r == url.as_str()) {
            return Err(SkipReason::Duplicate);
        }

        let depth = cursor.depth + 1;
        self.policy.check(&url, depth)?;

        if let Some(page) = self.tree.get_mut(cursor.node) {
            page.add_resource(kind, url.as_str());
        }
        tracing::debug!("{}: {}", kind, url);

        Ok(Visit { url, depth, kind })
    }

    /// Parsing of the current page finished
    ///
    /// Harvests e-mail addresses from the body when enabled.
    pub fn on_scrape_complete(&mut self, body: &str) {
        if self.sealed {
            return;
        }
        let (Some(cursor), Some(extractor)) = (self.current, self.emails.as_ref()) else {
            return;
        };

        let found = extractor.extract(body);
        if let Some(page) = self.tree.get_mut(cursor.node) {
            for email in found {
                page.add_email(&email);
            }
        }
    }

    /// Request `id` failed
    ///
    /// The page keeps whatever it had; if it was never attached it stays out
    /// of the output.
    pub fn on_error(&mut self, id: RequestId, error: &dyn Display) {
        let url = match &self.in_flight {
            Some(flight) if flight.id == id => self
                .tree
                .get(flight.node)
                .map(|p| p.url.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };
        tracing::error!("request #{} {} failed: {}", id, url, error);

        if self.in_flight.as_ref().is_some_and(|f| f.id == id) {
            if let Some(flight) = self.in_flight.take() {
                if self.current.is_some_and(|c| c.node == flight.node) {
                    self.current = None;
                }
            }
        }
    }

    /// Resolves elements of `node` against `base` instead of the page URL
    ///
    /// Used when the page was reached through redirects that were followed
    /// without being recorded.
    pub fn rebase(&mut self, node: NodeId, base: Url) {
        self.bases.insert(node, base);
    }

    /// Makes `cursor` the current page again
    pub fn resume(&mut self, cursor: Cursor) {
        self.current = Some(cursor);
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.current
    }

    /// Stops accepting events; used when the crawl is cancelled
    pub fn seal(&mut self) {
        self.sealed = true;
        self.in_flight = None;
    }

    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    pub fn stats(&self) -> &CrawlStatistics {
        &self.stats
    }

    pub fn policy(&self) -> &CrawlPolicy {
        &self.policy
    }

    pub fn collect(&self) -> &CollectConfig {
        &self.collect
    }

    /// Produces the crawl result
    pub fn finish(mut self) -> CrawlResult {
        self.seal();
        CrawlResult::new(&self.tree, self.stats)
    }

    fn begin(&mut self, id: RequestId, node: NodeId, depth: u32) {
        self.in_flight = Some(InFlight {
            id,
            node,
            depth,
            clock: PhaseClock::start(Instant::now()),
        });
        self.current = Some(Cursor { node, depth });
    }

    fn take_in_flight(&mut self, id: RequestId) -> Option<InFlight> {
        match self.in_flight.take() {
            Some(flight) if flight.id == id => Some(flight),
            other => {
                tracing::trace!("Dropping response for request #{} not in flight", id);
                self.in_flight = other;
                None
            }
        }
    }

    /// Stamps the status, attaches the page and records the completion
    fn complete(&mut self, flight: &InFlight, status_code: u16) {
        if let Some(page) = self.tree.get_mut(flight.node) {
            page.status_code = status_code;
        }
        self.tree.attach(flight.node);
        self.resolver.record(flight.id, flight.depth, flight.node);
        self.stats.record(status_code);
    }
}
