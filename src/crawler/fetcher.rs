//! HTTP fetch engine
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client from the client configuration
//! - Returning redirects to the caller instead of following them
//! - Capping response bodies at the configured size
//! - Reporting phase timing marks (DNS, connect, TLS, first byte, download)
//! - Error classification

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::crawler::timing::{PhaseEvent, PhaseMark};
use crate::crawler::transport::{tls_config, ConnectTimingLayer, PhaseRecorder, TimingResolver};
use crate::url::resolve_reference;
use crate::SiteTreeError;

/// Maximum number of redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// A single HTTP exchange as seen by the crawler
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Location header value, unresolved
    pub location: Option<String>,
    /// Body, truncated at the configured cap
    pub body: Vec<u8>,
    /// Phase transitions observed during the exchange
    pub phases: Vec<PhaseMark>,
}

impl FetchResponse {
    /// Resolved redirect target, if this is a 3xx with a usable Location
    pub fn redirect_target(&self, request_url: &Url) -> Option<Url> {
        if !(300..400).contains(&self.status) {
            return None;
        }
        let location = self.location.as_deref()?;
        resolve_reference(request_url, location).ok()
    }

    /// Returns true if the body should be parsed as HTML
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_lowercase().contains("html"))
    }
}

/// Transport failures; the request is not retried
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Request { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Fetch engine used by the crawler
///
/// Implementations must not follow redirects: a 3xx is returned as is, with
/// its Location header, so that the crawler can record each hop.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// Connections are not pooled, so every request performs its own DNS lookup
/// and connection setup and reports its own timing into `recorder`.
pub fn build_http_client(
    config: &ClientConfig,
    recorder: &PhaseRecorder,
) -> Result<Client, SiteTreeError> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("sitetree/{}", env!("CARGO_PKG_VERSION")));
    let tls = tls_config(recorder.clone(), config.insecure)?;

    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none()) // Redirect hops are recorded by the crawler
        .use_preconfigured_tls(tls)
        .pool_max_idle_per_host(0)
        .dns_resolver(Arc::new(TimingResolver::new(recorder.clone())))
        .connector_layer(ConnectTimingLayer::new(recorder.clone()))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// reqwest-backed [`Fetcher`]
///
/// Reports every phase of the exchange: DNS, connect, TLS handshake, first
/// byte and download.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    recorder: PhaseRecorder,
    max_body_size: usize,
}

impl HttpFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self, SiteTreeError> {
        let recorder = PhaseRecorder::new();
        let client = build_http_client(config, &recorder)?;
        Ok(Self {
            client,
            recorder,
            max_body_size: 0,
        })
    }

    /// Caps response bodies at `max_body_size` bytes, 0 meaning unlimited
    ///
    /// The cap is part of the crawl policy; [`crate::crawler::crawl`] passes
    /// the policy's value here.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        // Marks left over from an aborted request belong to nobody
        self.recorder.take();

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;
        let first_byte = PhaseMark::now(PhaseEvent::FirstByte);

        let status = response.status().as_u16();
        let content_type = header_value(&response, CONTENT_TYPE);
        let location = header_value(&response, LOCATION);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })? {
            if self.max_body_size > 0 && body.len() + chunk.len() > self.max_body_size {
                let room = self.max_body_size - body.len();
                body.extend_from_slice(&chunk[..room]);
                tracing::debug!(
                    "Body of {} truncated at {} bytes",
                    url,
                    self.max_body_size
                );
                break;
            }
            body.extend_from_slice(&chunk);
        }
        let downloaded = PhaseMark::now(PhaseEvent::Downloaded);

        let mut phases = self.recorder.take();
        phases.push(first_byte);
        phases.push(downloaded);

        Ok(FetchResponse {
            status,
            content_type,
            location,
            body,
            phases,
        })
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

fn classify_error(url: &Url, e: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        FetchError::Timeout { url }
    } else if e.is_connect() {
        FetchError::Connect {
            url,
            message: e.to_string(),
        }
    } else {
        FetchError::Request {
            url,
            message: e.to_string(),
        }
    }
}
