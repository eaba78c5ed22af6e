//! Tree-shape tests driven by an in-memory fetch engine
//!
//! These tests exercise parent inference, the crawl policy and redirect
//! handling without touching the network.

use std::collections::HashMap;
use std::sync::Mutex;

use sitetree::config::Config;
use sitetree::crawler::{
    CrawlPolicy, Crawler, FetchError, FetchResponse, Fetcher, RenderError, Renderer, SkipReason,
    TreeAssembler, MAX_REDIRECTS,
};
use sitetree::output::{CrawlResult, PageDocument};
use sitetree::tree::ElementKind;
use sitetree::url::AllowList;
use url::Url;

/// Serves scripted responses and remembers what was requested
#[derive(Default)]
struct ScriptedFetcher {
    responses: HashMap<String, FetchResponse>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status: 200,
                content_type: Some("text/html".to_string()),
                body: html.as_bytes().to_vec(),
                ..FetchResponse::default()
            },
        );
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status,
                ..FetchResponse::default()
            },
        );
        self
    }

    fn redirect(mut self, url: &str, status: u16, location: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status,
                location: Some(location.to_string()),
                ..FetchResponse::default()
            },
        );
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetcher for &ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.responses
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Connect {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

fn config(max_depth: i64) -> Config {
    let mut config = Config::default();
    config.scan.url = "https://site.test/".to_string();
    config.scan.max_depth = max_depth;
    config
}

async fn crawl_with(config: &Config, fetcher: &ScriptedFetcher) -> CrawlResult {
    Crawler::new(config, fetcher)
        .expect("crawler")
        .run()
        .await
}

fn urls(page: &PageDocument) -> Vec<&str> {
    page.children.iter().map(|c| c.url.as_str()).collect()
}

#[tokio::test]
async fn test_duplicate_and_forbidden_links() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/",
            r#"<a href="/a">a</a><a href="/a#top">again</a><a href="https://other.test/x">x</a>"#,
        )
        .page("https://site.test/a", "");

    let result = crawl_with(&config(1), &fetcher).await;
    let root = result.root.expect("root");

    assert_eq!(root.links, vec!["https://site.test/a"]);
    assert_eq!(urls(&root), vec!["https://site.test/a"]);
    assert!(!fetcher
        .requested()
        .iter()
        .any(|u| u.starts_with("https://other.test")));
}

#[tokio::test]
async fn test_allowed_wildcard_domain_is_followed() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/",
            r#"<a href="https://cdn.site.test/x">x</a><a href="https://other.test/">o</a>"#,
        )
        .page("https://cdn.site.test/x", "");

    let mut config = config(1);
    config.scan.domains = vec!["*.site.test".to_string()];
    let result = crawl_with(&config, &fetcher).await;

    assert_eq!(urls(result.root.as_ref().expect("root")), vec!["https://cdn.site.test/x"]);
}

#[tokio::test]
async fn test_revisited_page_attached_once() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/",
            r#"<a href="/a">a</a><a href="/b">b</a>"#,
        )
        .page("https://site.test/a", r#"<a href="/shared">s</a>"#)
        .page("https://site.test/b", r#"<a href="/shared">s</a>"#)
        .page("https://site.test/shared", "");

    let result = crawl_with(&config(2), &fetcher).await;
    let root = result.root.expect("root");

    assert_eq!(urls(&root.children[0]), vec!["https://site.test/shared"]);
    assert!(root.children[1].children.is_empty());
    assert!(root.children[1].links.is_empty());
    assert_eq!(
        fetcher
            .requested()
            .iter()
            .filter(|u| u.ends_with("/shared"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_depth_boundary() {
    let fetcher = ScriptedFetcher::default()
        .page("https://site.test/", r#"<a href="/1">1</a>"#)
        .page("https://site.test/1", r#"<a href="/2">2</a>"#)
        .page("https://site.test/2", r#"<a href="/3">3</a>"#)
        .page("https://site.test/3", "");

    let result = crawl_with(&config(1), &fetcher).await;
    let root = result.root.expect("root");
    assert_eq!(result.status_codes.get(&200), Some(&2));
    assert!(root.children[0].children.is_empty());
    assert!(root.children[0].links.is_empty());

    let fetcher = ScriptedFetcher::default()
        .page("https://site.test/", r#"<a href="/1">1</a>"#)
        .page("https://site.test/1", r#"<a href="/2">2</a>"#)
        .page("https://site.test/2", r#"<a href="/3">3</a>"#)
        .page("https://site.test/3", "");
    let unbounded = crawl_with(&config(-1), &fetcher).await;
    assert_eq!(unbounded.page_count(), 4);
}

#[tokio::test]
async fn test_redirect_chain_becomes_path() {
    let fetcher = ScriptedFetcher::default()
        .redirect("https://site.test/", 301, "/b")
        .redirect("https://site.test/b", 302, "https://site.test/c")
        .page("https://site.test/c", "");

    let mut config = config(1);
    config.scan.redirects = true;
    let result = crawl_with(&config, &fetcher).await;

    let a = result.root.as_ref().expect("root");
    assert_eq!(a.status_code, 301);
    let b = &a.children[0];
    assert_eq!((b.url.as_str(), b.status_code), ("https://site.test/b", 302));
    let c = &b.children[0];
    assert_eq!((c.url.as_str(), c.status_code), ("https://site.test/c", 200));

    assert_eq!(result.status_codes.values().sum::<u64>(), 3);
}

#[tokio::test]
async fn test_redirect_to_forbidden_domain_is_final() {
    let fetcher =
        ScriptedFetcher::default().redirect("https://site.test/", 301, "https://other.test/");

    let mut config = config(1);
    config.scan.redirects = true;
    let result = crawl_with(&config, &fetcher).await;

    let root = result.root.expect("root");
    assert_eq!(root.status_code, 301);
    assert!(root.children.is_empty());
    assert_eq!(fetcher.requested().len(), 1);
}

#[tokio::test]
async fn test_redirect_loop_is_capped() {
    let fetcher = ScriptedFetcher::default().redirect("https://site.test/", 301, "/");

    let mut config = config(1);
    config.scan.redirects = true;
    let result = crawl_with(&config, &fetcher).await;

    assert_eq!(result.page_count(), MAX_REDIRECTS + 1);
    assert_eq!(result.status_codes.get(&301), Some(&(MAX_REDIRECTS as u64 + 1)));
}

#[tokio::test]
async fn test_unrecorded_redirect_loop_reports_last_hop() {
    let fetcher = ScriptedFetcher::default().redirect("https://site.test/", 301, "/");

    let result = crawl_with(&config(1), &fetcher).await;

    assert_eq!(result.page_count(), 1);
    assert_eq!(result.root.expect("root").status_code, 301);
    assert_eq!(result.status_codes.get(&301), Some(&1));
    assert_eq!(fetcher.requested().len(), MAX_REDIRECTS + 1);
}

#[tokio::test]
async fn test_failed_request_is_left_out() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/",
            r#"<a href="/down">down</a><a href="/up">up</a>"#,
        )
        .page("https://site.test/up", "");

    let result = crawl_with(&config(1), &fetcher).await;
    let root = result.root.expect("root");

    // the link was accepted, only the page is missing
    assert_eq!(root.links.len(), 2);
    assert_eq!(urls(&root), vec!["https://site.test/up"]);
    assert_eq!(result.status_codes.values().sum::<u64>(), 2);
}

#[tokio::test]
async fn test_statistics_match_attached_pages() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/",
            r#"<a href="/a">a</a><a href="/missing">m</a><a href="/error">e</a>"#,
        )
        .page("https://site.test/a", "")
        .status("https://site.test/missing", 404)
        .status("https://site.test/error", 500);

    let result = crawl_with(&config(1), &fetcher).await;

    let total: u64 = result.status_codes.values().sum();
    assert_eq!(total as usize, result.page_count());
    assert_eq!(result.status_codes.get(&404), Some(&1));
    assert_eq!(result.status_codes.get(&500), Some(&1));
}

#[tokio::test]
async fn test_non_html_is_not_parsed() {
    let mut fetcher = ScriptedFetcher::default();
    fetcher.responses.insert(
        "https://site.test/".to_string(),
        FetchResponse {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: br#"<a href="/a">a</a>"#.to_vec(),
            ..FetchResponse::default()
        },
    );

    let result = crawl_with(&config(1), &fetcher).await;
    let root = result.root.expect("root");
    assert!(root.links.is_empty());
    assert_eq!(fetcher.requested().len(), 1);
}

/// Renders every page as a fixed document
struct FixedRenderer(&'static str);

impl Renderer for FixedRenderer {
    async fn render(&self, _url: &Url) -> Result<String, RenderError> {
        Ok(self.0.to_string())
    }
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    async fn render(&self, _url: &Url) -> Result<String, RenderError> {
        Err(RenderError::NotFound)
    }
}

#[tokio::test]
async fn test_rendered_html_replaces_body() {
    let fetcher = ScriptedFetcher::default()
        .page("https://site.test/", "<div id=app></div>")
        .page("https://site.test/rendered", "");

    let result = Crawler::new(&config(1), &fetcher)
        .expect("crawler")
        .with_renderer(FixedRenderer(r#"<a href="/rendered">r</a>"#))
        .run()
        .await;

    let root = result.root.expect("root");
    assert_eq!(root.links, vec!["https://site.test/rendered"]);
    // length is the transport body, not the rendered one
    assert_eq!(root.length, "<div id=app></div>".len());
}

#[tokio::test]
async fn test_render_failure_falls_back_to_body() {
    let fetcher = ScriptedFetcher::default()
        .page("https://site.test/", r#"<a href="/a">a</a>"#)
        .page("https://site.test/a", "");

    let result = Crawler::new(&config(1), &fetcher)
        .expect("crawler")
        .with_renderer(FailingRenderer)
        .run()
        .await;

    assert_eq!(result.page_count(), 2);
}

/// Drives the assembler by hand and checks that every attached page sits one
/// level below its parent.
#[test]
fn test_assembler_depth_matches_tree_level() {
    let allow = AllowList::new(Vec::<String>::new(), Some("site.test"));
    let policy = CrawlPolicy::new(None, allow, 0);
    let mut asm = TreeAssembler::new(policy, Default::default()).expect("assembler");

    let mut id = 0;
    let mut fetch = |asm: &mut TreeAssembler, depth: u32, url: &str| {
        id += 1;
        asm.on_request_start(id, depth, url);
        asm.on_response(id, 200, 0, Some("text/html"));
    };

    fetch(&mut asm, 0, "https://site.test/");
    let root = asm.cursor().expect("cursor");
    let visit = asm.on_html_element(ElementKind::Link, "/a").expect("accepted");
    fetch(&mut asm, visit.depth, visit.url.as_str());
    let visit = asm.on_html_element(ElementKind::Link, "/a/1").expect("accepted");
    fetch(&mut asm, visit.depth, visit.url.as_str());
    asm.resume(root);
    let visit = asm.on_html_element(ElementKind::Link, "/b").expect("accepted");
    fetch(&mut asm, visit.depth, visit.url.as_str());
    asm.resume(root);
    assert_eq!(
        asm.on_html_element(ElementKind::Link, "/a"),
        Err(SkipReason::Duplicate)
    );

    let tree = asm.tree();
    assert_eq!(tree.len(), 4);
    for (node_id, page) in tree.walk() {
        assert_eq!(tree.level(node_id), page.depth as usize);
        if let Some(parent) = tree.parent(node_id) {
            assert_eq!(tree.get(parent).expect("parent").depth + 1, page.depth);
        }
    }
}
