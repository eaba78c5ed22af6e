//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through the HTTP fetch engine.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use sitetree::config::{Browser, Config};
use sitetree::crawler::{crawl, find_browser_executable, ChromeRenderer, Crawler, HttpFetcher, Renderer};
use sitetree::output::{write_result, CrawlResult, OutputFormat};
use sitetree::SiteTreeError;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server root
fn create_test_config(base_url: &str, max_depth: i64) -> Config {
    let mut config = Config::default();
    config.scan.url = format!("{}/", base_url);
    config.scan.max_depth = max_depth;
    config.client.user_agent = Some("TestBot/1.0".to_string());
    config.client.timeout_secs = 5;
    config
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn run(config: &Config) -> CrawlResult {
    crawl(config, Arc::new(AtomicBool::new(false)))
        .await
        .expect("crawl should start")
}

#[tokio::test]
async fn test_full_crawl_builds_tree() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        r#"<html><body>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_html(
        &mock_server,
        "/page1",
        r#"<a href="/page3">Page 3</a><a href="/">Home</a>"#.to_string(),
    )
    .await;
    mount_html(&mock_server, "/page2", "<p>leaf</p>".to_string()).await;
    mount_html(&mock_server, "/page3", "<p>deep</p>".to_string()).await;

    let config = create_test_config(&base_url, 2);
    let result = run(&config).await;

    let root = result.root.as_ref().expect("root page");
    assert_eq!(root.url, format!("{}/", base_url));
    assert_eq!(root.status_code, 200);
    assert!(root.content_type.starts_with("text/html"));
    assert!(root.length > 0);
    assert!(root.time.first_byte > Duration::ZERO);
    assert_eq!(
        root.links,
        vec![format!("{}/page1", base_url), format!("{}/page2", base_url)]
    );

    assert_eq!(root.children.len(), 2);
    let page1 = &root.children[0];
    assert_eq!(page1.url, format!("{}/page1", base_url));
    // the link back home was already visited
    assert_eq!(page1.links, vec![format!("{}/page3", base_url)]);
    assert_eq!(page1.children[0].url, format!("{}/page3", base_url));
    assert_eq!(root.children[1].url, format!("{}/page2", base_url));

    assert_eq!(result.page_count(), 4);
    assert_eq!(result.status_codes.get(&200), Some(&4));
}

#[tokio::test]
async fn test_max_depth_zero_fetches_only_seed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(&mock_server, "/", r#"<a href="/page1">Page 1</a>"#.to_string()).await;

    let config = create_test_config(&base_url, 0);
    let result = run(&config).await;

    let root = result.root.expect("root page");
    assert!(root.children.is_empty());
    assert!(root.links.is_empty());
    assert_eq!(result.status_codes.len(), 1);

    let requests = mock_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_missing_page_is_counted() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(&mock_server, "/", r#"<a href="/gone">Gone</a>"#.to_string()).await;

    let result = run(&create_test_config(&base_url, 1)).await;

    let root = result.root.expect("root page");
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].status_code, 404);
    assert_eq!(result.status_codes.get(&200), Some(&1));
    assert_eq!(result.status_codes.get(&404), Some(&1));
}

#[tokio::test]
async fn test_redirects_recorded_when_enabled() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/home"))
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/home", r#"<a href="/about">About</a>"#.to_string()).await;
    mount_html(&mock_server, "/about", String::new()).await;

    let mut config = create_test_config(&base_url, 1);
    config.scan.redirects = true;
    let result = run(&config).await;

    let root = result.root.expect("root page");
    assert_eq!(root.status_code, 301);
    assert_eq!(root.children.len(), 1);

    let home = &root.children[0];
    assert_eq!(home.url, format!("{}/home", base_url));
    assert_eq!(home.status_code, 200);
    assert_eq!(home.children[0].url, format!("{}/about", base_url));

    assert_eq!(result.status_codes.get(&301), Some(&1));
    assert_eq!(result.status_codes.get(&200), Some(&2));
}

#[tokio::test]
async fn test_redirects_followed_silently_by_default() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/docs/index.html"))
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        "/docs/index.html",
        r#"<a href="intro.html">Intro</a>"#.to_string(),
    )
    .await;
    mount_html(&mock_server, "/docs/intro.html", String::new()).await;

    let result = run(&create_test_config(&base_url, 1)).await;

    let root = result.root.expect("root page");
    assert_eq!(root.url, format!("{}/", base_url));
    assert_eq!(root.status_code, 200);
    // relative links resolve against where the redirect landed
    assert_eq!(root.links, vec![format!("{}/docs/intro.html", base_url)]);
    assert_eq!(root.children.len(), 1);
    assert_eq!(result.status_codes.get(&302), None);
    assert_eq!(result.status_codes.get(&200), Some(&2));
}

#[tokio::test]
async fn test_foreign_links_are_not_recorded() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        r#"<a href="http://elsewhere.invalid/">Away</a><a href="/local">Local</a>"#.to_string(),
    )
    .await;
    mount_html(&mock_server, "/local", String::new()).await;

    let result = run(&create_test_config(&base_url, 1)).await;

    let root = result.root.expect("root page");
    assert_eq!(root.links, vec![format!("{}/local", base_url)]);
    assert_eq!(root.children.len(), 1);
}

#[tokio::test]
async fn test_resources_and_emails_collected() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        r#"<html><head>
            <link rel="stylesheet" href="/site.css">
            <script src="/app.js"></script>
        </head><body>
            <img src="/logo.png">
            <p>Contact: team@example.org</p>
        </body></html>"#
            .to_string(),
    )
    .await;
    for (route, content_type) in [
        ("/site.css", "text/css"),
        ("/app.js", "application/javascript"),
        ("/logo.png", "image/png"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"x".to_vec(), content_type))
            .mount(&mock_server)
            .await;
    }

    let mut config = create_test_config(&base_url, 1);
    config.collect.links = false;
    config.collect.images = true;
    config.collect.scripts = true;
    config.collect.styles = true;
    config.collect.emails = true;
    let result = run(&config).await;

    let root = result.root.expect("root page");
    assert_eq!(root.images, vec![format!("{}/logo.png", base_url)]);
    assert_eq!(root.scripts, vec![format!("{}/app.js", base_url)]);
    assert_eq!(root.styles, vec![format!("{}/site.css", base_url)]);
    assert_eq!(root.emails, vec!["team@example.org".to_string()]);
    assert_eq!(root.children.len(), 3);

    let logo = root
        .find(&format!("{}/logo.png", base_url))
        .expect("image page");
    assert!(logo.content_type.starts_with("image/png"));
    assert_eq!(logo.length, 1);
}

#[tokio::test]
async fn test_body_is_capped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(&mock_server, "/", "a".repeat(4096)).await;

    let mut config = create_test_config(&base_url, 0);
    config.client.max_body_size = 100;
    let result = run(&config).await;

    assert_eq!(result.root.expect("root page").length, 100);
}

#[tokio::test]
async fn test_unreachable_seed_keeps_root() {
    // a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);

    let config = create_test_config(&base_url, 1);
    let fetcher = HttpFetcher::new(&config.client).expect("client");
    let result = Crawler::new(&config, fetcher).expect("crawler").run().await;

    let root = result.root.expect("root page");
    assert_eq!(root.status_code, 0);
    assert!(result.status_codes.is_empty());
}

#[tokio::test]
async fn test_document_written_to_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(&mock_server, "/", r#"<a href="/page1">Page 1</a>"#.to_string()).await;
    mount_html(&mock_server, "/page1", String::new()).await;

    let result = run(&create_test_config(&base_url, 1)).await;

    let dir = tempfile::tempdir().expect("temp dir");
    for format in [OutputFormat::Json, OutputFormat::Yaml] {
        let file = dir.path().join(format!("tree.{}", format));
        write_result(&result, format, Some(&file)).expect("write document");

        let text = std::fs::read_to_string(&file).expect("read document");
        let parsed = format.parse(&text).expect("parse document");
        assert_eq!(parsed, result);
    }

    let json = std::fs::read_to_string(dir.path().join("tree.json")).expect("read json");
    assert!(json.contains("\"statusCodes\""));
    assert!(json.contains("\"firstByte\""));
    assert!(json.contains("\"type\": \"text/html"));
}

#[tokio::test]
async fn test_plaintext_fetch_reports_connect_time() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(&mock_server, "/", r#"<a href="/page1">Page 1</a>"#.to_string()).await;
    mount_html(&mock_server, "/page1", String::new()).await;

    let result = run(&create_test_config(&base_url, 1)).await;

    let root = result.root.expect("root page");
    assert!(root.time.connect > Duration::ZERO);
    // no handshake over plain HTTP
    assert_eq!(root.time.tls_handshake, Duration::ZERO);
    // connections are not reused, so the child connects again
    assert!(root.children[0].time.connect > Duration::ZERO);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = create_test_config("http://127.0.0.1:9", 1);
    config.client.timeout_secs = 0;

    let result = crawl(&config, Arc::new(AtomicBool::new(false))).await;
    assert!(matches!(result, Err(SiteTreeError::Config(_))));
}

#[tokio::test]
async fn test_chrome_renders_script_output() {
    let Some(executable) = find_browser_executable() else {
        eprintln!("no Chrome/Chromium installed, skipping");
        return;
    };
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        r#"<html><body><script>
            document.body.insertAdjacentHTML('beforeend', '<a href="/from-script">x</a>');
        </script></body></html>"#
            .to_string(),
    )
    .await;

    let mut renderer = ChromeRenderer::launch(executable, Duration::from_secs(20))
        .await
        .expect("launch browser");
    let url = Url::parse(&format!("{}/", base_url)).expect("url");
    let html = renderer.render(&url).await;
    renderer.close().await;

    assert!(html.expect("rendered page").contains(r#"href="/from-script""#));
}

#[tokio::test]
async fn test_rendered_crawl_follows_script_links() {
    let Some(executable) = find_browser_executable() else {
        eprintln!("no Chrome/Chromium installed, skipping");
        return;
    };
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        r#"<html><body><script>
            document.body.insertAdjacentHTML('beforeend', '<a href="/from-script">x</a>');
        </script></body></html>"#
            .to_string(),
    )
    .await;
    mount_html(&mock_server, "/from-script", "<p>found</p>".to_string()).await;

    let mut config = create_test_config(&base_url, 1);
    config.render.browser = Some(Browser::Chrome);
    config.render.executable = Some(executable);
    config.render.timeout_secs = 20;
    let result = run(&config).await;

    let root = result.root.expect("root page");
    assert_eq!(root.links, vec![format!("{}/from-script", base_url)]);
    assert_eq!(root.children[0].status_code, 200);
}
