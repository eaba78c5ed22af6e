//! Optional browser rendering of fetched pages
//!
//! For script-heavy sites the HTML returned by the server is not what a user
//! sees. A [`Renderer`] loads the page in a real browser and returns the DOM
//! after scripts ran; the crawler then extracts elements from that instead.
//!
//! [`ChromeRenderer`] drives a headless Chrome/Chromium over the DevTools
//! protocol. The browser is launched once per crawl and every page is opened
//! in a fresh tab.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::RenderConfig;

/// Rendering failures; the crawler keeps the fetched body when one occurs
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no Chrome/Chromium executable found")]
    NotFound,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DevTools protocol error: {0}")]
    Cdp(#[from] CdpError),

    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),
}

/// Produces the rendered HTML of a page
#[allow(async_fn_in_trait)]
pub trait Renderer {
    async fn render(&self, url: &Url) -> Result<String, RenderError>;

    /// Releases the renderer's resources once the crawl is over
    async fn close(&mut self) {}
}

/// Placeholder used when no renderer is configured; never called
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl Renderer for NoRenderer {
    async fn render(&self, _url: &Url) -> Result<String, RenderError> {
        Err(RenderError::NotFound)
    }
}

/// Renders pages in a headless Chrome/Chromium
pub struct ChromeRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    executable: PathBuf,
    timeout: Duration,
}

impl ChromeRenderer {
    /// Launches the browser at `executable`
    ///
    /// `timeout` bounds both the DevTools requests and each page render.
    pub async fn launch(
        executable: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, RenderError> {
        let executable = executable.into();
        let user_data_dir =
            std::env::temp_dir().join(format!("sitetree_chrome_{}", std::process::id()));
        std::fs::create_dir_all(&user_data_dir)?;

        let browser_config = BrowserConfigBuilder::default()
            .chrome_executable(&executable)
            .headless_mode(HeadlessMode::default())
            .request_timeout(timeout)
            .user_data_dir(user_data_dir)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--mute-audio")
            .build()
            .map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    // events chromiumoxide has no type for are harmless
                    let message = e.to_string();
                    if message.contains("did not match any variant")
                        || message.contains("Failed to deserialize WS response")
                    {
                        tracing::trace!("Ignoring browser event: {}", message);
                    } else {
                        tracing::debug!("Browser handler error: {}", message);
                    }
                }
            }
            tracing::debug!("Browser handler finished");
        });

        Ok(Self {
            browser,
            handler,
            executable,
            timeout,
        })
    }

    /// Launches a renderer from configuration, locating the browser if needed
    ///
    /// Returns `Ok(None)` when rendering is disabled.
    pub async fn from_config(config: &RenderConfig) -> Result<Option<Self>, RenderError> {
        let Some(crate::config::Browser::Chrome) = config.browser else {
            return Ok(None);
        };

        let executable = match &config.executable {
            Some(path) => path.clone(),
            None => find_browser_executable().ok_or(RenderError::NotFound)?,
        };
        tracing::info!("Rendering pages with {}", executable.display());

        let renderer = Self::launch(executable, Duration::from_secs(config.timeout_secs)).await?;
        Ok(Some(renderer))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Opens `url` in a new tab and returns the DOM once the page has loaded
    async fn load(&self, url: &Url) -> Result<String, RenderError> {
        let page = self.browser.new_page(url.as_str()).await?;

        let content = match page.wait_for_navigation().await {
            Ok(page) => page.content().await,
            Err(e) => Err(e),
        };
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }

        Ok(content?)
    }
}

impl Renderer for ChromeRenderer {
    async fn render(&self, url: &Url) -> Result<String, RenderError> {
        tokio::time::timeout(self.timeout, self.load(url))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Finds a Chrome/Chromium executable on the system
///
/// `CHROMIUM_PATH` takes precedence over the well-known install locations.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
        ]
    };

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}
