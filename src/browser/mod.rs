//! Browser session management.
//!
//! Production runs connect to a pooled remote Chromium over CDP (the portal
//! is long to crawl and remote pools survive headless-detection and resource
//! limits better); development launches a local sandboxed headless process.
//! Selection is by configuration, not caller choice, and acquisition
//! failures propagate; session retry policy belongs to the orchestrator.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::BrowserSettings;

/// How the session was obtained, which decides how it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    /// Connected to a shared remote browser; release disconnects only.
    Remote,
    /// Locally launched process; release terminates it.
    Local,
}

/// An acquired browser session.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    kind: SessionKind,
}

impl BrowserSession {
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Release the session. A remote session only drops the CDP connection,
    /// since the pooled browser is shared infrastructure. A
    /// local session terminates its process.
    pub async fn release(mut self) {
        if self.kind == SessionKind::Local {
            let _ = self.browser.close().await;
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
    }
}

/// Obtains browser sessions per the configured backend.
pub struct SessionProvider {
    settings: BrowserSettings,
}

impl SessionProvider {
    /// Common Chromium executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Acquire a session: remote when an endpoint is configured, local
    /// launch otherwise. Fails loudly; there is no fallback chain between
    /// the two backends.
    pub async fn acquire(&self) -> Result<BrowserSession> {
        match self.settings.remote_url.clone() {
            Some(url) => self.connect_remote(&url).await,
            None => self.launch_local().await,
        }
    }

    /// Connect to a remote Chromium instance.
    async fn connect_remote(&self, url: &str) -> Result<BrowserSession> {
        info!("Connecting to remote browser at {}", url);

        // The endpoint advertises its current WebSocket debugger URL; the
        // configured address may predate a pool restart.
        let token = self.settings.remote_token.as_deref();
        let version_url = with_token(&version_endpoint(url), token);
        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;
        let ws_url = with_token(ws_url, token);

        info!("Connecting to WebSocket: {}", ws_url);
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .context("Failed to connect to remote browser")?;

        Ok(BrowserSession {
            browser,
            handler_task: spawn_handler(handler),
            kind: SessionKind::Remote,
        })
    }

    /// Launch a local sandboxed headless browser.
    async fn launch_local(&self) -> Result<BrowserSession> {
        let chrome_path = self.find_chromium()?;
        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            self.settings.headless
        );

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.settings.headless {
            builder = builder.with_head();
        }

        // Reduced-privilege flags for containers and restricted environments.
        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--metrics-recording-only");

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok(BrowserSession {
            browser,
            handler_task: spawn_handler(handler),
            kind: SessionKind::Local,
        })
    }

    /// Find a Chromium executable: configured path, common locations, PATH.
    fn find_chromium(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.settings.executable {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set CHROME_PATH."
        ))
    }
}

/// Drive the CDP message stream until the connection ends.
fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

/// HTTP /json/version endpoint for a configured DevTools URL.
fn version_endpoint(remote_url: &str) -> String {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    format!("{}/json/version", http_url.trim_end_matches('/'))
}

/// Append the pool's access token as a query parameter, unless the URL
/// already carries one.
fn with_token(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !url.contains("token=") => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}token={}", urlencoding::encode(token))
        }
        _ => url.to_string(),
    }
}
