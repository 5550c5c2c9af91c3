//! Postback navigation for the facility lookup portal.
//!
//! The portal is a stateful ASP.NET application: the county search is a
//! full-page form postback, so navigation-wait semantics apply rather than
//! response-wait semantics, and all crawling against one session is
//! strictly sequential.

pub mod urls;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{info, warn};

use crate::browser::{BrowserSession, SessionProvider};
use crate::config::BrowserSettings;
use crate::extract::{
    merge_documents_page, parse_facility_detail, parse_facility_list, parse_inspection_documents,
};
use crate::models::{FacilityDetail, FacilityStub};
use urls::{detail_url, documents_url, is_known_county, SEARCH_URL};

/// The portal operations the sync engine drives. The orchestrator only
/// sees this trait, so it can run against a scripted double in tests.
#[async_trait]
pub trait RegistryPortal: Send {
    /// Acquire the browser session. Fails loudly; retry policy belongs to
    /// the caller.
    async fn connect(&mut self) -> Result<()>;

    /// List the facilities for one county. Unknown counties and portal
    /// error pages yield an empty list, not an error.
    async fn list_facilities(&mut self, county: &str) -> Result<Vec<FacilityStub>>;

    /// Fetch one facility's full record. `Ok(None)` means a soft failure
    /// the caller should skip; `Err` means a transport-level failure.
    async fn fetch_facility_detail(&mut self, license_number: &str)
        -> Result<Option<FacilityDetail>>;

    /// Release and reacquire the session after a lost connection.
    async fn reinitialize(&mut self) -> Result<()>;

    /// Release the session. Safe to call when none is held.
    async fn release(&mut self);
}

/// Whether an error indicates the browser connection itself died, as
/// opposed to a page-level failure. The CDP layer surfaces dead
/// connections through several error types, so this matches on message
/// content.
pub fn is_connection_lost(err: &anyhow::Error) -> bool {
    let message = format!("{err:#}").to_lowercase();
    [
        "websocket",
        "connection closed",
        "connection reset",
        "browser has gone away",
        "channel closed",
        "session not acquired",
    ]
    .iter()
    .any(|marker| message.contains(marker))
}

/// Browser-backed portal implementation.
pub struct PortalNavigator {
    provider: SessionProvider,
    session: Option<BrowserSession>,
    settings: BrowserSettings,
}

impl PortalNavigator {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            provider: SessionProvider::new(settings.clone()),
            session: None,
            settings,
        }
    }

    fn session(&self) -> Result<&BrowserSession> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("browser session not acquired"))
    }

    fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.nav_timeout_secs)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.idle_timeout_secs)
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.element_timeout_secs)
    }

    /// Open a new page on the acquired session and wait for its load.
    async fn open_page(&self, url: &str) -> Result<Page> {
        let browser = self.session()?.browser();
        let page = tokio::time::timeout(self.nav_timeout(), browser.new_page(url))
            .await
            .map_err(|_| anyhow!("navigation to {} timed out", url))?
            .with_context(|| format!("failed to open {}", url))?;
        Ok(page)
    }

    /// Navigate an existing page and wait for the load.
    async fn goto(&self, page: &Page, url: &str) -> Result<()> {
        tokio::time::timeout(self.nav_timeout(), async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await
        .map_err(|_| anyhow!("navigation to {} timed out", url))?
        .with_context(|| format!("failed to navigate to {}", url))?;
        self.wait_for_quiet(page).await;
        Ok(())
    }

    /// The portal's pages keep issuing requests after the load event fires;
    /// wait for the document to report complete, bounded, then a short
    /// settle period for stragglers.
    async fn wait_for_quiet(&self, page: &Page) {
        let deadline = tokio::time::Instant::now() + self.idle_timeout();
        loop {
            let ready = page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|result| result.into_value::<String>().ok())
                .map(|state| state == "complete")
                .unwrap_or(false);
            if ready || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        tokio::time::sleep(Duration::from_millis(750)).await;
    }

    /// Find and click the county's control on the search form. Returns
    /// false when no control matches, which the caller treats as zero
    /// results; the county roster is externally controlled.
    async fn activate_county_filter(&self, page: &Page, county: &str) -> Result<bool> {
        let target = serde_json::to_string(&county.trim().to_lowercase())?;
        let script = format!(
            r#"(() => {{
                const target = {target};
                const controls = Array.from(
                    document.querySelectorAll('a, input[type="submit"], button, option')
                );
                const el = controls.find(
                    e => ((e.textContent || e.value || '').trim().toLowerCase() === target)
                );
                if (!el) return false;
                if (el.tagName === 'OPTION') {{
                    el.selected = true;
                    el.parentElement.dispatchEvent(new Event('change', {{ bubbles: true }}));
                }} else {{
                    el.click();
                }}
                return true;
            }})()"#
        );
        let clicked = tokio::time::timeout(self.element_timeout(), page.evaluate(script))
            .await
            .map_err(|_| anyhow!("county control lookup timed out"))?
            .context("failed to evaluate county control script")?
            .into_value::<bool>()
            .unwrap_or(false);
        Ok(clicked)
    }

    async fn drive_county_search(&self, page: &Page, county: &str) -> Result<Vec<FacilityStub>> {
        self.wait_for_quiet(page).await;

        if !self.activate_county_filter(page, county).await? {
            warn!(county, "county control not found on search form");
            return Ok(Vec::new());
        }

        // The click fires a full-page postback; wait for the resulting
        // load, then for the post-load scripts to go quiet.
        match tokio::time::timeout(self.nav_timeout(), page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(anyhow::Error::from(e).context("postback navigation failed"))
            }
            Err(_) => {
                warn!(county, "timed out waiting for results postback");
                return Ok(Vec::new());
            }
        }
        self.wait_for_quiet(page).await;

        let html = page
            .content()
            .await
            .context("failed to read results page")?;
        let stubs = parse_facility_list(&html);
        info!(county, count = stubs.len(), "parsed county results");
        Ok(stubs)
    }

    /// navigate-detail → parse-detail → navigate-documents →
    /// parse-documents → merge → hash. Documents-page failures degrade to
    /// zero inspections; everything else soft-fails to None except a lost
    /// connection, which propagates for session recovery.
    async fn fetch_detail_pages(
        &self,
        page: &Page,
        license_number: &str,
    ) -> Result<Option<FacilityDetail>> {
        self.wait_for_quiet(page).await;

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                let e = anyhow::Error::from(e);
                if is_connection_lost(&e) {
                    return Err(e);
                }
                warn!(license_number, error = %e, "failed to read detail page");
                return Ok(None);
            }
        };
        let mut detail = parse_facility_detail(license_number, &html);

        match self.goto(page, &documents_url(license_number)).await {
            Ok(()) => match page.content().await {
                Ok(doc_html) => {
                    merge_documents_page(&mut detail, parse_inspection_documents(&doc_html));
                }
                Err(e) => {
                    let e = anyhow::Error::from(e);
                    if is_connection_lost(&e) {
                        return Err(e);
                    }
                    warn!(
                        license_number,
                        error = %e,
                        "failed to read documents page; keeping zero inspections"
                    );
                }
            },
            Err(e) if is_connection_lost(&e) => return Err(e),
            Err(e) => {
                warn!(
                    license_number,
                    error = format!("{e:#}"),
                    "documents navigation failed; keeping zero inspections"
                );
            }
        }

        Ok(Some(detail))
    }
}

#[async_trait]
impl RegistryPortal for PortalNavigator {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.session = Some(self.provider.acquire().await?);
        }
        Ok(())
    }

    async fn list_facilities(&mut self, county: &str) -> Result<Vec<FacilityStub>> {
        if !is_known_county(county) {
            warn!(county, "unknown county; returning no facilities");
            return Ok(Vec::new());
        }

        // One page per listing call, closed on every exit path.
        let page = self.open_page(SEARCH_URL).await?;
        let result = self.drive_county_search(&page, county).await;
        let _ = page.close().await;
        result
    }

    async fn fetch_facility_detail(
        &mut self,
        license_number: &str,
    ) -> Result<Option<FacilityDetail>> {
        // One page reused across the detail and documents fetches.
        let page = match self.open_page(&detail_url(license_number)).await {
            Ok(page) => page,
            Err(e) => {
                if is_connection_lost(&e) {
                    return Err(e);
                }
                warn!(
                    license_number,
                    error = format!("{e:#}"),
                    "detail navigation failed"
                );
                return Ok(None);
            }
        };
        let result = self.fetch_detail_pages(&page, license_number).await;
        let _ = page.close().await;
        result
    }

    async fn reinitialize(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.release().await;
        }
        self.session = Some(self.provider.acquire().await?);
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lost_detection() {
        assert!(is_connection_lost(&anyhow!(
            "WebSocket protocol error: Connection reset without closing handshake"
        )));
        assert!(is_connection_lost(&anyhow!("connection closed by remote")));
        assert!(is_connection_lost(&anyhow!(
            "browser session not acquired"
        )));
        assert!(!is_connection_lost(&anyhow!("navigation to x timed out")));
        assert!(!is_connection_lost(&anyhow!("no such element")));
    }

    #[test]
    fn test_connection_lost_inspects_context_chain() {
        let inner = anyhow!("websocket closed");
        let wrapped = inner.context("failed to read results page");
        assert!(is_connection_lost(&wrapped));
    }
}
