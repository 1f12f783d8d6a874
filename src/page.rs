//! CDP-backed page
//!
//! [`Page`] implements [`Document`] on a live Chrome tab. Element lookups and
//! clicks go through `Runtime.evaluate`; physical clicks resolve the node's
//! box model and drive the mouse.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::cdp::Session;
use crate::config::BrowserConfig;
use crate::document::{Document, Locator};
use crate::error::{Error, Result};
use crate::human;
use crate::inject;

/// Element filter that keeps only matches with a layout box
const RENDERED: &str = "el => el.getClientRects().length > 0";

/// JSON-encode a string into a JS string literal
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// A browser tab
pub struct Page {
    session: Session,
    config: Arc<BrowserConfig>,
    /// Last mouse position, where the next physical move starts
    cursor: Mutex<(f64, f64)>,
}

impl Page {
    pub(crate) fn new(session: Session, config: Arc<BrowserConfig>) -> Self {
        let start = (
            config.viewport_width as f64 / 2.0,
            config.viewport_height as f64 / 2.0,
        );
        Self {
            session,
            config,
            cursor: Mutex::new(start),
        }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        tracing::info!("Navigating to {}", url);
        self.session.navigate(url).await
    }

    /// Wait until `document.readyState` is `"complete"`
    pub async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            // readyState is unavailable while the old document is torn down
            if let Ok(state) = self.session.evaluate::<String>("document.readyState").await {
                if state == "complete" {
                    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "page loaded");
                    return Ok(());
                }
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Page did not finish loading within {}ms",
                    timeout.as_millis()
                )));
            }
            sleep(poll_interval).await;
        }
    }

    /// Get current URL
    pub async fn url(&self) -> Result<String> {
        self.session.evaluate("location.href").await
    }

    /// Capture a PNG screenshot
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.session.capture_screenshot().await
    }

    /// Save a timestamped screenshot to `browser.debug_dir`.
    ///
    /// Returns `None` when no debug directory is configured.
    pub async fn debug_screenshot(&self, prefix: &str) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.config.debug_dir else {
            return Ok(None);
        };
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_{}.png", prefix, timestamp));
        std::fs::write(&path, self.screenshot().await?)?;
        Ok(Some(path))
    }

    async fn physical_click(&self, locator: &Locator, index: usize) -> Result<()> {
        let css = locator.css();
        let nodes = self.session.query_selector_all(&css).await?;
        let node_id = *nodes
            .get(index)
            .ok_or_else(|| Error::ElementNotFound(locator.to_string()))?;

        self.session
            .evaluate::<serde_json::Value>(&format!(
                "document.querySelectorAll({})[{}]?.scrollIntoView({{block: 'center'}})",
                js_str(&css),
                index
            ))
            .await?;

        let target = self
            .session
            .node_center(node_id)
            .await?
            .ok_or_else(|| Error::ElementNotFound(format!("{} (not rendered)", locator)))?;

        let from = *self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let clicked = human::move_and_click(&self.session, from, target).await?;
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = clicked;
        Ok(())
    }
}

#[async_trait]
impl Document for Page {
    async fn count(&self, locator: &Locator) -> Result<usize> {
        self.session
            .evaluate(&format!(
                "document.querySelectorAll({}).length",
                js_str(&locator.css())
            ))
            .await
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<()> {
        if self.config.human_mouse {
            return self.physical_click(locator, index).await;
        }

        let clicked: bool = self
            .session
            .evaluate(&format!(
                "(() => {{ const el = document.querySelectorAll({})[{}]; if (!el) return false; el.click(); return true; }})()",
                js_str(&locator.css()),
                index
            ))
            .await?;
        if !clicked {
            return Err(Error::ElementNotFound(locator.to_string()));
        }
        tracing::debug!(%locator, index, "clicked");
        Ok(())
    }

    async fn set_value(&self, locator: &Locator, value: &str) -> Result<String> {
        let script = inject::set_value_script(&locator.css(), value);
        self.session
            .evaluate::<Option<String>>(&script)
            .await?
            .ok_or_else(|| Error::ElementNotFound(locator.to_string()))
    }

    async fn visible_count(&self, locator: &Locator) -> Result<usize> {
        self.session
            .evaluate(&format!(
                "Array.from(document.querySelectorAll({})).filter({}).length",
                js_str(&locator.css()),
                RENDERED
            ))
            .await
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.session
            .evaluate(&format!(
                "Array.from(document.querySelectorAll({})).filter({}).map(el => el.textContent || '')",
                js_str(&locator.css()),
                RENDERED
            ))
            .await
    }

    async fn scroll_to(&self, fraction: f64) -> Result<()> {
        self.session
            .evaluate::<serde_json::Value>(&format!(
                "window.scrollTo({{ top: document.body.scrollHeight * {}, behavior: 'smooth' }})",
                fraction
            ))
            .await?;
        Ok(())
    }
}
