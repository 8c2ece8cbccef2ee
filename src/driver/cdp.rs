//! chromiumoxide-backed implementation of the automation seam.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{Driver, DriverError, DriverResult, Handle, PageDriver};
use crate::browser_setup;
use crate::site::timeouts;
use crate::BrowserConfig;

/// Launches real Chrome/Chromium instances over the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct CdpDriver {
    config: BrowserConfig,
}

impl CdpDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn launch(&self) -> DriverResult<Arc<dyn Handle>> {
        let (browser, handler, user_data_dir) = browser_setup::launch_browser(&self.config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        Ok(Arc::new(CdpHandle {
            inner: Mutex::new(Some(LaunchedBrowser {
                browser,
                handler,
                user_data_dir,
            })),
        }))
    }
}

struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

/// One running Chrome instance. `close` is idempotent; the first call
/// shuts the process down and removes its profile directory.
pub struct CdpHandle {
    inner: Mutex<Option<LaunchedBrowser>>,
}

#[async_trait]
impl Handle for CdpHandle {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        let guard = self.inner.lock().await;
        let launched = guard
            .as_ref()
            .ok_or_else(|| DriverError::PageCreation("browser already closed".into()))?;
        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::PageCreation(e.to_string()))?;
        Ok(Box::new(CdpPage { page }))
    }

    async fn close(&self) -> DriverResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(mut launched) = guard.take() {
            // Close the process, wait for it to exit, then stop the
            // handler; the profile directory is only removable once
            // Chrome has released its file handles.
            if let Err(e) = launched.browser.close().await {
                warn!("failed to close browser cleanly: {e}");
            }
            if let Err(e) = launched.browser.wait().await {
                warn!("failed to wait for browser exit: {e}");
            }
            launched.handler.abort();
            if let Err(e) = std::fs::remove_dir_all(&launched.user_data_dir) {
                warn!(
                    "failed to remove profile directory {}: {e}",
                    launched.user_data_dir.display()
                );
            }
        }
        Ok(())
    }
}

struct CdpPage {
    page: Page,
}

impl CdpPage {
    /// Poll for an element with exponential backoff. Dynamic frontends
    /// render well after the load event, so a single query is not enough.
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> DriverResult<Element> {
        let start = Instant::now();
        let mut poll_interval = Duration::from_millis(100);
        let max_interval = Duration::from_secs(1);

        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::WaitTimeout {
                    selector: selector.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
            poll_interval = (poll_interval * 2).min(max_interval);
        }
    }

    fn interaction_error(selector: &str, reason: impl ToString) -> DriverError {
        DriverError::Interaction {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        tokio::time::timeout(timeouts::NAVIGATION, self.page.goto(url))
            .await
            .map_err(|_| {
                DriverError::Navigation(format!(
                    "timed out after {}ms loading {url}",
                    timeouts::NAVIGATION.as_millis()
                ))
            })?
            .map_err(|e| DriverError::Navigation(format!("{url}: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.wait_for_element(selector, timeout).await.map(|_| ())
    }

    async fn query_exists(&self, selector: &str) -> DriverResult<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .wait_for_element(selector, timeouts::INTERACTION)
            .await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        element
            .click()
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        let element = self
            .wait_for_element(selector, timeouts::INTERACTION)
            .await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        // Click to focus; focus() alone hangs on elements observed by an
        // IntersectionObserver.
        element
            .click()
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .wait_for_element(selector, timeouts::INTERACTION)
            .await?;
        element
            .press_key("Enter")
            .await
            .map_err(|e| Self::interaction_error(selector, e))?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> DriverResult<()> {
        self.page
            .wait_for_navigation()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Navigation(e.to_string()))
    }

    async fn reload(&self) -> DriverResult<()> {
        self.page
            .reload()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Navigation(format!("reload: {e}")))
    }

    async fn evaluate(&self, expression: &str) -> DriverResult<Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&self) -> DriverResult<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Close(e.to_string()))
    }
}
