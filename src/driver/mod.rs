//! The browser-automation seam.
//!
//! Flows drive pages exclusively through these traits: [`Driver`]
//! launches browser handles, a [`Handle`] owns pages, and a
//! [`PageDriver`] exposes the navigate/wait/interact/evaluate
//! primitives. Every wait carries its own timeout, and timeout expiry is
//! an ordinary error ([`DriverError::WaitTimeout`]) that callers treat
//! as a retryable or terminal outcome, never a crash.
//!
//! [`cdp::CdpDriver`] is the chromiumoxide-backed implementation; tests
//! substitute fakes.

pub mod cdp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to open page: {0}")]
    PageCreation(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found after {waited_ms}ms: '{selector}'")]
    WaitTimeout { selector: String, waited_ms: u64 },

    #[error("interaction failed on '{selector}': {reason}")]
    Interaction { selector: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("failed to close: {0}")]
    Close(String),
}

impl DriverError {
    /// Whether this is a wait that simply ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::WaitTimeout { .. })
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Launches browser instances.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn launch(&self) -> DriverResult<Arc<dyn Handle>>;
}

/// One controlled browser instance, capable of hosting multiple pages.
///
/// Handles are shared across tasks (the pool hands them out round-robin)
/// but closed exactly once, by whoever launched them.
#[async_trait]
pub trait Handle: Send + Sync {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>>;

    /// Shuts the browser down. Implementations are idempotent.
    async fn close(&self) -> DriverResult<()>;
}

/// One navigable document context. Owned by the task that opened it and
/// closed only by that task.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates and waits for the load to complete.
    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Suspends until the selector matches, or fails with
    /// [`DriverError::WaitTimeout`].
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Immediate presence check, no waiting.
    async fn query_exists(&self, selector: &str) -> DriverResult<bool>;

    async fn click(&self, selector: &str) -> DriverResult<()>;

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()>;

    /// Presses Enter on the element, submitting its enclosing form.
    async fn press_enter(&self, selector: &str) -> DriverResult<()>;

    /// Waits for the next navigation triggered by a prior interaction.
    async fn wait_for_navigation(&self) -> DriverResult<()>;

    async fn reload(&self) -> DriverResult<()>;

    /// Runs a script in the page and returns its JSON result.
    async fn evaluate(&self, expression: &str) -> DriverResult<Value>;

    async fn close(&self) -> DriverResult<()>;
}
