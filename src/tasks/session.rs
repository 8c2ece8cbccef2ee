//! Sign-in, reusable across the batch flows.

use tracing::warn;

use super::FlowResult;
use crate::driver::{Driver, Handle, PageDriver};
use crate::observer::{FlowEvent, FlowObserver};
use crate::site::{self, selectors, timeouts};
use crate::types::Credentials;

/// Where the sign-in runs, which also decides what this call owns and
/// therefore closes.
pub enum SessionTarget<'a> {
    /// Launch a dedicated handle and page; both are closed before
    /// returning.
    Owned(&'a dyn Driver),
    /// Open a page on an existing handle; the page is closed, the handle
    /// stays open.
    OnHandle(&'a dyn Handle),
    /// Use the caller's page; nothing is closed here.
    OnPage(&'a dyn PageDriver),
}

/// Sign in to the site.
///
/// Idempotent: if the login page immediately lands on the landing page,
/// the session is already authenticated and credentials are never
/// filled. Resources owned by this call are released exactly once, on
/// success and failure alike; failures then propagate.
pub async fn sign_in(
    target: SessionTarget<'_>,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    match target {
        SessionTarget::Owned(driver) => {
            let handle = driver.launch().await?;
            let outcome = sign_in_with_page(handle.as_ref(), credentials, observer).await;
            if let Err(e) = handle.close().await {
                warn!("failed to close sign-in browser: {e}");
            }
            outcome
        }
        SessionTarget::OnHandle(handle) => sign_in_with_page(handle, credentials, observer).await,
        SessionTarget::OnPage(page) => sign_in_on_page(page, credentials, observer).await,
    }
}

async fn sign_in_with_page(
    handle: &dyn Handle,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let page = handle.new_page().await?;
    let outcome = sign_in_on_page(page.as_ref(), credentials, observer).await;
    if let Err(e) = page.close().await {
        warn!("failed to close sign-in page: {e}");
    }
    outcome
}

pub(crate) async fn sign_in_on_page(
    page: &dyn PageDriver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    page.goto(site::SIGN_IN_URL).await?;

    // An authenticated session is bounced straight to the landing page.
    if page.current_url().await? == site::LANDING_URL {
        observer.on_event(&FlowEvent::AlreadySignedIn);
        return Ok(());
    }

    page.wait_for_selector(selectors::EMAIL_FIELD, timeouts::SELECTOR)
        .await?;
    page.type_text(selectors::EMAIL_FIELD, &credentials.email)
        .await?;
    page.type_text(selectors::PASSWORD_FIELD, &credentials.password)
        .await?;

    // Submit and the resulting navigation overlap; wait on both.
    let (submitted, navigated) = futures::join!(
        page.press_enter(selectors::PASSWORD_FIELD),
        page.wait_for_navigation(),
    );
    submitted?;
    navigated?;

    observer.on_event(&FlowEvent::SignedIn);
    Ok(())
}
