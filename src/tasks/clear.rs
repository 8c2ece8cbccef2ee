//! Cart clearing: remove every cart group, retrying the whole operation.

use tracing::warn;

use super::{session, FlowResult};
use crate::driver::{Driver, Handle, PageDriver};
use crate::observer::{FlowEvent, FlowObserver};
use crate::site::{self, selectors, CLEAR_CART_MAX_RETRIES};
use crate::types::Credentials;

/// Empty the cart. Best-effort: each failed attempt gets a fresh browser
/// and page; once the retries are exhausted the failure is logged and
/// absorbed, never surfaced to the caller.
pub async fn clear_cart(
    driver: &dyn Driver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) {
    let mut attempt: u32 = 0;
    loop {
        match clear_cart_once(driver, credentials, observer).await {
            Ok(()) => {
                observer.on_event(&FlowEvent::CartCleared);
                return;
            }
            Err(e) => {
                warn!("cart clear attempt failed: {e}");
                if attempt >= CLEAR_CART_MAX_RETRIES {
                    observer.on_event(&FlowEvent::CartClearFailed { retries: attempt });
                    return;
                }
                attempt += 1;
                observer.on_event(&FlowEvent::CartClearRetried { attempt });
            }
        }
    }
}

async fn clear_cart_once(
    driver: &dyn Driver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let handle = driver.launch().await?;
    let outcome = clear_with_handle(handle.as_ref(), credentials, observer).await;
    if let Err(e) = handle.close().await {
        warn!("failed to close cart-clear browser: {e}");
    }
    outcome
}

async fn clear_with_handle(
    handle: &dyn Handle,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let page = handle.new_page().await?;
    let outcome = clear_on_page(page.as_ref(), credentials, observer).await;
    if let Err(e) = page.close().await {
        warn!("failed to close cart-clear page: {e}");
    }
    outcome
}

async fn clear_on_page(
    page: &dyn PageDriver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    session::sign_in_on_page(page, credentials, observer).await?;
    page.goto(site::CART_URL).await?;

    // Each removal reloads the cart page. Termination depends on that
    // full navigation; a frontend that switched to client-side removal
    // would leave the control present and this loop spinning.
    while page.query_exists(selectors::REMOVE_CART_GROUP).await? {
        let (clicked, navigated) = futures::join!(
            page.click(selectors::REMOVE_CART_GROUP),
            page.wait_for_navigation(),
        );
        clicked?;
        navigated?;
        observer.on_event(&FlowEvent::CartGroupRemoved);
    }
    Ok(())
}
