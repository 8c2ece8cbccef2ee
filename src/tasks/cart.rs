//! Add-to-cart with confirmation retry.
//!
//! The add-to-cart confirmation popup is one shared piece of UI per
//! session, so the confirmation step of concurrent item tasks is
//! serialized through a [`Gate`] even though their page navigation runs
//! in parallel.

use std::pin::pin;

use futures::future::{self, Either};
use tracing::{debug, info, warn};

use super::FlowResult;
use crate::driver::{DriverError, Handle, PageDriver};
use crate::observer::{FlowEvent, FlowObserver};
use crate::site::{selectors, timeouts, CONFIRMATION_MAX_RETRIES};
use crate::sync::Gate;
use crate::types::CartItem;

enum Confirmation {
    Added,
    OutOfStock,
    /// Neither signal appeared within its wait window.
    TimedOut,
}

/// Add one item to the cart. Best-effort: every failure is absorbed and
/// reported through the observer, and the page is closed on every exit
/// path.
pub async fn add_item_to_cart(
    handle: &dyn Handle,
    item: &CartItem,
    gate: &Gate,
    observer: &dyn FlowObserver,
) {
    let page = match handle.new_page().await {
        Ok(page) => page,
        Err(e) => {
            warn!(item = %item.name, "could not open page to add item: {e}");
            return;
        }
    };

    if let Err(e) = add_on_page(page.as_ref(), item, gate, observer).await {
        warn!(item = %item.name, "failed to add item to cart: {e}");
    }
    if let Err(e) = page.close().await {
        warn!("failed to close add-to-cart page: {e}");
    }
}

async fn add_on_page(
    page: &dyn PageDriver,
    item: &CartItem,
    gate: &Gate,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    page.goto(&item.url).await?;

    // Delisted item: terminal, not retryable.
    if page.query_exists(selectors::NOT_AVAILABLE).await? {
        observer.on_event(&FlowEvent::ItemUnavailable {
            name: item.name.clone(),
        });
        return Ok(());
    }

    // The confirmation popup is shared across pages; one item at a time.
    let _section = gate.acquire().await;
    confirm_addition(page, item, observer).await
}

/// Bounded retry: click, race the two confirmation signals, reload and
/// try again while neither appears. Exhaustion is a reported failure,
/// never an error.
async fn confirm_addition(
    page: &dyn PageDriver,
    item: &CartItem,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let mut attempt: u32 = 0;
    loop {
        match attempt_confirmation(page).await {
            Ok(Confirmation::Added) => {
                info!(item = %item.name, "added to cart");
                observer.on_event(&FlowEvent::ItemAdded {
                    name: item.name.clone(),
                });
                return Ok(());
            }
            Ok(Confirmation::OutOfStock) => {
                info!(item = %item.name, "out of stock");
                observer.on_event(&FlowEvent::ItemOutOfStock {
                    name: item.name.clone(),
                });
                return Ok(());
            }
            Ok(Confirmation::TimedOut) => {
                debug!(item = %item.name, "no confirmation signal appeared");
            }
            Err(e) => {
                debug!(item = %item.name, "confirmation attempt failed: {e}");
            }
        }

        if attempt >= CONFIRMATION_MAX_RETRIES {
            warn!(item = %item.name, retries = attempt, "giving up on add to cart");
            observer.on_event(&FlowEvent::AddToCartFailed {
                name: item.name.clone(),
                retries: attempt,
            });
            return Ok(());
        }
        attempt += 1;
        observer.on_event(&FlowEvent::AddToCartRetried {
            name: item.name.clone(),
            attempt,
        });
        page.reload().await?;
    }
}

async fn attempt_confirmation(page: &dyn PageDriver) -> Result<Confirmation, DriverError> {
    page.wait_for_selector(selectors::ADD_TO_CART_BUTTON, timeouts::ADD_BUTTON)
        .await?;
    page.click(selectors::ADD_TO_CART_BUTTON).await?;

    // Race the success notification against the stock error, each with
    // its own wait window; the first to settle decides.
    let added = pin!(page.wait_for_selector(selectors::ADDED_NOTIFICATION, timeouts::CONFIRMATION));
    let out_of_stock = pin!(page.wait_for_selector(
        selectors::OUT_OF_STOCK_ERROR,
        timeouts::CONFIRMATION
    ));

    match future::select(added, out_of_stock).await {
        Either::Left((Ok(()), _)) => Ok(Confirmation::Added),
        Either::Right((Ok(()), _)) => Ok(Confirmation::OutOfStock),
        Either::Left((Err(e), _)) | Either::Right((Err(e), _)) => {
            if e.is_timeout() {
                Ok(Confirmation::TimedOut)
            } else {
                Err(e)
            }
        }
    }
}
