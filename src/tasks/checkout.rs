//! The checkout state machine.
//!
//! A linear sequence with one recovery branch: the delivery-slot modal
//! may or may not appear after the checkout trigger. Payment flows are
//! not safely retryable, so any step failure closes everything and
//! propagates as a hard error.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use super::{session, FlowError, FlowResult};
use crate::driver::{Driver, DriverError, DriverResult, Handle, PageDriver};
use crate::observer::{CheckoutStage, FlowEvent, FlowObserver};
use crate::site::{self, scripts, selectors, timeouts};
use crate::types::Credentials;

/// Complete payment for the current cart on a dedicated browser.
pub async fn checkout(
    driver: &dyn Driver,
    credentials: &Credentials,
    upi_id: &str,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let handle = driver.launch().await?;
    let outcome = checkout_with_handle(handle.as_ref(), credentials, upi_id, observer).await;
    if let Err(e) = handle.close().await {
        warn!("failed to close checkout browser: {e}");
    }
    outcome
}

async fn checkout_with_handle(
    handle: &dyn Handle,
    credentials: &Credentials,
    upi_id: &str,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    let page = handle.new_page().await?;
    let outcome = checkout_on_page(page.as_ref(), credentials, upi_id, observer).await;
    if let Err(e) = page.close().await {
        warn!("failed to close checkout page: {e}");
    }
    outcome
}

fn at_stage(stage: &'static str) -> impl Fn(FlowError) -> FlowError {
    move |source| FlowError::Checkout {
        stage,
        source: Box::new(source),
    }
}

async fn checkout_on_page(
    page: &dyn PageDriver,
    credentials: &Credentials,
    upi_id: &str,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    session::sign_in_on_page(page, credentials, observer)
        .await
        .map_err(at_stage("sign-in"))?;

    open_cart(page)
        .await
        .map_err(FlowError::from)
        .map_err(at_stage("cart"))?;

    schedule_delivery_slot(page, observer)
        .await
        .map_err(FlowError::from)
        .map_err(at_stage("delivery-slot"))?;

    complete_payment(page, upi_id, observer)
        .await
        .map_err(FlowError::from)
        .map_err(at_stage("payment"))?;

    await_payment_settlement(page, observer).await;
    Ok(())
}

async fn open_cart(page: &dyn PageDriver) -> DriverResult<()> {
    page.goto(site::CART_URL).await?;
    page.wait_for_selector(selectors::CHECKOUT_TRIGGER, timeouts::SELECTOR)
        .await
}

/// Click the checkout trigger, then handle the delivery-slot modal if it
/// shows up. The site sometimes skips the modal and navigates straight
/// to payment; that is the non-error branch.
async fn schedule_delivery_slot(
    page: &dyn PageDriver,
    observer: &dyn FlowObserver,
) -> DriverResult<()> {
    page.click(selectors::CHECKOUT_TRIGGER).await?;

    match page
        .wait_for_selector(selectors::SLOT_MODAL_VISIBLE, timeouts::SLOT_MODAL)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_timeout() => {
            info!("no delivery-slot modal, continuing straight to payment");
            observer.on_event(&FlowEvent::CheckoutStage {
                stage: CheckoutStage::DirectToPayment,
            });
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    observer.on_event(&FlowEvent::CheckoutStage {
        stage: CheckoutStage::SlotModalShown,
    });

    pick_available_slot(page).await?;
    observer.on_event(&FlowEvent::CheckoutStage {
        stage: CheckoutStage::SlotPicked,
    });

    // Applying the slot reloads the page; then the checkout trigger has
    // to be clicked a second time.
    page.wait_for_navigation().await?;
    page.wait_for_selector(selectors::CHECKOUT_TRIGGER, timeouts::SELECTOR)
        .await?;
    let (clicked, navigated) = futures::join!(
        page.click(selectors::CHECKOUT_TRIGGER),
        page.wait_for_navigation(),
    );
    clicked?;
    navigated
}

/// Poll the slot-picking script until an available slot in the active
/// row has been clicked and applied. The modal populates asynchronously,
/// so a single evaluation is rarely enough.
async fn pick_available_slot(page: &dyn PageDriver) -> DriverResult<()> {
    let deadline = Instant::now() + timeouts::SLOT_PICK;
    let mut poll_interval = Duration::from_millis(250);
    let max_interval = Duration::from_secs(1);

    loop {
        if page.evaluate(scripts::PICK_DELIVERY_SLOT).await? == Value::Bool(true) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(DriverError::WaitTimeout {
                selector: "available delivery slot".to_string(),
                waited_ms: timeouts::SLOT_PICK.as_millis() as u64,
            });
        }
        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}

async fn complete_payment(
    page: &dyn PageDriver,
    upi_id: &str,
    observer: &dyn FlowObserver,
) -> DriverResult<()> {
    page.wait_for_selector(selectors::ADDRESS_NEXT, timeouts::SELECTOR)
        .await?;
    let (clicked, navigated) = futures::join!(
        page.click(selectors::ADDRESS_NEXT),
        page.wait_for_navigation(),
    );
    clicked?;
    navigated?;
    observer.on_event(&FlowEvent::CheckoutStage {
        stage: CheckoutStage::AddressConfirmed,
    });

    page.click(selectors::NETBANKING).await?;
    page.wait_for_selector(selectors::NETBANKING_PROVIDER, timeouts::SELECTOR)
        .await?;
    page.click(selectors::NETBANKING_PROVIDER).await?;
    page.wait_for_selector(selectors::REDEEM_CONTINUE, timeouts::SELECTOR)
        .await?;
    page.click(selectors::REDEEM_CONTINUE).await?;
    page.wait_for_navigation().await?;

    page.wait_for_selector(selectors::UPI_OPTION, timeouts::SELECTOR)
        .await?;
    page.click(selectors::UPI_OPTION).await?;
    observer.on_event(&FlowEvent::CheckoutStage {
        stage: CheckoutStage::UpiSelected,
    });
    page.wait_for_selector(selectors::UPI_ID_INPUT, timeouts::SELECTOR)
        .await?;
    page.type_text(selectors::UPI_ID_INPUT, upi_id).await?;
    page.wait_for_selector(selectors::PAY_BUTTON, timeouts::SELECTOR)
        .await?;
    page.click(selectors::PAY_BUTTON).await?;
    observer.on_event(&FlowEvent::PaymentSubmitted);
    Ok(())
}

/// The gateway redirects back once the payment is confirmed. Give it the
/// settle window; not seeing the redirect in time is a normal outcome,
/// reported but not an error.
async fn await_payment_settlement(page: &dyn PageDriver, observer: &dyn FlowObserver) {
    let confirmed = matches!(
        tokio::time::timeout(timeouts::PAYMENT_SETTLE, page.wait_for_navigation()).await,
        Ok(Ok(()))
    );
    if !confirmed {
        info!("payment confirmation not observed within the settle window");
    }
    observer.on_event(&FlowEvent::PaymentSettled { confirmed });
}
