//! Structured flow events.
//!
//! Flows report progress through an injected [`FlowObserver`] rather than
//! logging free-form text, so callers (and tests) can react to outcomes
//! instead of parsing log lines. [`LogObserver`] is the default sink and
//! forwards everything to `tracing`.

use tracing::{info, warn};

/// A milestone or per-item outcome emitted by the purchase flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    ItemFetched { query: String, name: String },
    ItemFetchFailed { query: String, reason: String },

    SignedIn,
    /// The login page redirected straight to the landing page; credentials
    /// were never filled.
    AlreadySignedIn,

    ItemUnavailable { name: String },
    ItemAdded { name: String },
    ItemOutOfStock { name: String },
    AddToCartRetried { name: String, attempt: u32 },
    AddToCartFailed { name: String, retries: u32 },

    CartGroupRemoved,
    CartCleared,
    CartClearRetried { attempt: u32 },
    CartClearFailed { retries: u32 },

    CheckoutStage { stage: CheckoutStage },
    PaymentSubmitted,
    /// `confirmed` is false when the settle window elapsed without the
    /// gateway redirecting back.
    PaymentSettled { confirmed: bool },
}

/// Coarse checkpoints of the checkout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    SlotModalShown,
    DirectToPayment,
    SlotPicked,
    AddressConfirmed,
    UpiSelected,
}

pub trait FlowObserver: Send + Sync {
    fn on_event(&self, event: &FlowEvent);
}

/// Default observer: renders events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl FlowObserver for LogObserver {
    fn on_event(&self, event: &FlowEvent) {
        match event {
            FlowEvent::ItemFetched { query, name } => info!(%query, %name, "item fetched"),
            FlowEvent::ItemFetchFailed { query, reason } => {
                warn!(%query, %reason, "item fetch failed")
            }
            FlowEvent::SignedIn => info!("signed in"),
            FlowEvent::AlreadySignedIn => info!("already signed in"),
            FlowEvent::ItemUnavailable { name } => info!(%name, "item not available"),
            FlowEvent::ItemAdded { name } => info!(%name, "item added to cart"),
            FlowEvent::ItemOutOfStock { name } => info!(%name, "item out of stock"),
            FlowEvent::AddToCartRetried { name, attempt } => {
                info!(%name, attempt, "retrying add to cart")
            }
            FlowEvent::AddToCartFailed { name, retries } => {
                warn!(%name, retries, "giving up on adding item to cart")
            }
            FlowEvent::CartGroupRemoved => info!("removed a cart group"),
            FlowEvent::CartCleared => info!("cart cleared"),
            FlowEvent::CartClearRetried { attempt } => info!(attempt, "retrying cart clear"),
            FlowEvent::CartClearFailed { retries } => {
                warn!(retries, "giving up on clearing cart")
            }
            FlowEvent::CheckoutStage { stage } => info!(?stage, "checkout stage"),
            FlowEvent::PaymentSubmitted => info!("payment submitted"),
            FlowEvent::PaymentSettled { confirmed } => info!(confirmed, "payment settled"),
        }
    }
}
