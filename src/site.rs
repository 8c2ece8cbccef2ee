//! The single-site surface: page URLs, CSS selectors, in-page scripts,
//! and the fixed concurrency/retry ceilings of the purchase flows.
//!
//! Everything that couples this crate to the Lulu Hypermarket frontend
//! lives here, so a markup change is a one-file fix.

pub const ORIGIN: &str = "https://www.luluhypermarket.in";
pub const LANDING_URL: &str = "https://www.luluhypermarket.in/en-in";
pub const SIGN_IN_URL: &str = "https://www.luluhypermarket.in/en-in/login";
pub const CART_URL: &str = "https://www.luluhypermarket.in/en-in/cart";

/// Browser handles launched for a fetch batch, at most.
pub const FETCH_POOL_CEILING: usize = 6;
/// Browser handles launched for an add-to-cart batch, at most.
pub const ADD_POOL_CEILING: usize = 3;

/// Reloads attempted when the add-to-cart confirmation never appears.
pub const CONFIRMATION_MAX_RETRIES: u32 = 5;
/// Whole-operation retries for cart clearing.
pub const CLEAR_CART_MAX_RETRIES: u32 = 3;

pub mod selectors {
    pub const SEARCH_ICON: &str = ".mobile-search-icon";
    pub const SEARCH_INPUT: &str = ".mobileAutoCompleteSearchInput";
    pub const PRODUCT_BOX: &str = ".product-box";

    pub const EMAIL_FIELD: &str = "#emailAddress";
    pub const PASSWORD_FIELD: &str = "#j_password";

    pub const ADD_TO_CART_BUTTON: &str = "#addToCartButton";
    pub const ADDED_NOTIFICATION: &str = ".addToCart-notification";
    pub const OUT_OF_STOCK_ERROR: &str = ".cart_popup_error_msg";
    pub const NOT_AVAILABLE: &str = ".not-available-btn";
    pub const REMOVE_CART_GROUP: &str = "#removeAllCartGroupItems";

    pub const CHECKOUT_TRIGGER: &str = "#checkoutitems";
    /// The delivery-slot modal once it is actually shown, not merely mounted.
    pub const SLOT_MODAL_VISIBLE: &str = r#".modal.date-time-modal.fade:not([aria-hidden="true"])"#;
    pub const ADDRESS_NEXT: &str = "#checkoutAddressNextBtn";
    pub const NETBANKING: &str = "#netbanking_IN";
    pub const NETBANKING_PROVIDER: &str = "#netbankingRazor";
    pub const REDEEM_CONTINUE: &str = "#redeembtn_netbanking";
    pub const UPI_OPTION: &str = r#"li[m="upi"][d="false"]"#;
    pub const UPI_ID_INPUT: &str = r#"input[name="vpa"]"#;
    pub const PAY_BUTTON: &str = "button#pay-now";
}

pub mod scripts {
    /// Reads `{name, price, url}` out of the first result card. The card
    /// embeds its data in a hidden input's data attributes; the URL is
    /// site-relative. Returns `null` when the card or input is missing.
    pub const EXTRACT_FIRST_PRODUCT: &str = r#"
(() => {
    const box = document.querySelector('.product-box');
    if (!box) return null;
    const hidden = box.querySelector('input[type="hidden"][data-name][data-price]');
    if (!hidden) return null;
    return {
        name: hidden.dataset.name,
        price: hidden.dataset.price,
        url: box.dataset.url,
    };
})()
"#;

    /// Clicks the first available slot in the active delivery-slot row,
    /// then the modal's apply control. Returns `true` only once both
    /// clicks have been issued; callers poll until then.
    pub const PICK_DELIVERY_SLOT: &str = r#"
(() => {
    const modal = document.getElementById('dateTimeUpdateModal');
    if (!modal) return false;
    const style = getComputedStyle(modal);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
        return false;
    }
    const activeRow = document.querySelector('.row.active');
    if (!activeRow) return false;
    const slot = activeRow.querySelector('.available');
    if (!slot) return false;
    slot.click();
    const update = modal.querySelector('.js-updateSlotThroughForm');
    if (!update) return false;
    update.click();
    return true;
})()
"#;
}

pub mod timeouts {
    use std::time::Duration;

    /// Default selector wait during page flows.
    pub const SELECTOR: Duration = Duration::from_secs(30);
    /// Page navigation, including the initial load.
    pub const NAVIGATION: Duration = Duration::from_secs(30);
    /// Finding an element before interacting with it.
    pub const INTERACTION: Duration = Duration::from_secs(10);

    /// Waiting for the add-to-cart button on a product page.
    pub const ADD_BUTTON: Duration = Duration::from_secs(5);
    /// Each arm of the added/out-of-stock confirmation race.
    pub const CONFIRMATION: Duration = Duration::from_secs(10);
    /// Delivery-slot modal appearing after the checkout trigger.
    pub const SLOT_MODAL: Duration = Duration::from_secs(10);
    /// Polling for an available delivery slot inside the modal.
    pub const SLOT_PICK: Duration = Duration::from_secs(30);
    /// Post-payment window in which the gateway redirect counts as
    /// confirmation.
    pub const PAYMENT_SETTLE: Duration = Duration::from_secs(60);
}
