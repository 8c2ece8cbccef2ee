//! Per-item product lookup.

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{FlowError, FlowResult};
use crate::driver::{Handle, PageDriver};
use crate::observer::{FlowEvent, FlowObserver};
use crate::site::{self, selectors, timeouts};
use crate::types::ItemResult;

/// Search the site for `query` and extract the first result.
///
/// Failures are contained: any missed selector or navigation error logs,
/// reports through the observer, and yields `None` for this item only.
/// The page opened here is closed on every exit path.
pub async fn fetch_item(
    handle: &dyn Handle,
    query: &str,
    observer: &dyn FlowObserver,
) -> Option<ItemResult> {
    let page = match handle.new_page().await {
        Ok(page) => page,
        Err(e) => {
            warn!(%query, "could not open page for item search: {e}");
            observer.on_event(&FlowEvent::ItemFetchFailed {
                query: query.to_string(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    let outcome = search_first_product(page.as_ref(), query).await;
    if let Err(e) = page.close().await {
        warn!("failed to close search page: {e}");
    }

    match outcome {
        Ok(item) => {
            debug!(%query, name = %item.name, "fetched item");
            observer.on_event(&FlowEvent::ItemFetched {
                query: query.to_string(),
                name: item.name.clone(),
            });
            Some(item)
        }
        Err(e) => {
            warn!(%query, "item search failed: {e}");
            observer.on_event(&FlowEvent::ItemFetchFailed {
                query: query.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}

async fn search_first_product(page: &dyn PageDriver, query: &str) -> FlowResult<ItemResult> {
    page.goto(site::LANDING_URL).await?;
    page.wait_for_selector(selectors::SEARCH_ICON, timeouts::SELECTOR)
        .await?;
    page.click(selectors::SEARCH_ICON).await?;
    page.wait_for_selector(selectors::SEARCH_INPUT, timeouts::SELECTOR)
        .await?;
    page.type_text(selectors::SEARCH_INPUT, query).await?;
    page.press_enter(selectors::SEARCH_INPUT).await?;
    page.wait_for_selector(selectors::PRODUCT_BOX, timeouts::SELECTOR)
        .await?;

    let value = page.evaluate(site::scripts::EXTRACT_FIRST_PRODUCT).await?;
    parse_product(value)
}

#[derive(Deserialize)]
struct RawProduct {
    name: String,
    price: String,
    url: String,
}

fn parse_product(value: serde_json::Value) -> FlowResult<ItemResult> {
    let raw: RawProduct = serde_json::from_value(value)
        .map_err(|e| FlowError::ProductData(format!("unexpected result card shape: {e}")))?;
    Ok(ItemResult {
        name: raw.name,
        price: raw.price,
        url: absolutize(&raw.url)?,
    })
}

/// The result card carries a site-relative URL; resolve it against the
/// origin. Already-absolute URLs pass through unchanged.
fn absolutize(path: &str) -> FlowResult<String> {
    let base = Url::parse(site::ORIGIN)
        .map_err(|e| FlowError::ProductData(format!("bad site origin: {e}")))?;
    let joined = base
        .join(path)
        .map_err(|e| FlowError::ProductData(format!("bad product url '{path}': {e}")))?;
    Ok(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absolutizes_relative_product_url() {
        assert_eq!(
            absolutize("/en-in/p/milk-1l").unwrap(),
            "https://www.luluhypermarket.in/en-in/p/milk-1l"
        );
    }

    #[test]
    fn keeps_absolute_url() {
        assert_eq!(
            absolutize("https://elsewhere.example/p/1").unwrap(),
            "https://elsewhere.example/p/1"
        );
    }

    #[test]
    fn parses_result_card() {
        let item = parse_product(json!({
            "name": "Milk",
            "price": "40",
            "url": "/p/milk"
        }))
        .unwrap();
        assert_eq!(item.name, "Milk");
        assert_eq!(item.price, "40");
        assert_eq!(item.url, "https://www.luluhypermarket.in/p/milk");
    }

    #[test]
    fn missing_card_is_an_error() {
        assert!(parse_product(serde_json::Value::Null).is_err());
    }
}
