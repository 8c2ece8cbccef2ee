//! The boundary surface consumed by callers (an HTTP layer, the CLI).
//!
//! Five operations: sign-in, batch item fetch, cart clear, batch
//! add-to-cart, and checkout. Batches fan out over a bounded pool of
//! browser handles; per-item failures are contained to their item, while
//! sign-in, checkout, and handle-launch failures propagate.

use std::sync::Arc;

use tracing::info;

use crate::driver::Driver;
use crate::observer::FlowObserver;
use crate::pool::HandlePool;
use crate::site;
use crate::sync::Gate;
use crate::tasks::{cart, checkout as checkout_task, clear, fetch, session, FlowResult};
use crate::tasks::session::SessionTarget;
use crate::types::{CartItem, Credentials, ItemResult};

/// Sign in once on a dedicated browser, to verify credentials.
pub async fn sign_in(
    driver: &dyn Driver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    session::sign_in(SessionTarget::Owned(driver), credentials, observer).await
}

/// Look up every query concurrently and return one outcome per query, in
/// order. `None` marks a single failed lookup; the batch itself only
/// fails if no browser could be launched.
pub async fn fetch_items(
    driver: &dyn Driver,
    queries: &[String],
    observer: &dyn FlowObserver,
) -> FlowResult<Vec<Option<ItemResult>>> {
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let pool = HandlePool::launch(driver, queries.len(), site::FETCH_POOL_CEILING).await?;
    let results = pool
        .run_all(queries.to_vec(), |query, handle| async move {
            fetch::fetch_item(&*handle, &query, observer).await
        })
        .await;
    pool.close_all().await;

    info!(
        found = results.iter().filter(|r| r.is_some()).count(),
        total = results.len(),
        "fetch batch finished"
    );
    Ok(results)
}

/// Empty the cart, best-effort. Failures are retried, then logged and
/// absorbed; this never fails the caller.
pub async fn clear_cart(
    driver: &dyn Driver,
    credentials: &Credentials,
    observer: &dyn FlowObserver,
) {
    clear::clear_cart(driver, credentials, observer).await;
}

/// Clear the cart and add every item to it.
///
/// The clear and the per-handle sign-ins run concurrently, and both have
/// finished before the first add-to-cart attempt starts. Adds fan out
/// over the pool, round-robin, serializing their confirmation step
/// through one shared gate. Per-item failures are absorbed; launch and
/// sign-in failures propagate after the handles are closed.
pub async fn add_filtered_items_to_cart(
    driver: &dyn Driver,
    credentials: &Credentials,
    items: &[CartItem],
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let (_, pool) = tokio::join!(
        clear::clear_cart(driver, credentials, observer),
        launch_signed_in_pool(driver, credentials, items.len(), observer),
    );
    let pool = pool?;

    let gate = Gate::new();
    {
        let gate = &gate;
        pool.run_all(items.to_vec(), |item, handle| async move {
            cart::add_item_to_cart(&*handle, &item, gate, observer).await
        })
        .await;
    }
    pool.close_all().await;

    info!(items = items.len(), "add-to-cart batch finished");
    Ok(())
}

/// Launch the add-to-cart pool and sign in on every handle. On any
/// sign-in failure the whole pool is closed before the error propagates.
async fn launch_signed_in_pool(
    driver: &dyn Driver,
    credentials: &Credentials,
    batch_size: usize,
    observer: &dyn FlowObserver,
) -> FlowResult<HandlePool> {
    let pool = HandlePool::launch(driver, batch_size, site::ADD_POOL_CEILING).await?;

    let sign_ins = pool
        .handles()
        .iter()
        .map(Arc::clone)
        .map(|handle| async move {
            session::sign_in(SessionTarget::OnHandle(&*handle), credentials, observer).await
        });
    let outcomes = futures::future::join_all(sign_ins).await;

    if let Some(error) = outcomes.into_iter().find_map(Result::err) {
        pool.close_all().await;
        return Err(error);
    }
    Ok(pool)
}

/// Complete payment for the current cart. Hard failure on any step;
/// payment flows are not retried.
pub async fn checkout(
    driver: &dyn Driver,
    credentials: &Credentials,
    upi_id: &str,
    observer: &dyn FlowObserver,
) -> FlowResult<()> {
    checkout_task::checkout(driver, credentials, upi_id, observer).await
}
