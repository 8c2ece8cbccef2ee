//! Bounded pool of browser handles for batch work.
//!
//! A batch of `M` items over a ceiling of `K` gets `min(M, K)` browser
//! instances; item `i` runs on handle `i % count`, and a [`Limiter`]
//! with the same ceiling bounds how many items are in flight at once.
//! Every launched handle is closed when the batch ends, whatever the
//! outcome.

use std::future::Future;
use std::sync::Arc;

use futures::future;
use tracing::{debug, warn};

use crate::driver::{Driver, DriverResult, Handle};
use crate::sync::Limiter;

pub struct HandlePool {
    handles: Vec<Arc<dyn Handle>>,
    limiter: Limiter,
}

impl HandlePool {
    /// Launch `min(batch_size, ceiling)` handles.
    ///
    /// If a launch fails partway, the handles launched so far are closed
    /// before the failure propagates.
    pub async fn launch(
        driver: &dyn Driver,
        batch_size: usize,
        ceiling: usize,
    ) -> DriverResult<Self> {
        let count = batch_size.min(ceiling);
        let mut handles: Vec<Arc<dyn Handle>> = Vec::with_capacity(count);
        for _ in 0..count {
            match driver.launch().await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!("handle launch failed, closing {} already launched", handles.len());
                    close_handles(&handles).await;
                    return Err(e);
                }
            }
        }
        debug!("launched {count} browser handles");
        Ok(Self {
            handles,
            limiter: Limiter::new(ceiling),
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[Arc<dyn Handle>] {
        &self.handles
    }

    /// Round-robin assignment. The pool must be non-empty.
    pub fn handle(&self, index: usize) -> Arc<dyn Handle> {
        Arc::clone(&self.handles[index % self.handles.len()])
    }

    /// Run one task per item through the limiter, item `i` on handle
    /// `i % len`. Outcomes come back in item order; a failed item is just
    /// that item's outcome, never the batch's.
    pub async fn run_all<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<T>
    where
        F: Fn(I, Arc<dyn Handle>) -> Fut,
        Fut: Future<Output = T>,
    {
        let jobs = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.limiter.run(task(item, self.handle(index))));
        future::join_all(jobs).await
    }

    /// Close every handle, logging rather than propagating close errors.
    pub async fn close_all(self) {
        close_handles(&self.handles).await;
    }
}

async fn close_handles(handles: &[Arc<dyn Handle>]) {
    for handle in handles {
        if let Err(e) = handle.close().await {
            warn!("failed to close browser handle: {e}");
        }
    }
}
