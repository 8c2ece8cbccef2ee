//! Capacity-based admission for asynchronous tasks.
//!
//! A [`Limiter`] runs at most `ceiling` futures concurrently. Excess
//! submissions queue in arrival order and start as slots free up. A
//! task's failure is its own result; it never cancels siblings. There is
//! no priority, only capacity.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct LimiterState {
    active: usize,
    ceiling: usize,
    waiters: VecDeque<oneshot::Sender<Slot>>,
}

struct LimiterInner {
    state: Mutex<LimiterState>,
}

impl LimiterInner {
    /// Passes the freed slot to the next live waiter, or shrinks the
    /// active count if none remain.
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        while let Some(tx) = state.waiters.pop_front() {
            let slot = Slot {
                inner: Arc::clone(self),
                armed: true,
            };
            match tx.send(slot) {
                Ok(()) => return,
                // Receiver dropped; disarm so the bounced slot does not
                // re-enter release under the held lock.
                Err(mut slot) => {
                    slot.armed = false;
                }
            }
        }
        state.active -= 1;
    }
}

/// Bounds the number of concurrently executing futures.
pub struct Limiter {
    inner: Arc<LimiterInner>,
}

impl Limiter {
    /// Panics if `ceiling` is zero.
    pub fn new(ceiling: usize) -> Self {
        assert!(ceiling > 0, "limiter ceiling must be positive");
        Self {
            inner: Arc::new(LimiterInner {
                state: Mutex::new(LimiterState {
                    active: 0,
                    ceiling,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Runs `task` once capacity allows, resolving with its output.
    pub async fn run<T>(&self, task: impl Future<Output = T>) -> T {
        let _slot = self.admit().await;
        task.await
    }

    async fn admit(&self) -> Slot {
        loop {
            let rx = {
                let mut state = self.inner.state.lock();
                if state.active < state.ceiling {
                    state.active += 1;
                    return Slot {
                        inner: Arc::clone(&self.inner),
                        armed: true,
                    };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };
            match rx.await {
                Ok(slot) => return slot,
                // Sender dropped without a hand-off; queue again.
                Err(_) => continue,
            }
        }
    }
}

/// One unit of limiter capacity; dropping it frees the slot.
struct Slot {
    inner: Arc<LimiterInner>,
    armed: bool,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_ceiling() {
        let limiter = Arc::new(Limiter::new(3));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let limiter = Arc::clone(&limiter);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            tasks.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(max_active.load(Ordering::SeqCst) <= 3);
        // Plenty of queued work, so the ceiling was actually reached.
        assert_eq!(max_active.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn task_failure_does_not_cancel_siblings() {
        let limiter = Arc::new(Limiter::new(2));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for index in 0..6usize {
            let limiter = Arc::clone(&limiter);
            let completed = Arc::clone(&completed);
            tasks.push(tokio::spawn(async move {
                limiter
                    .run(async move {
                        if index % 2 == 0 {
                            Err::<(), _>("boom")
                        } else {
                            completed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    })
                    .await
            }));
        }
        for task in tasks {
            // Each future resolves with its own result, error or not.
            let _ = task.await.unwrap();
        }

        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn queued_tasks_run_as_capacity_frees() {
        let limiter = Limiter::new(1);
        let mut order = Vec::new();
        for index in 0..4 {
            order.push(limiter.run(async move { index }).await);
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
