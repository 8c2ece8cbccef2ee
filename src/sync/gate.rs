//! Asynchronous mutual-exclusion gate with scoped release.
//!
//! One task at a time may hold the gate; everyone else queues in arrival
//! order. Acquisition returns a [`GateGuard`] whose drop releases the
//! gate, so release happens on every exit path including early returns
//! and errors. The gate is not reentrant: a holder that acquires again
//! deadlocks.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct GateState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<GateGuard>>,
}

struct GateInner {
    state: Mutex<GateState>,
}

impl GateInner {
    /// Hands the gate to the next live waiter, or unlocks if none remain.
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        while let Some(tx) = state.waiters.pop_front() {
            let guard = GateGuard {
                inner: Arc::clone(self),
                armed: true,
            };
            match tx.send(guard) {
                // Hand-off: the gate stays locked, ownership moves.
                Ok(()) => return,
                // Waiter gave up; disarm the returned guard so dropping it
                // does not re-enter release while the state lock is held.
                Err(mut guard) => {
                    guard.armed = false;
                }
            }
        }
        state.locked = false;
    }
}

/// A single critical section shared by concurrent tasks.
pub struct Gate {
    inner: Arc<GateInner>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState {
                    locked: false,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Suspends until the caller is the sole holder.
    pub async fn acquire(&self) -> GateGuard {
        loop {
            let rx = {
                let mut state = self.inner.state.lock();
                if !state.locked {
                    state.locked = true;
                    return GateGuard {
                        inner: Arc::clone(&self.inner),
                        armed: true,
                    };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };
            match rx.await {
                Ok(guard) => return guard,
                // Sender dropped without a hand-off; queue again.
                Err(_) => continue,
            }
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the gate; dropping it releases to the next waiter.
pub struct GateGuard {
    inner: Arc<GateInner>,
    armed: bool,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release();
        }
    }
}
