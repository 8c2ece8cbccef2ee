//! Concurrency primitives used by the orchestration layer.

mod gate;
mod limiter;

pub use gate::{Gate, GateGuard};
pub use limiter::Limiter;
