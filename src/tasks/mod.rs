//! Per-item and per-session UI tasks composing the purchase flows.

pub mod cart;
pub mod checkout;
pub mod clear;
pub mod fetch;
pub mod session;

use thiserror::Error;

use crate::driver::DriverError;

/// Failures that escape a task. Per-item and retryable conditions are
/// absorbed inside the tasks; what propagates here is the fatal tier:
/// launch, sign-in, and checkout failures.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("could not extract product data: {0}")]
    ProductData(String),

    #[error("checkout failed at {stage}")]
    Checkout {
        stage: &'static str,
        #[source]
        source: Box<FlowError>,
    },
}

pub type FlowResult<T> = Result<T, FlowError>;
