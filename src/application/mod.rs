//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the prediction workflow.

mod calculator;
mod invoker;

pub use calculator::RiskCalculator;
pub use invoker::{
    check_signature, positive_probability, InferenceError, InferenceInvoker, InvokerState,
    ModelLoadError,
};

#[cfg(test)]
pub(crate) use invoker::tests::MockEngine;
