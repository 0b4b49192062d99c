//! Adapters layer: Concrete implementations of ports.
//!
//! - `logistic`: JSON logistic-regression graphs for the `InferenceEngine` port

pub mod logistic;

pub use logistic::{ExportedLogisticGraph, LogisticEngine, LogisticSession};
