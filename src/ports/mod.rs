//! Ports layer: Trait definitions for external operations.
//!
//! The inference runtime is an opaque collaborator: it loads a graph from a
//! location and maps named input tensors to named output tensors.

mod inference_engine;

pub use inference_engine::{
    EngineError, InferenceEngine, InferenceSession, POSITIVE_CLASS_INDEX, PROBABILITIES_OUTPUT,
};
