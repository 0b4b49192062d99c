//! Inference engine port: Trait for the numeric runtime that executes the model.
//!
//! The application never looks inside the graph. It relies on two things:
//! - the session declares its input slot names, so they can be checked against
//!   the encoder's signature;
//! - `run` returns an output slot named `probabilities` whose element at index 1 is
//!   the positive-class probability.

use std::path::Path;
use std::sync::Arc;

use crate::domain::TensorMap;

/// Output slot carrying class probabilities.
pub const PROBABILITIES_OUTPUT: &str = "probabilities";

/// Index of the positive class inside `PROBABILITIES_OUTPUT`.
///
/// This is a contract of the model artifact (index 0 = negative, 1 = positive),
/// not something read from the graph at runtime.
pub const POSITIVE_CLASS_INDEX: usize = 1;

/// Errors raised by an inference runtime.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to read model graph {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model graph is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Invalid model graph: {0}")]
    InvalidGraph(String),

    #[error("Missing input tensor: {0}")]
    MissingInput(String),

    #[error("Input tensor {name} has shape {dims:?}, expected a single element")]
    ShapeMismatch { name: String, dims: Vec<usize> },

    #[error("Runtime failure: {0}")]
    Runtime(String),
}

/// A loaded, read-only inference graph.
///
/// Sessions are shared between calls, so `run` takes `&self`.
pub trait InferenceSession: Send + Sync {
    /// Declared input slot names, in graph order.
    fn input_names(&self) -> &[String];

    /// Declared output slot names.
    fn output_names(&self) -> &[String];

    /// Hex digest identifying the loaded artifact, if the runtime computes one.
    fn fingerprint(&self) -> Option<&str> {
        None
    }

    /// Execute the graph on named inputs.
    ///
    /// # Errors
    /// Returns `EngineError` if an input is missing or malformed, or the runtime fails.
    fn run(&self, inputs: &TensorMap) -> Result<TensorMap, EngineError>;
}

/// Trait for loading inference graphs.
pub trait InferenceEngine: Send + Sync {
    /// Load a graph from a resource location.
    ///
    /// # Errors
    /// Returns `EngineError` if the resource cannot be read or is not a valid graph.
    fn load(&self, location: &Path) -> Result<Arc<dyn InferenceSession>, EngineError>;
}
