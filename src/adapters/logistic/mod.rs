//! Logistic adapter: Implementation of InferenceEngine for exported logistic-regression graphs.
//!
//! The training pipeline exports the fitted model as JSON:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "inputs": ["age_at_insertion", "..."],
//!   "coefficients": [0.012, "..."],
//!   "intercept": -1.7,
//!   "outputs": ["probabilities"]
//! }
//! ```
//!
//! `run` computes `p = sigmoid(intercept + Σ wᵢ·xᵢ)` and returns
//! `probabilities = [1 - p, p]` with shape `[1, 2]`: index 0 is the negative class,
//! index 1 the positive class.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Tensor, TensorMap};
use crate::ports::{EngineError, InferenceEngine, InferenceSession, PROBABILITIES_OUTPUT};

const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedLogisticGraph {
    pub format_version: u32,
    pub inputs: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub outputs: Vec<String>,
}

impl ExportedLogisticGraph {
    fn check(&self) -> Result<(), EngineError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(EngineError::InvalidGraph(format!(
                "unsupported format_version {} (expected {SUPPORTED_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.inputs.is_empty() {
            return Err(EngineError::InvalidGraph("graph declares no inputs".into()));
        }
        if self.coefficients.len() != self.inputs.len() {
            return Err(EngineError::InvalidGraph(format!(
                "{} coefficients for {} inputs",
                self.coefficients.len(),
                self.inputs.len()
            )));
        }
        let distinct: BTreeSet<&str> = self.inputs.iter().map(String::as_str).collect();
        if distinct.len() != self.inputs.len() {
            return Err(EngineError::InvalidGraph("duplicate input names".into()));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(EngineError::InvalidGraph("non-finite parameter".into()));
        }
        if !self.outputs.iter().any(|o| o == PROBABILITIES_OUTPUT) {
            return Err(EngineError::InvalidGraph(format!(
                "graph does not declare a '{PROBABILITIES_OUTPUT}' output"
            )));
        }
        Ok(())
    }
}

fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// A loaded logistic-regression graph.
#[derive(Debug, Clone)]
pub struct LogisticSession {
    graph: ExportedLogisticGraph,
    fingerprint: String,
}

impl LogisticSession {
    /// Build a session from already-parsed parameters.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidGraph` if the parameters are inconsistent.
    pub fn from_graph(graph: ExportedLogisticGraph) -> Result<Self, EngineError> {
        graph.check()?;
        let bytes = serde_json::to_vec(&graph)?;
        Ok(Self {
            fingerprint: sha256_hex_bytes(&bytes),
            graph,
        })
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let graph: ExportedLogisticGraph = serde_json::from_slice(bytes)?;
        graph.check()?;
        Ok(Self {
            fingerprint: sha256_hex_bytes(bytes),
            graph,
        })
    }

    fn input_value(inputs: &TensorMap, name: &str) -> Result<f64, EngineError> {
        let tensor = inputs
            .get(name)
            .ok_or_else(|| EngineError::MissingInput(name.to_string()))?;
        tensor
            .as_scalar()
            .map(f64::from)
            .ok_or_else(|| EngineError::ShapeMismatch {
                name: name.to_string(),
                dims: tensor.dims.clone(),
            })
    }
}

impl InferenceSession for LogisticSession {
    fn input_names(&self) -> &[String] {
        &self.graph.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.graph.outputs
    }

    fn fingerprint(&self) -> Option<&str> {
        Some(&self.fingerprint)
    }

    fn run(&self, inputs: &TensorMap) -> Result<TensorMap, EngineError> {
        let mut z = self.graph.intercept;
        for (name, weight) in self.graph.inputs.iter().zip(&self.graph.coefficients) {
            z += weight * Self::input_value(inputs, name)?;
        }

        let p = sigmoid(z);
        if !p.is_finite() {
            return Err(EngineError::Runtime(format!("non-finite output for logit {z}")));
        }

        let mut outputs = TensorMap::new();
        outputs.insert(
            PROBABILITIES_OUTPUT.to_string(),
            Tensor::row(vec![(1.0 - p) as f32, p as f32]),
        );
        Ok(outputs)
    }
}

/// Engine for `ExportedLogisticGraph` JSON files.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogisticEngine;

impl LogisticEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for LogisticEngine {
    fn load(&self, location: &Path) -> Result<Arc<dyn InferenceSession>, EngineError> {
        let bytes = std::fs::read(location).map_err(|source| EngineError::Io {
            path: location.display().to_string(),
            source,
        })?;
        let session = LogisticSession::from_bytes(&bytes)?;

        tracing::info!(
            "Loaded logistic graph from {:?} (inputs={}, sha256={})",
            location,
            session.graph.inputs.len(),
            session.fingerprint
        );

        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn graph(inputs: &[&str], coefficients: Vec<f64>, intercept: f64) -> ExportedLogisticGraph {
        ExportedLogisticGraph {
            format_version: 1,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            coefficients,
            intercept,
            outputs: vec![PROBABILITIES_OUTPUT.to_string()],
        }
    }

    fn write_graph(path: &Path, graph: &ExportedLogisticGraph) {
        let json = serde_json::to_string(graph).expect("serialize graph");
        std::fs::write(path, json).expect("write graph");
    }

    #[test]
    fn test_run_computes_sigmoid() {
        let session =
            LogisticSession::from_graph(graph(&["a", "b"], vec![1.0, -2.0], 0.5)).expect("valid");

        let mut inputs = TensorMap::new();
        inputs.insert("a".into(), Tensor::scalar(1.0));
        inputs.insert("b".into(), Tensor::scalar(0.75));

        // z = 0.5 + 1.0 - 1.5 = 0
        let outputs = session.run(&inputs).expect("run");
        let probabilities = &outputs[PROBABILITIES_OUTPUT];
        assert_eq!(probabilities.dims, vec![1, 2]);
        assert!((probabilities.data[0] - 0.5).abs() < 1e-6);
        assert!((probabilities.data[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_run_ignores_extra_inputs_and_rejects_missing() {
        let session = LogisticSession::from_graph(graph(&["a"], vec![1.0], 0.0)).expect("valid");

        let mut inputs = TensorMap::new();
        inputs.insert("z".into(), Tensor::scalar(1.0));
        assert!(matches!(
            session.run(&inputs),
            Err(EngineError::MissingInput(name)) if name == "a"
        ));

        inputs.insert("a".into(), Tensor::row(vec![1.0, 2.0]));
        assert!(matches!(
            session.run(&inputs),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_inconsistent_graphs() {
        assert!(LogisticSession::from_graph(graph(&["a", "b"], vec![1.0], 0.0)).is_err());
        assert!(LogisticSession::from_graph(graph(&["a", "a"], vec![1.0, 1.0], 0.0)).is_err());
        assert!(LogisticSession::from_graph(graph(&[], vec![], 0.0)).is_err());
        assert!(LogisticSession::from_graph(graph(&["a"], vec![f64::NAN], 0.0)).is_err());

        let mut no_output = graph(&["a"], vec![1.0], 0.0);
        no_output.outputs = vec!["label".into()];
        assert!(LogisticSession::from_graph(no_output).is_err());

        let mut future = graph(&["a"], vec![1.0], 0.0);
        future.format_version = 2;
        assert!(LogisticSession::from_graph(future).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("model.json");
        write_graph(&path, &graph(&["a"], vec![2.0], -1.0));

        let session = LogisticEngine::new().load(&path).expect("load graph");
        assert_eq!(session.input_names(), &["a".to_string()]);
        assert_eq!(session.output_names(), &[PROBABILITIES_OUTPUT.to_string()]);
        assert_eq!(session.fingerprint().map(str::len), Some(64));
    }

    #[test]
    fn test_load_missing_and_malformed_files() {
        let temp = tempdir().expect("tempdir");

        let missing = LogisticEngine::new().load(&temp.path().join("absent.json"));
        assert!(matches!(missing, Err(EngineError::Io { .. })));

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, "{ not json").expect("write");
        assert!(matches!(
            LogisticEngine::new().load(&bad),
            Err(EngineError::Format(_))
        ));
    }
}
