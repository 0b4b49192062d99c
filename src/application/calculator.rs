//! Risk calculator: validate -> encode -> load -> run -> present.
//!
//! Each layer only handles its own faults: validation errors stop the pipeline
//! before the encoder, and engine errors never reach the validator.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::{
    validate, EncodingMode, FeatureEncoder, FormRecord, Prediction, TensorMap, ValidatedRecord,
};
use crate::ports::{InferenceEngine, InferenceSession};
use crate::UpriskError;

use super::invoker::{InferenceInvoker, InvokerState};

/// Service running the full prediction pipeline for one model.
pub struct RiskCalculator<E: InferenceEngine> {
    invoker: InferenceInvoker<E>,
    encoder: FeatureEncoder,
}

impl<E: InferenceEngine> RiskCalculator<E> {
    /// Create a calculator. The model is loaded lazily on first use.
    pub fn new(engine: E, model_path: impl Into<std::path::PathBuf>, mode: EncodingMode) -> Self {
        Self {
            invoker: InferenceInvoker::new(engine, model_path),
            encoder: FeatureEncoder::new(mode),
        }
    }

    /// Create a calculator from application configuration.
    pub fn from_config(engine: E, config: &AppConfig) -> Self {
        Self::new(engine, config.model_path.clone(), config.encoding_mode)
    }

    #[must_use]
    pub fn invoker(&self) -> &InferenceInvoker<E> {
        &self.invoker
    }

    #[must_use]
    pub fn encoding_mode(&self) -> EncodingMode {
        self.encoder.mode()
    }

    #[must_use]
    pub fn model_state(&self) -> InvokerState {
        self.invoker.state()
    }

    /// Validate and encode a record. Synchronous; no model access.
    ///
    /// # Errors
    /// Returns `UpriskError::Validation` listing every invalid field, or
    /// `UpriskError::Encoding` in strict mode.
    pub fn prepare(&self, record: &FormRecord) -> Result<TensorMap, UpriskError> {
        let validated: ValidatedRecord = validate(record)?;
        Ok(self.encoder.encode_validated(&validated)?)
    }

    /// Load the model if needed.
    ///
    /// # Errors
    /// Returns `UpriskError::ModelLoad` if the graph cannot be loaded or does not
    /// match the encoder.
    pub fn ensure_loaded(&self) -> Result<Arc<dyn InferenceSession>, UpriskError> {
        Ok(self.invoker.ensure_loaded()?)
    }

    /// Run the model on already-encoded inputs.
    ///
    /// # Errors
    /// Returns `UpriskError::ModelLoad` or `UpriskError::Inference`.
    pub fn predict_encoded(&self, inputs: &TensorMap) -> Result<Prediction, UpriskError> {
        self.ensure_loaded()?;
        let probability = self.invoker.run(inputs)?;
        let prediction = Prediction::new(probability);
        tracing::info!("Prediction complete: {}", prediction.display_line());
        Ok(prediction)
    }

    /// Full pipeline for one form submission.
    ///
    /// # Errors
    /// Returns the first failing layer's error.
    pub fn predict(&self, record: &FormRecord) -> Result<Prediction, UpriskError> {
        let inputs = self.prepare(record)?;
        self.predict_encoded(&inputs)
    }

    /// Allow the next call to retry a failed model load.
    pub fn reset_failed_load(&self) -> bool {
        self.invoker.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LogisticEngine;
    use crate::application::invoker::tests::MockEngine;
    use crate::application::ModelLoadError;
    use crate::domain::{input_signature, sample_record, InvalidReason};
    use std::path::Path;
    use std::sync::atomic::Ordering;

    const BUNDLED_MODEL: &str = "models/uprisk_logreg.json";

    #[test]
    fn test_mocked_engine_end_to_end() {
        let calculator = RiskCalculator::new(
            MockEngine::returning(vec![0.73, 0.27]),
            "model.json",
            EncodingMode::Lenient,
        );

        let prediction = calculator.predict(&sample_record()).expect("predict");
        assert_eq!(prediction.percent(), "27%");
        assert_eq!(prediction.display_line(), "Predicted Risk: 27%");
    }

    #[test]
    fn test_validation_failure_skips_model() {
        let engine = MockEngine::returning(vec![0.73, 0.27]);
        let loads = Arc::clone(&engine.loads);
        let calculator = RiskCalculator::new(engine, "model.json", EncodingMode::Lenient);

        let mut record = sample_record();
        record.set("weight_pre", "heavy").expect("known key");

        match calculator.predict(&record) {
            Err(UpriskError::Validation(errors)) => {
                assert_eq!(errors.reason_for("weight_pre"), Some(InvalidReason::NotNumeric));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(calculator.model_state(), InvokerState::Uninitialized);
    }

    #[test]
    fn test_out_of_range_height_is_rejected_before_model() {
        let engine = MockEngine::returning(vec![0.73, 0.27]);
        let loads = Arc::clone(&engine.loads);
        let calculator = RiskCalculator::new(engine, "model.json", EncodingMode::Strict);

        let mut record = sample_record();
        record.set("height_pre", "1e39").expect("known key");

        match calculator.predict(&record) {
            Err(UpriskError::Validation(errors)) => {
                assert_eq!(errors.reason_for("height_pre"), Some(InvalidReason::NotFinite));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_option() {
        let calculator = RiskCalculator::new(
            MockEngine::returning(vec![0.5, 0.5]),
            "model.json",
            EncodingMode::Strict,
        );
        let mut record = sample_record();
        record.set("eos_type", "Other").expect("known key");

        assert!(matches!(
            calculator.predict(&record),
            Err(UpriskError::Encoding(_))
        ));
    }

    #[test]
    fn test_load_failure_surfaces_and_is_recoverable() {
        let engine = MockEngine::returning(vec![0.5, 0.5]);
        engine.fail.store(true, Ordering::SeqCst);
        let fail = Arc::clone(&engine.fail);
        let calculator = RiskCalculator::new(engine, "model.json", EncodingMode::Lenient);

        assert!(matches!(
            calculator.predict(&sample_record()),
            Err(UpriskError::ModelLoad(ModelLoadError::Engine(_)))
        ));

        fail.store(false, Ordering::SeqCst);
        assert!(calculator.reset_failed_load());
        assert!(calculator.predict(&sample_record()).is_ok());
    }

    #[test]
    fn test_bundled_model_matches_schema() {
        let calculator = RiskCalculator::new(
            LogisticEngine::new(),
            Path::new(BUNDLED_MODEL),
            EncodingMode::Lenient,
        );
        let session = calculator.ensure_loaded().expect("bundled model loads");
        assert_eq!(session.input_names(), input_signature().as_slice());

        let prediction = calculator.predict(&sample_record()).expect("predict");
        assert!((0.0..=1.0).contains(&prediction.probability));
        assert_eq!(prediction.display_line(), "Predicted Risk: 27%");
        assert!(calculator.invoker().fingerprint().is_some());
    }
}
