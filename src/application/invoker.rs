//! Inference invoker: loads the model graph once and runs it on encoded inputs.
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> Loading -> Ready <-> Running
//!                     \
//!                      -> Failed --reset()--> Uninitialized
//! ```
//!
//! The load is memoized. Callers arriving while a load is in flight wait for it
//! instead of starting a second one. A failed load is cached and not retried until
//! `reset()` is called.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::domain::{input_signature, TensorMap};
use crate::ports::{
    EngineError, InferenceEngine, InferenceSession, POSITIVE_CLASS_INDEX, PROBABILITIES_OUTPUT,
};

/// Errors raised while loading the model graph.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(
        "Model inputs do not match the encoder (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    SignatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Model does not declare a 'probabilities' output")]
    MissingProbabilitiesOutput,

    #[error("Model load failed earlier and has not been reset: {0}")]
    PreviouslyFailed(String),
}

/// Errors raised while running the loaded graph.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model is not loaded")]
    NotLoaded,

    #[error("Model engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Model output 'probabilities' is missing")]
    MissingOutput,

    #[error("Model output 'probabilities' has {len} element(s), expected at least 2")]
    ShortOutput { len: usize },

    #[error("Model returned a non-finite probability")]
    NonFiniteProbability,
}

/// Observable invoker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    Uninitialized,
    Loading,
    Ready,
    Running,
    Failed,
}

impl std::fmt::Display for InvokerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "NOT LOADED"),
            Self::Loading => write!(f, "LOADING"),
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

enum LoadSlot {
    Uninitialized,
    Loading,
    Ready(Arc<dyn InferenceSession>),
    Failed(String),
}

/// Check a session's declared interface against the encoder's slot names.
///
/// # Errors
/// Returns `SignatureMismatch` listing every missing and unexpected slot, or
/// `MissingProbabilitiesOutput`.
pub fn check_signature(session: &dyn InferenceSession) -> Result<(), ModelLoadError> {
    let expected: BTreeSet<String> = input_signature().into_iter().collect();
    let declared: BTreeSet<String> = session.input_names().iter().cloned().collect();

    let missing: Vec<String> = expected.difference(&declared).cloned().collect();
    let unexpected: Vec<String> = declared.difference(&expected).cloned().collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(ModelLoadError::SignatureMismatch {
            missing,
            unexpected,
        });
    }

    if !session
        .output_names()
        .iter()
        .any(|name| name == PROBABILITIES_OUTPUT)
    {
        return Err(ModelLoadError::MissingProbabilitiesOutput);
    }
    Ok(())
}

/// Read the positive-class probability from a graph's outputs.
///
/// # Errors
/// Returns `InferenceError` if the output is missing, too short or non-finite.
pub fn positive_probability(outputs: &TensorMap) -> Result<f64, InferenceError> {
    let probabilities = outputs
        .get(PROBABILITIES_OUTPUT)
        .ok_or(InferenceError::MissingOutput)?;
    let value = probabilities
        .data
        .get(POSITIVE_CLASS_INDEX)
        .copied()
        .ok_or(InferenceError::ShortOutput {
            len: probabilities.data.len(),
        })?;

    let probability = f64::from(value);
    if probability.is_finite() {
        Ok(probability)
    } else {
        Err(InferenceError::NonFiniteProbability)
    }
}

/// Marks the slot failed if a load unwinds before recording its outcome.
struct LoadingGuard<'a, E: InferenceEngine> {
    invoker: &'a InferenceInvoker<E>,
    armed: bool,
}

impl<E: InferenceEngine> Drop for LoadingGuard<'_, E> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.invoker.lock_slot();
            *slot = LoadSlot::Failed("model load panicked".into());
            self.invoker.loaded.notify_all();
        }
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loads the configured graph once and runs it on demand.
pub struct InferenceInvoker<E: InferenceEngine> {
    engine: E,
    location: PathBuf,
    slot: Mutex<LoadSlot>,
    loaded: Condvar,
    in_flight: AtomicUsize,
}

impl<E: InferenceEngine> InferenceInvoker<E> {
    /// Create an invoker for the graph at `location`. Nothing is loaded yet.
    pub fn new(engine: E, location: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            location: location.into(),
            slot: Mutex::new(LoadSlot::Uninitialized),
            loaded: Condvar::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Configured model location.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    // The slot is only written with complete values, so a poisoned lock still
    // holds a consistent state.
    fn lock_slot(&self) -> MutexGuard<'_, LoadSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> InvokerState {
        match &*self.lock_slot() {
            LoadSlot::Uninitialized => InvokerState::Uninitialized,
            LoadSlot::Loading => InvokerState::Loading,
            LoadSlot::Failed(_) => InvokerState::Failed,
            LoadSlot::Ready(_) if self.in_flight.load(Ordering::SeqCst) > 0 => {
                InvokerState::Running
            }
            LoadSlot::Ready(_) => InvokerState::Ready,
        }
    }

    /// Fingerprint of the loaded graph, if loaded and the engine provides one.
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        match &*self.lock_slot() {
            LoadSlot::Ready(session) => session.fingerprint().map(str::to_string),
            _ => None,
        }
    }

    /// Load the graph unless it is already loaded.
    ///
    /// Concurrent callers share a single load.
    ///
    /// # Errors
    /// Returns `ModelLoadError` if loading fails now or failed earlier without a reset.
    pub fn ensure_loaded(&self) -> Result<Arc<dyn InferenceSession>, ModelLoadError> {
        let mut slot = self.lock_slot();
        loop {
            match &*slot {
                LoadSlot::Ready(session) => return Ok(Arc::clone(session)),
                LoadSlot::Failed(message) => {
                    return Err(ModelLoadError::PreviouslyFailed(message.clone()))
                }
                LoadSlot::Uninitialized => break,
                LoadSlot::Loading => {}
            }
            slot = self
                .loaded
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *slot = LoadSlot::Loading;
        drop(slot);

        let mut guard = LoadingGuard {
            invoker: self,
            armed: true,
        };

        tracing::info!("Loading model graph from {:?}", self.location);
        let outcome = self.load_checked();

        let mut slot = self.lock_slot();
        match &outcome {
            Ok(session) => {
                *slot = LoadSlot::Ready(Arc::clone(session));
                tracing::info!(
                    "Model ready ({} inputs, fingerprint={})",
                    session.input_names().len(),
                    session.fingerprint().unwrap_or("n/a")
                );
            }
            Err(e) => {
                tracing::error!("Model load failed: {}", e);
                *slot = LoadSlot::Failed(e.to_string());
            }
        }
        guard.armed = false;
        drop(slot);
        self.loaded.notify_all();

        outcome
    }

    fn load_checked(&self) -> Result<Arc<dyn InferenceSession>, ModelLoadError> {
        let session = self.engine.load(&self.location)?;
        check_signature(session.as_ref())?;
        Ok(session)
    }

    /// Return a failed invoker to `Uninitialized` so the next call loads again.
    ///
    /// Returns `true` if the state changed. A loaded graph is kept.
    pub fn reset(&self) -> bool {
        let mut slot = self.lock_slot();
        if matches!(*slot, LoadSlot::Failed(_)) {
            tracing::info!("Resetting failed model load");
            *slot = LoadSlot::Uninitialized;
            true
        } else {
            false
        }
    }

    /// Run the loaded graph and return the positive-class probability.
    ///
    /// # Errors
    /// Returns `InferenceError::NotLoaded` before a successful `ensure_loaded`, or
    /// another `InferenceError` if the run fails or the output is malformed.
    pub fn run(&self, inputs: &TensorMap) -> Result<f64, InferenceError> {
        let session = match &*self.lock_slot() {
            LoadSlot::Ready(session) => Arc::clone(session),
            _ => return Err(InferenceError::NotLoaded),
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _running = RunningGuard(&self.in_flight);

        tracing::debug!("Running inference on {} input slots", inputs.len());
        let outputs = session.run(inputs).map_err(|e| {
            tracing::error!("Inference failed: {}", e);
            InferenceError::from(e)
        })?;
        positive_probability(&outputs)
    }
}
