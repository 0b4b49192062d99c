//! Background inference worker.
//!
//! Model loading and the model run happen on a worker thread so the TUI main
//! loop keeps drawing while they are in progress.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::application::{InvokerState, RiskCalculator};
use crate::domain::{Prediction, TensorMap};
use crate::ports::InferenceEngine;

/// Progress updates from the inference worker.
#[derive(Debug, Clone)]
pub enum InferenceProgress {
    /// Model is not loaded yet; loading started
    Loading,
    /// Model ready, running on the submitted inputs
    Running,
    /// Run complete
    Complete(Prediction),
    /// Load or run failed
    Error(String),
}

/// Handle to a running inference worker.
pub struct InferenceWorkerHandle {
    /// Receiver for progress updates
    pub progress_rx: Receiver<InferenceProgress>,
    _handle: JoinHandle<()>,
}

impl InferenceWorkerHandle {
    /// Try to receive the next progress update (non-blocking).
    ///
    /// A worker that stopped without a final update (it panicked) reports as an
    /// `Error`, so the caller never waits on a dead channel.
    #[must_use]
    pub fn try_recv(&self) -> Option<InferenceProgress> {
        match self.progress_rx.try_recv() {
            Ok(progress) => Some(progress),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::error!("Inference worker stopped without reporting a result");
                Some(InferenceProgress::Error(
                    "inference worker stopped unexpectedly".to_string(),
                ))
            }
        }
    }
}

/// Inference worker that runs the model in the background.
pub struct InferenceWorker;

impl InferenceWorker {
    /// Spawn a background run over already-encoded inputs.
    pub fn spawn<E>(calculator: Arc<RiskCalculator<E>>, inputs: TensorMap) -> InferenceWorkerHandle
    where
        E: InferenceEngine + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_with_progress(&calculator, &inputs, &tx);
        });

        InferenceWorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    fn run_with_progress<E: InferenceEngine>(
        calculator: &RiskCalculator<E>,
        inputs: &TensorMap,
        tx: &Sender<InferenceProgress>,
    ) {
        if calculator.model_state() != InvokerState::Ready {
            let _ = tx.send(InferenceProgress::Loading);
        }
        if let Err(e) = calculator.ensure_loaded() {
            tracing::error!("Model load failed: {}", e);
            let _ = tx.send(InferenceProgress::Error(e.to_string()));
            return;
        }

        let _ = tx.send(InferenceProgress::Running);

        match calculator.predict_encoded(inputs) {
            Ok(prediction) => {
                let _ = tx.send(InferenceProgress::Complete(prediction));
            }
            Err(e) => {
                tracing::error!("Inference failed: {}", e);
                let _ = tx.send(InferenceProgress::Error(e.to_string()));
            }
        }
    }
}
