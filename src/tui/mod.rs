//! TUI module: Terminal User Interface using Ratatui.
//!
//! One screen: the grouped risk factor form, the result line, and key hints.
//! Model work runs on a background worker so the form stays responsive.

mod app;
mod styles;
mod ui;
mod worker;

pub use app::App;
pub use styles::MedicalTheme;
pub use worker::{InferenceProgress, InferenceWorker, InferenceWorkerHandle};
