//! # UPRisk
//!
//! Local risk calculator for unplanned return to the operating room (UPROR) after
//! insertion of a growth-friendly spinal construct in early-onset scoliosis.
//!
//! This crate provides:
//! - A static field schema and display grouping for the 13 model inputs
//! - Validation and one-hot feature encoding matching the trained model's signature
//! - A memoized model loader and runner over a pluggable inference engine
//! - Terminal UI for local-only use
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Schema, form values, validation, encoding, prediction formatting
//! - `ports`: Trait definitions for the inference runtime
//! - `adapters`: Concrete implementations (JSON logistic-regression graphs)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment-driven settings
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use domain::{FormRecord, Prediction};

/// Result type for UPRisk operations
pub type Result<T> = std::result::Result<T, UpriskError>;

/// Main error type for UPRisk
#[derive(Debug, thiserror::Error)]
pub enum UpriskError {
    #[error("Schema error: {0}")]
    Schema(#[from] domain::SchemaError),

    #[error("Invalid form data: {0}")]
    Validation(#[from] domain::ValidationErrors),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] domain::EncodingError),

    #[error("Model could not be loaded: {0}")]
    ModelLoad(#[from] application::ModelLoadError),

    #[error("Inference failed: {0}")]
    Inference(#[from] application::InferenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
