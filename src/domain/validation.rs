//! Submission gate for form records.
//!
//! Rules:
//! - every schema field must be set;
//! - continuous fields must hold a finite decimal number;
//! - categorical fields must hold a non-empty string.
//!
//! Option membership is not checked here. An unknown option reaches the encoder,
//! which zero-fills it (lenient) or rejects it (strict).

use std::fmt;

use super::record::{FieldValue, FormRecord};
use super::schema::{FieldKind, FieldSchema};

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No value entered.
    Unset,
    /// Continuous field holding text that does not parse as a number.
    NotNumeric,
    /// Continuous field holding NaN, an infinity, or a magnitude no model slot can hold.
    NotFinite,
    /// Categorical field holding an empty string or a bare number.
    EmptyChoice,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "required"),
            Self::NotNumeric => write!(f, "must be a number"),
            Self::NotFinite => write!(f, "must be a finite number"),
            Self::EmptyChoice => write!(f, "select an option"),
        }
    }
}

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingOrInvalid {
        key: &'static str,
        reason: InvalidReason,
    },
}

impl ValidationError {
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::MissingOrInvalid { key, .. } => *key,
        }
    }

    #[must_use]
    pub fn reason(&self) -> InvalidReason {
        match self {
            Self::MissingOrInvalid { reason, .. } => *reason,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOrInvalid { key, reason } => write!(f, "{key}: {reason}"),
        }
    }
}

/// Every failed field of a record, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) missing or invalid: {}", .0.len(), join_keys(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn join_keys(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::key)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    /// Offending keys, in schema order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(ValidationError::key)
    }

    /// Reason for a given key, if that key failed.
    #[must_use]
    pub fn reason_for(&self, key: &str) -> Option<InvalidReason> {
        self.0.iter().find(|e| e.key() == key).map(ValidationError::reason)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A record that passed `validate`.
///
/// Continuous fields are normalized to `FieldValue::Number`. Only `validate`
/// constructs this type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    record: FormRecord,
}

impl ValidatedRecord {
    #[must_use]
    pub fn as_record(&self) -> &FormRecord {
        &self.record
    }

    #[must_use]
    pub fn into_inner(self) -> FormRecord {
        self.record
    }
}

/// Finite and within the range of the model's `f32` input slots.
fn representable(v: f64) -> bool {
    v.is_finite() && v.abs() <= f64::from(f32::MAX)
}

fn check_field(kind: &FieldKind, value: &FieldValue) -> Result<FieldValue, InvalidReason> {
    match (kind, value) {
        (_, FieldValue::Unset) => Err(InvalidReason::Unset),
        (FieldKind::Continuous { .. }, FieldValue::Number(v)) => {
            if representable(*v) {
                Ok(FieldValue::Number(*v))
            } else {
                Err(InvalidReason::NotFinite)
            }
        }
        (FieldKind::Continuous { .. }, FieldValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(InvalidReason::Unset);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if representable(v) => Ok(FieldValue::Number(v)),
                Ok(_) => Err(InvalidReason::NotFinite),
                Err(_) => Err(InvalidReason::NotNumeric),
            }
        }
        (FieldKind::Categorical { .. }, FieldValue::Text(s)) => {
            if s.is_empty() {
                Err(InvalidReason::EmptyChoice)
            } else {
                Ok(value.clone())
            }
        }
        (FieldKind::Categorical { .. }, FieldValue::Number(_)) => Err(InvalidReason::EmptyChoice),
    }
}

/// Check that every field is present and well-formed.
///
/// # Errors
/// Returns every offending field, not just the first.
pub fn validate(record: &FormRecord) -> Result<ValidatedRecord, ValidationErrors> {
    let schema = FieldSchema::global();
    let mut normalized = FormRecord::new();
    let mut errors = Vec::new();

    for field in schema.fields() {
        match check_field(&field.kind, record.get(field.key)) {
            Ok(value) => {
                // Keys come from the schema, so this cannot fail.
                let _ = normalized.set(field.key, value);
            }
            Err(reason) => errors.push(ValidationError::MissingOrInvalid {
                key: field.key,
                reason,
            }),
        }
    }

    if errors.is_empty() {
        Ok(ValidatedRecord { record: normalized })
    } else {
        tracing::debug!(failed = errors.len(), "Form validation failed");
        Err(ValidationErrors(errors))
    }
}
