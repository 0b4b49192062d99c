//! In-progress form values.

use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroize;

use super::schema::{FieldSchema, SchemaError};

/// Value held by one form slot.
#[derive(Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Unset,
    /// Already-numeric input.
    Number(f64),
    /// Raw typed text (continuous fields) or the selected option (categorical fields).
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Numeric interpretation of the value, if any.
    ///
    /// Text is trimmed before parsing. Non-finite results are returned as-is;
    /// rejecting them is the validator's job.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Unset => None,
        }
    }

    /// Text content, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

// Patient values stay out of logs; only the shape is shown.
impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "Unset"),
            Self::Number(_) => write!(f, "Number(..)"),
            Self::Text(_) => write!(f, "Text(..)"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl Zeroize for FieldValue {
    fn zeroize(&mut self) {
        match self {
            Self::Number(v) => v.zeroize(),
            Self::Text(s) => s.zeroize(),
            Self::Unset => {}
        }
        *self = Self::Unset;
    }
}

/// One slot per schema key.
///
/// Created with every field unset, edited field by field, consumed at submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FormRecord {
    values: BTreeMap<&'static str, FieldValue>,
}

impl Default for FormRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl FormRecord {
    /// Create a record with every schema field unset.
    #[must_use]
    pub fn new() -> Self {
        let values = FieldSchema::global()
            .keys()
            .map(|k| (k, FieldValue::Unset))
            .collect();
        Self { values }
    }

    /// Build a record from key/value pairs. Unlisted fields stay unset.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` for keys outside the schema.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.set(key.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Set one field.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` if the key is not part of the schema.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) -> Result<(), SchemaError> {
        let field = FieldSchema::global().describe(key)?;
        self.values.insert(field.key, value.into());
        Ok(())
    }

    /// Current value of a field. Unknown keys read as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> &FieldValue {
        static UNSET: FieldValue = FieldValue::Unset;
        self.values.get(key).unwrap_or(&UNSET)
    }

    /// Mark one field as unset.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` if the key is not part of the schema.
    pub fn unset(&mut self, key: &str) -> Result<(), SchemaError> {
        self.set(key, FieldValue::Unset)
    }

    /// Iterate over (key, value) in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Number of fields still unset.
    #[must_use]
    pub fn unset_count(&self) -> usize {
        self.values.values().filter(|v| v.is_unset()).count()
    }

    /// Wipe every value and return to the initial all-unset state.
    pub fn reset(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}
