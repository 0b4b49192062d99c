//! Feature encoding: form record -> named model input tensors.
//!
//! Slot names are the model's input signature:
//! - continuous field: the key verbatim;
//! - categorical field: `{key}_{option}` for each option in declared order, with
//!   every character outside `[A-Za-z0-9_]` replaced by `_`.
//!
//! A slot set that differs from the trained model's does not raise an error in the
//! model itself; it yields a wrong probability. `input_signature` is therefore checked
//! against the model's declared inputs when the model is loaded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::{FieldValue, FormRecord};
use super::schema::{FieldDescriptor, FieldKind, FieldSchema};
use super::validation::ValidatedRecord;

/// A dense `f32` tensor.
///
/// Every model input is a scalar wrapped as a `[1, 1]` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub dims: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    /// A single value with shape `[1, 1]`.
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self {
            dims: vec![1, 1],
            data: vec![value],
        }
    }

    /// A row vector with shape `[1, n]`.
    #[must_use]
    pub fn row(data: Vec<f32>) -> Self {
        Self {
            dims: vec![1, data.len()],
            data,
        }
    }

    /// The value of a single-element tensor.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f32> {
        if self.data.len() == 1 && self.dims.iter().product::<usize>() == 1 {
            Some(self.data[0])
        } else {
            None
        }
    }
}

/// Named tensors keyed by slot name.
pub type TensorMap = BTreeMap<String, Tensor>;

/// How the encoder treats values it cannot map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Unset or unparsable numbers become 0, unknown options become all-zero indicators.
    #[default]
    Lenient,
    /// Those cases are errors.
    Strict,
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for EncodingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown encoding mode '{other}' (expected lenient or strict)")),
        }
    }
}

/// Raised only in `EncodingMode::Strict`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("Field {0} has no numeric value")]
    UnsetValue(&'static str),

    #[error("Field {key} value does not match any declared option")]
    UnmatchedOption { key: &'static str },
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Slot name for one categorical option.
#[must_use]
pub fn option_slot_name(key: &str, option: &str) -> String {
    format!("{key}_{}", sanitize_identifier(option))
}

/// Slot names produced for one field, in declared option order.
#[must_use]
pub fn field_slot_names(field: &FieldDescriptor) -> Vec<String> {
    match field.kind {
        FieldKind::Continuous { .. } => vec![field.key.to_string()],
        FieldKind::Categorical { options } => options
            .iter()
            .map(|option| option_slot_name(field.key, option))
            .collect(),
    }
}

/// Every slot name the encoder emits, in schema order.
#[must_use]
pub fn input_signature() -> Vec<String> {
    FieldSchema::global()
        .fields()
        .flat_map(field_slot_names)
        .collect()
}

/// Maps form records to model input tensors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder {
    mode: EncodingMode,
}

impl FeatureEncoder {
    #[must_use]
    pub fn new(mode: EncodingMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub fn mode(&self) -> EncodingMode {
        self.mode
    }

    /// Encode a record that passed validation.
    ///
    /// # Errors
    /// Strict mode only: a categorical value outside its option set.
    pub fn encode_validated(&self, record: &ValidatedRecord) -> Result<TensorMap, EncodingError> {
        self.encode(record.as_record())
    }

    /// Encode any record.
    ///
    /// Pure: the same record always yields the same map.
    ///
    /// # Errors
    /// Strict mode only: an unset, non-numeric or out-of-range continuous value, or a
    /// categorical value outside its option set.
    pub fn encode(&self, record: &FormRecord) -> Result<TensorMap, EncodingError> {
        let mut tensors = TensorMap::new();

        for field in FieldSchema::global().fields() {
            let value = record.get(field.key);
            match field.kind {
                FieldKind::Continuous { .. } => {
                    let number = self.continuous_value(field.key, value)?;
                    tensors.insert(field.key.to_string(), Tensor::scalar(number));
                }
                FieldKind::Categorical { options } => {
                    let selected = value.as_text();
                    let matched = selected.and_then(|v| options.iter().position(|o| *o == v));
                    if matched.is_none() {
                        self.unmatched_option(field.key, value)?;
                    }
                    for (index, option) in options.iter().enumerate() {
                        let indicator = if matched == Some(index) { 1.0 } else { 0.0 };
                        tensors.insert(option_slot_name(field.key, option), Tensor::scalar(indicator));
                    }
                }
            }
        }

        tracing::debug!(slots = tensors.len(), mode = %self.mode, "Encoded form record");
        Ok(tensors)
    }

    // Slots are f32; a finite f64 beyond f32 range would narrow to an infinity.
    fn continuous_value(&self, key: &'static str, value: &FieldValue) -> Result<f32, EncodingError> {
        match value.as_number().map(|v| v as f32).filter(|v| v.is_finite()) {
            Some(v) => Ok(v),
            None => match self.mode {
                EncodingMode::Strict => Err(EncodingError::UnsetValue(key)),
                EncodingMode::Lenient => {
                    tracing::warn!(field = key, "No numeric value, encoding as 0");
                    Ok(0.0)
                }
            },
        }
    }

    fn unmatched_option(&self, key: &'static str, value: &FieldValue) -> Result<(), EncodingError> {
        match self.mode {
            EncodingMode::Strict => Err(EncodingError::UnmatchedOption { key }),
            EncodingMode::Lenient => {
                if !value.is_unset() {
                    tracing::warn!(field = key, "Value matches no option, encoding all indicators as 0");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::tests::sample_record;
    use crate::domain::validation::validate;

    fn slot(map: &TensorMap, name: &str) -> f32 {
        map.get(name)
            .and_then(Tensor::as_scalar)
            .unwrap_or_else(|| panic!("missing slot {name}"))
    }

    fn lenient() -> FeatureEncoder {
        FeatureEncoder::new(EncodingMode::Lenient)
    }

    #[test]
    fn test_signature_has_expected_slots() {
        let signature = input_signature();
        assert_eq!(signature.len(), 22);
        assert_eq!(signature[0], "age_at_insertion");
        assert!(signature.contains(&"amb_status_preop_Non_ambulatory".to_string()));
        assert!(signature.contains(&"construct_type_initial_VEPTR".to_string()));

        let encoded = lenient().encode(&sample_record()).expect("lenient never fails");
        let keys: Vec<String> = encoded.keys().cloned().collect();
        let mut sorted_signature = signature.clone();
        sorted_signature.sort();
        assert_eq!(keys, sorted_signature);
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Non-ambulatory"), "Non_ambulatory");
        assert_eq!(sanitize_identifier("a b/c"), "a_b_c");
        assert_eq!(sanitize_identifier("MCGR"), "MCGR");
    }

    #[test]
    fn test_each_option_sets_exactly_one_indicator() {
        let encoder = lenient();
        for field in FieldSchema::global().fields().filter(|f| !f.is_continuous()) {
            let options = field.options();
            for (selected, option) in options.iter().enumerate() {
                let mut record = sample_record();
                record.set(field.key, *option).expect("known key");
                let encoded = encoder.encode(&record).expect("lenient never fails");

                for (index, other) in options.iter().enumerate() {
                    let expected = if index == selected { 1.0 } else { 0.0 };
                    assert_eq!(
                        slot(&encoded, &option_slot_name(field.key, other)),
                        expected,
                        "{} = {option}",
                        field.key
                    );
                }
            }
        }
    }

    #[test]
    fn test_eos_type_idiopathic() {
        let mut record = sample_record();
        record.set("eos_type", "Idiopathic").expect("known key");
        let encoded = lenient().encode(&record).expect("lenient never fails");

        assert_eq!(slot(&encoded, "eos_type_Congenital"), 0.0);
        assert_eq!(slot(&encoded, "eos_type_Idiopathic"), 1.0);
        assert_eq!(slot(&encoded, "eos_type_Neuromuscular"), 0.0);
        assert_eq!(slot(&encoded, "eos_type_Syndromic"), 0.0);
    }

    #[test]
    fn test_unknown_option_encodes_all_zero() {
        let mut record = sample_record();
        record.set("construct_type_initial", "Shilla").expect("known key");
        let encoded = lenient().encode(&record).expect("lenient never fails");

        for option in ["MCGR", "TGR", "VEPTR"] {
            assert_eq!(slot(&encoded, &format!("construct_type_initial_{option}")), 0.0);
        }
        // Other fields are untouched.
        assert_eq!(slot(&encoded, "eos_type_Congenital"), 1.0);
    }

    #[test]
    fn test_unset_continuous_encodes_zero() {
        let mut record = sample_record();
        record.unset("kyphosis_pre").expect("known key");
        record.set("height_pre", "abc").expect("known key");
        let encoded = lenient().encode(&record).expect("lenient never fails");

        assert_eq!(slot(&encoded, "kyphosis_pre"), 0.0);
        assert_eq!(slot(&encoded, "height_pre"), 0.0);
    }

    #[test]
    fn test_strict_mode_rejects_degraded_values() {
        let strict = FeatureEncoder::new(EncodingMode::Strict);

        let mut record = sample_record();
        record.set("inferior_attach_initial", "Rib").expect("known key");
        assert_eq!(
            strict.encode(&record),
            Err(EncodingError::UnmatchedOption {
                key: "inferior_attach_initial"
            })
        );

        let mut record = sample_record();
        record.unset("weight_pre").expect("known key");
        assert_eq!(
            strict.encode(&record),
            Err(EncodingError::UnsetValue("weight_pre"))
        );

        let mut record = sample_record();
        record.set("height_pre", "1e39").expect("known key");
        assert_eq!(
            strict.encode(&record),
            Err(EncodingError::UnsetValue("height_pre"))
        );

        assert!(strict.encode(&sample_record()).is_ok());
    }

    #[test]
    fn test_out_of_range_number_never_encodes_infinite() {
        let mut record = sample_record();
        record.set("height_pre", "1e39").expect("known key");
        let encoded = lenient().encode(&record).expect("lenient never fails");

        assert_eq!(slot(&encoded, "height_pre"), 0.0);
        assert!(encoded.values().all(|t| t.data.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_encode_is_pure() {
        let record = sample_record();
        let encoder = lenient();
        let first = encoder.encode(&record).expect("lenient never fails");
        let second = encoder.encode(&record).expect("lenient never fails");
        assert_eq!(first, second);
        assert_eq!(record, sample_record());
    }

    #[test]
    fn test_end_to_end_sample_encoding() {
        let validated = validate(&sample_record()).expect("valid");
        let encoded = lenient().encode_validated(&validated).expect("lenient never fails");

        assert_eq!(slot(&encoded, "age_at_insertion"), 10.0);
        assert_eq!(slot(&encoded, "height_pre"), 120.0);
        assert_eq!(slot(&encoded, "weight_pre"), 25.0);
        assert_eq!(slot(&encoded, "major_cobb_angle_pre"), 60.0);
        assert_eq!(slot(&encoded, "minor_cobb_angle_pre"), 30.0);
        assert_eq!(slot(&encoded, "kyphosis_pre"), 40.0);
        assert_eq!(slot(&encoded, "num_superior_anchors_initial"), 2.0);

        assert_eq!(slot(&encoded, "construct_type_initial_MCGR"), 1.0);
        assert_eq!(slot(&encoded, "construct_type_initial_TGR"), 0.0);
        assert_eq!(slot(&encoded, "construct_type_initial_VEPTR"), 0.0);

        assert_eq!(slot(&encoded, "eos_type_Congenital"), 1.0);
        assert_eq!(slot(&encoded, "eos_type_Idiopathic"), 0.0);
        assert_eq!(slot(&encoded, "eos_type_Neuromuscular"), 0.0);
        assert_eq!(slot(&encoded, "eos_type_Syndromic"), 0.0);

        assert_eq!(slot(&encoded, "amb_status_preop_Ambulatory"), 1.0);
        assert_eq!(slot(&encoded, "amb_status_preop_Non_ambulatory"), 0.0);
        assert_eq!(slot(&encoded, "construct_side_initial_Bilateral"), 1.0);
        assert_eq!(slot(&encoded, "construct_side_initial_Unilateral"), 0.0);
        assert_eq!(slot(&encoded, "superior_attach_initial_Spine"), 1.0);
        assert_eq!(slot(&encoded, "superior_attach_initial_Rib"), 0.0);
        assert_eq!(slot(&encoded, "inferior_attach_initial_Pelvis"), 1.0);
        assert_eq!(slot(&encoded, "inferior_attach_initial_Spine"), 0.0);

        for tensor in encoded.values() {
            assert_eq!(tensor.dims, vec![1, 1]);
        }
    }

    #[test]
    fn test_encoding_mode_parse() {
        assert_eq!("STRICT".parse::<EncodingMode>(), Ok(EncodingMode::Strict));
        assert_eq!(" lenient ".parse::<EncodingMode>(), Ok(EncodingMode::Lenient));
        assert!("loose".parse::<EncodingMode>().is_err());
    }
}
