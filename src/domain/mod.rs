//! Domain layer: field schema, form values, validation, encoding, results.
//!
//! Pure Rust types with no I/O. Everything the model contract depends on lives
//! here: the schema decides the encoder's slot names, and the encoder's slot names
//! must equal the model's declared inputs.

mod encoding;
mod prediction;
mod record;
mod schema;
mod validation;

pub use encoding::{
    field_slot_names, input_signature, option_slot_name, sanitize_identifier, EncodingError,
    EncodingMode, FeatureEncoder, Tensor, TensorMap,
};
pub use prediction::{display_line, present, Prediction, RESULT_LABEL};
pub use record::{FieldValue, FormRecord};
pub use schema::{
    describe, grouped_keys, FieldDescriptor, FieldKind, FieldSchema, SchemaError, FIELD_COUNT,
};
pub use validation::{validate, InvalidReason, ValidatedRecord, ValidationError, ValidationErrors};

#[cfg(test)]
pub(crate) use validation::tests::sample_record;
