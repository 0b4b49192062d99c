//! Field schema for the UPROR risk model.
//!
//! The schema is the single registry consulted by validation, encoding and the
//! form view. It is built once on first use and never mutated afterwards.
//!
//! Categorical option order is the one-hot index order used at training time
//! (the training encoder sorted categories alphabetically). Reordering options
//! silently changes predictions.

use std::sync::OnceLock;

use serde::Serialize;

/// Errors raised by schema lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Kind of a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Free numeric input. `unit` is display-only.
    Continuous { unit: &'static str },
    /// Closed choice. Options are distinct, non-empty and ordered.
    Categorical { options: &'static [&'static str] },
}

/// Static description of one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    const fn continuous(key: &'static str, label: &'static str, unit: &'static str) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Continuous { unit },
        }
    }

    const fn categorical(
        key: &'static str,
        label: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Categorical { options },
        }
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, FieldKind::Continuous { .. })
    }

    /// Options of a categorical field; empty for continuous fields.
    #[must_use]
    pub fn options(&self) -> &'static [&'static str] {
        match self.kind {
            FieldKind::Categorical { options } => options,
            FieldKind::Continuous { .. } => &[],
        }
    }

    /// Unit label of a continuous field.
    #[must_use]
    pub fn unit(&self) -> Option<&'static str> {
        match self.kind {
            FieldKind::Continuous { unit } => Some(unit),
            FieldKind::Categorical { .. } => None,
        }
    }
}

/// Number of fields the model was trained on.
pub const FIELD_COUNT: usize = 13;

static FIELDS: [FieldDescriptor; FIELD_COUNT] = [
    FieldDescriptor::continuous("age_at_insertion", "Age at Insertion", "years"),
    FieldDescriptor::continuous("height_pre", "Height", "cm"),
    FieldDescriptor::continuous("weight_pre", "Weight", "kg"),
    FieldDescriptor::categorical(
        "eos_type",
        "EOS Etiology",
        &["Congenital", "Idiopathic", "Neuromuscular", "Syndromic"],
    ),
    FieldDescriptor::categorical(
        "amb_status_preop",
        "Ambulatory Status",
        &["Ambulatory", "Non-ambulatory"],
    ),
    FieldDescriptor::continuous("major_cobb_angle_pre", "Major Cobb Angle", "°"),
    FieldDescriptor::continuous("minor_cobb_angle_pre", "Minor Cobb Angle", "°"),
    FieldDescriptor::continuous("kyphosis_pre", "Kyphosis", "°"),
    FieldDescriptor::categorical(
        "construct_type_initial",
        "Construct Type",
        &["MCGR", "TGR", "VEPTR"],
    ),
    FieldDescriptor::categorical(
        "construct_side_initial",
        "Construct Side",
        &["Bilateral", "Unilateral"],
    ),
    FieldDescriptor::categorical(
        "superior_attach_initial",
        "Superior Attachment",
        &["Rib", "Spine"],
    ),
    FieldDescriptor::continuous(
        "num_superior_anchors_initial",
        "Superior Anchors",
        "anchors",
    ),
    FieldDescriptor::categorical(
        "inferior_attach_initial",
        "Inferior Attachment",
        &["Pelvis", "Spine"],
    ),
];

/// Display sections. Layout only; encoding ignores grouping.
static GROUPS: [(&str, &[&str]); 3] = [
    (
        "Patient Demographics",
        &[
            "age_at_insertion",
            "height_pre",
            "weight_pre",
            "eos_type",
            "amb_status_preop",
        ],
    ),
    (
        "Preoperative Radiographs",
        &["major_cobb_angle_pre", "minor_cobb_angle_pre", "kyphosis_pre"],
    ),
    (
        "Initial Construct",
        &[
            "construct_type_initial",
            "construct_side_initial",
            "superior_attach_initial",
            "num_superior_anchors_initial",
            "inferior_attach_initial",
        ],
    ),
];

/// Process-wide field registry.
#[derive(Debug)]
pub struct FieldSchema {
    fields: &'static [FieldDescriptor],
}

static SCHEMA: OnceLock<FieldSchema> = OnceLock::new();

impl FieldSchema {
    /// The global schema.
    pub fn global() -> &'static FieldSchema {
        SCHEMA.get_or_init(|| {
            let schema = FieldSchema { fields: &FIELDS };
            debug_assert!(schema.check_invariants().is_ok());
            schema
        })
    }

    /// Look up a field by key.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` if the key is not part of the schema.
    pub fn describe(&self, key: &str) -> Result<&FieldDescriptor, SchemaError> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .ok_or_else(|| SchemaError::UnknownField(key.to_string()))
    }

    /// Descriptors in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Field keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ordered display sections, each with its ordered field keys.
    #[must_use]
    pub fn grouped_keys(&self) -> &'static [(&'static str, &'static [&'static str])] {
        &GROUPS
    }

    fn check_invariants(&self) -> Result<(), String> {
        let mut seen = std::collections::BTreeSet::new();
        for field in self.fields {
            if !seen.insert(field.key) {
                return Err(format!("duplicate key {}", field.key));
            }
            if let FieldKind::Categorical { options } = field.kind {
                if options.is_empty() {
                    return Err(format!("{} has no options", field.key));
                }
                let distinct: std::collections::BTreeSet<_> = options.iter().collect();
                if distinct.len() != options.len() {
                    return Err(format!("{} has duplicate options", field.key));
                }
            }
        }

        let grouped: Vec<&str> = GROUPS.iter().flat_map(|(_, keys)| keys.iter().copied()).collect();
        if grouped.len() != self.fields.len() {
            return Err("grouping does not cover every field exactly once".into());
        }
        for key in grouped {
            if !seen.remove(key) {
                return Err(format!("grouping lists {key} twice or it is unknown"));
            }
        }
        Ok(())
    }
}

/// Shorthand for `FieldSchema::global().describe(key)`.
///
/// # Errors
/// Returns `SchemaError::UnknownField` if the key is not part of the schema.
pub fn describe(key: &str) -> Result<&'static FieldDescriptor, SchemaError> {
    FieldSchema::global().describe(key)
}

/// Shorthand for `FieldSchema::global().grouped_keys()`.
#[must_use]
pub fn grouped_keys() -> &'static [(&'static str, &'static [&'static str])] {
    FieldSchema::global().grouped_keys()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_thirteen_unique_fields() {
        let schema = FieldSchema::global();
        assert_eq!(schema.len(), FIELD_COUNT);
        assert!(schema.check_invariants().is_ok());
    }

    #[test]
    fn test_describe_known_and_unknown() {
        let eos = describe("eos_type").expect("eos_type exists");
        assert_eq!(
            eos.options(),
            &["Congenital", "Idiopathic", "Neuromuscular", "Syndromic"]
        );
        assert!(eos.unit().is_none());

        let height = describe("height_pre").expect("height_pre exists");
        assert!(height.is_continuous());
        assert_eq!(height.unit(), Some("cm"));

        assert_eq!(
            describe("bmi").unwrap_err(),
            SchemaError::UnknownField("bmi".into())
        );
    }

    #[test]
    fn test_grouping_covers_every_key_once() {
        let schema = FieldSchema::global();
        let mut grouped: Vec<&str> = grouped_keys()
            .iter()
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect();
        let mut keys: Vec<&str> = schema.keys().collect();
        grouped.sort_unstable();
        keys.sort_unstable();
        assert_eq!(grouped, keys);
        assert_eq!(grouped_keys()[0].0, "Patient Demographics");
    }
}
