//! Error types and result types for mapped document access.
//!
//! Every fallible operation in the crate returns [`ModelResult<T>`]. Errors are raised
//! to the immediate caller at the point of attribute access or `save`; nothing is
//! retried or suppressed.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised while reading, writing or persisting a mapped document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A mapped attribute's configured raw field name(s) are absent from the raw document.
    ///
    /// `fields` lists every raw field name that was attempted, in declared order.
    #[error("{}", describe_missing(.attribute, .fields, .kind))]
    Mapping {
        attribute: String,
        fields: Vec<String>,
        kind: MappingKind,
    },
    /// A superset query builder returned something other than a filter document or a pipeline.
    #[error(
        "Superset query for attribute '{attribute}' returned {found}, expected a filter document or an array of pipeline stages."
    )]
    QueryShape { attribute: String, found: String },
    /// Read of an undeclared attribute on a strict model.
    #[error("'{model}' object has no attribute '{attribute}'")]
    UndeclaredAttribute {
        model: &'static str,
        attribute: String,
    },
    /// Assignment of an undeclared attribute on a strict model.
    #[error("'{model}' cannot have instance attributes dynamically assigned ('{attribute}').")]
    UndeclaredAssignment {
        model: &'static str,
        attribute: String,
    },
    /// `save` was called without match criteria on a document lacking an identity value.
    #[error(
        "Cannot save '{model}': the document has no '{identity_field}' value and no match criteria were given."
    )]
    Save {
        model: &'static str,
        identity_field: &'static str,
    },
    /// Assignment to an attribute whose descriptor has no write contract.
    #[error("Attribute '{attribute}' is read-only.")]
    ReadOnly { attribute: String },
    /// Scalar access of an attribute declared as a sequence.
    #[error("Attribute '{attribute}' is a sequence; read it with `sequence`.")]
    SequenceAttribute { attribute: String },
    /// A sequence read of an attribute that is not declared as a sequence.
    #[error("Attribute '{attribute}' is not declared as a sequence.")]
    NotSequence { attribute: String },
    /// A sequence attribute was read with an element model other than the declared one.
    #[error("Attribute '{attribute}' yields {expected} elements, not {requested}.")]
    ElementType {
        attribute: String,
        expected: &'static str,
        requested: &'static str,
    },
    /// A superset query is configured but the document was wrapped without a database handle.
    #[error("Attribute '{attribute}' queries a related collection, but no database handle was provided.")]
    NoDatabase { attribute: String },
    /// A schema declaration is invalid.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Raised by transform functions when a value cannot be converted.
    #[error("Transform error: {0}")]
    Transform(String),
    /// A session belonging to a different backend was handed to a collection.
    #[error("Session error: {0}")]
    Session(String),
    /// An error occurred in the underlying database driver or storage.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for mapped document operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// The kind of mapping whose raw field lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// A single mapped field, or an undeclared attribute read from the raw document.
    Field,
    /// An ordered list of fallback field names.
    Fallthrough,
}

impl ModelError {
    /// Builds a [`ModelError::Mapping`] for an attribute mapped to a single raw field.
    pub fn missing(attribute: impl Into<String>, field: impl Into<String>) -> Self {
        ModelError::Mapping {
            attribute: attribute.into(),
            fields: vec![field.into()],
            kind: MappingKind::Field,
        }
    }
}

fn describe_missing(attribute: &str, fields: &[String], kind: &MappingKind) -> String {
    match (kind, fields) {
        (MappingKind::Field, [field]) => format!("Attribute '{attribute}' is mapped to missing document property '{field}'."),
        _ => format!(
            "Attribute '{attribute}' references the field names {} which are not present.",
            fields
                .iter()
                .map(|field| format!("'{field}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ModelError {
    fn from(err: SerdeJsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_message_names_attribute_and_field() {
        let err = ModelError::missing("id", "user_id");

        assert_eq!(
            err.to_string(),
            "Attribute 'id' is mapped to missing document property 'user_id'."
        );
    }

    #[test]
    fn fallthrough_message_lists_fields_in_order() {
        let err = ModelError::Mapping {
            attribute: "name".into(),
            fields: vec!["name".into(), "full_name".into()],
            kind: MappingKind::Fallthrough,
        };

        assert_eq!(
            err.to_string(),
            "Attribute 'name' references the field names 'name', 'full_name' which are not present."
        );
    }

    #[test]
    fn single_name_fallthrough_keeps_fallthrough_wording() {
        let err = ModelError::Mapping {
            attribute: "name".into(),
            fields: vec!["full_name".into()],
            kind: MappingKind::Fallthrough,
        };

        assert_eq!(
            err.to_string(),
            "Attribute 'name' references the field names 'full_name' which are not present."
        );
    }
}
