//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while hydrating entities from stored records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A required attribute is absent or null on the record.
    #[error("{entity}: missing attribute '{attribute}'")]
    MissingAttribute {
        /// Entity type name.
        entity: String,
        /// Attribute name.
        attribute: String,
    },

    /// An attribute value has a different shape than the entity expects.
    #[error("{entity}: attribute '{attribute}' expected {expected}, found {found}")]
    TypeMismatch {
        /// Entity type name.
        entity: String,
        /// Attribute name.
        attribute: String,
        /// Expected value shape.
        expected: &'static str,
        /// Actual value shape.
        found: &'static str,
    },

    /// An enum attribute or hierarchy tag carries an unknown discriminant.
    #[error("{entity}: unknown variant {value} for '{attribute}'")]
    UnknownVariant {
        /// Entity type name.
        entity: String,
        /// Attribute (or "tag") name.
        attribute: String,
        /// The unrecognized discriminant or tag.
        value: String,
    },

    /// The record has no row key where one is required.
    #[error("{entity}: record has no key")]
    MissingKey {
        /// Entity type name.
        entity: String,
    },
}

impl ModelError {
    /// Create a missing-attribute error.
    pub fn missing_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a type-mismatch error.
    pub fn type_mismatch(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            entity: entity.into(),
            attribute: attribute.into(),
            expected,
            found,
        }
    }

    /// Create an unknown-variant error.
    pub fn unknown_variant(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::UnknownVariant {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a missing-key error.
    pub fn missing_key(entity: impl Into<String>) -> Self {
        Self::MissingKey {
            entity: entity.into(),
        }
    }
}
