//! Typed property access errors

/// Why a typed getter on [`Record`](crate::model::Record) could not return a
/// value. An explicit `null` is not an error: getters return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Property '{property}' is not present in the record")]
    Missing { property: String },

    /// `expected` and `actual` are [`Value`](crate::model::Value) type names.
    #[error("Property '{property}' holds {actual}, not {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl FieldError {
    pub fn missing(property: impl Into<String>) -> Self {
        Self::Missing {
            property: property.into(),
        }
    }

    pub fn type_mismatch(
        property: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected,
            actual,
        }
    }

    /// Name of the property the getter was asked for.
    pub fn property(&self) -> &str {
        match self {
            Self::Missing { property } | Self::TypeMismatch { property, .. } => property,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}
