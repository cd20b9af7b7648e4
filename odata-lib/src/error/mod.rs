//! Error types

mod api;
mod auth;
mod field;

pub use api::*;
pub use auth::*;
pub use field::*;

/// Top-level error returned by client, builder and compiler operations.
///
/// Usage errors (`MissingEntitySet`, `InvalidOperator`, ...) are raised before
/// any request reaches the transport. Transport failures arrive wrapped in
/// [`Error::Api`] exactly as the transport reported them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A terminal operation was called before an entity set was bound.
    #[error("No entity set configured; call `from()` before executing the query")]
    MissingEntitySet,

    /// An operation that addresses a single entity was called without a key.
    #[error("Operation `{operation}` requires an entity key")]
    MissingKey {
        /// The operation that needed the key.
        operation: &'static str,
    },

    /// The operator is not in the operator table and a value was supplied.
    #[error("Invalid operator '{operator}' for column '{column}'")]
    InvalidOperator {
        /// The column the clause targeted.
        column: String,
        /// The rejected operator.
        operator: String,
    },

    /// A comparison operator other than equality was combined with `null`.
    #[error("Illegal operator and value combination: '{column} {operator} null'")]
    IllegalOperatorAndValue {
        /// The column the clause targeted.
        column: String,
        /// The operator that cannot take a null operand.
        operator: String,
    },

    /// A custom query option used a reserved `$` or `@` prefix.
    #[error("Invalid custom query option '{key}': keys must not start with '$' or '@'")]
    InvalidCustomOption {
        /// The rejected key.
        key: String,
    },

    /// The query descriptor could not be compiled into a URI.
    #[error("Compilation error: {0}")]
    Compile(String),

    /// The batch holds more requests than a service accepts.
    #[error("Batch contains {count} requests, maximum is {max}")]
    BatchSizeExceeded {
        /// Number of requests in the batch.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Transport or response-shape failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Authentication failure while obtaining a token.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Failed to serialise a request body.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a compilation error.
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Returns `true` for errors raised by caller misconfiguration.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingEntitySet
                | Self::MissingKey { .. }
                | Self::InvalidOperator { .. }
                | Self::IllegalOperatorAndValue { .. }
                | Self::InvalidCustomOption { .. }
        )
    }
}
