//! Authentication error types

/// Errors a [`TokenProvider`](crate::auth::TokenProvider) can report.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Access token expired and could not be refreshed.
    #[error("Token expired and refresh failed: {message}")]
    TokenExpired { message: String },

    /// The provider rejected the configured credentials.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The token could not be used as an HTTP header value.
    #[error("Token is not a valid header value")]
    InvalidToken,

    /// Provider-specific failure.
    #[error("Token provider error: {0}")]
    Provider(String),
}
