//! TokenProvider trait and AccessToken

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::error::AuthError;

/// A bearer token with an optional expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token sent in the `Authorization` header.
    pub access_token: String,
    /// When the token expires, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Returns `true` if the token has expired.
    ///
    /// Returns `false` if expiration time is unknown.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Supplies bearer tokens to [`HttpTransport`](crate::transport::HttpTransport).
///
/// The transport calls `get_token` before every request. Implementations are
/// expected to cache and refresh tokens themselves; the library only attaches
/// the returned token.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use odata_lib::auth::{AccessToken, TokenProvider};
/// use odata_lib::error::AuthError;
///
/// struct EnvToken;
///
/// #[async_trait]
/// impl TokenProvider for EnvToken {
///     async fn get_token(&self, _resource: &str) -> Result<AccessToken, AuthError> {
///         std::env::var("ODATA_TOKEN")
///             .map(AccessToken::new)
///             .map_err(|e| AuthError::Provider(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Gets an access token for the service root `resource`.
    async fn get_token(&self, resource: &str) -> Result<AccessToken, AuthError>;
}

/// A token provider that always returns the same token.
///
/// # Example
///
/// ```
/// use odata_lib::auth::StaticTokenProvider;
///
/// let provider = StaticTokenProvider::new("my-access-token");
/// ```
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(access_token),
        }
    }

    pub fn from_token(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken, AuthError> {
        if self.token.is_expired() {
            return Err(AuthError::TokenExpired {
                message: "static token cannot be refreshed".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}
