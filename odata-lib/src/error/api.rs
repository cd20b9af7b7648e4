//! API error types

use std::time::Duration;

/// Errors raised while talking to the service or decoding what it sent back.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success HTTP status from the service.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message (the OData `error.message` when present).
        message: String,
        /// OData error code, if available.
        code: Option<String>,
    },

    /// Network error during the request.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body was not in the expected shape.
    #[error("Unable to parse response: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },
}

impl ApiError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// Builds an HTTP error from an OData error body.
    ///
    /// Falls back to the raw body text when it is not an OData error object.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let (code, message) = parse_odata_error(&text);
        let message = if message.is_empty() {
            format!("HTTP {} error", status)
        } else {
            message
        };
        Self::Http {
            status,
            message,
            code,
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the OData error code if available.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Extracts `(code, message)` from an OData error body:
/// `{"error": {"code": "...", "message": "..."}}`.
pub(crate) fn parse_odata_error(body: &str) -> (Option<String>, String) {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = json.get("error") {
            let code = error
                .get("code")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            // OData v2/v3 services nest the message: {"message": {"value": "..."}}
            let message = error
                .get("message")
                .and_then(|m| m.as_str().or_else(|| m.get("value").and_then(|v| v.as_str())))
                .unwrap_or("Unknown error")
                .to_string();
            return (code, message);
        }
    }
    (None, body.trim().to_string())
}
