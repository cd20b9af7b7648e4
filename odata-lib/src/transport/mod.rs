//! HTTP transport boundary
//!
//! The query compiler only produces relative request URIs and bodies. Sending
//! them is the job of a [`Transport`]. [`HttpTransport`] is the default,
//! `reqwest`-based implementation; tests and alternative stacks plug in their
//! own.

mod http;

use std::fmt;

use async_trait::async_trait;

use crate::error::Error;

pub use http::HttpTransport;
pub use http::HttpTransportBuilder;

/// HTTP methods used by OData requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns the method as it appears on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// URI relative to the service root, e.g. `People?$top=2`.
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What a [`Transport`] got back from the service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends compiled requests to an OData service.
///
/// Implementations own connection handling, TLS, authentication headers and
/// any retry policy. Errors are propagated to the caller untouched.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use odata_lib::error::Error;
/// use odata_lib::transport::{Transport, TransportRequest, TransportResponse};
///
/// struct Canned(Vec<u8>);
///
/// #[async_trait]
/// impl Transport for Canned {
///     async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, Error> {
///         Ok(TransportResponse::new(200, self.0.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the raw response, whatever its status.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error>;
}
