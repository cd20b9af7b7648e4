//! `reqwest`-based transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;
use url::Url;

use super::Method;
use super::Transport;
use super::TransportRequest;
use super::TransportResponse;
use crate::auth::TokenProvider;
use crate::error::ApiError;
use crate::error::AuthError;
use crate::error::Error;

/// Headers every OData request carries unless the caller overrides them.
const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("OData-MaxVersion", "4.0"),
    ("OData-Version", "4.0"),
    ("Accept", "application/json"),
];

/// Default [`Transport`]: sends requests with `reqwest` against a service
/// root URL, attaching a bearer token when a [`TokenProvider`] is configured.
///
/// # Example
///
/// ```ignore
/// let transport = HttpTransport::builder("https://services.odata.org/V4/TripPinService")
///     .token_provider(StaticTokenProvider::new("token"))
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: Client,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    /// Returns the service root this transport sends to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a relative request URI against the service root.
    ///
    /// Absolute URIs (a server-issued next link, for instance) are kept.
    fn resolve(&self, uri: &str) -> Result<Url, ApiError> {
        let full = if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                uri.trim_start_matches('/')
            )
        };
        Url::parse(&full).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", full, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        let url = self.resolve(&request.uri)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let url_text = url.to_string();
        let mut builder = self.http_client.request(method, url);

        for (name, value) in DEFAULT_HEADERS {
            if request.header(name).is_none() {
                builder = builder.header(name, value);
            }
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(provider) = &self.token_provider {
            let token = provider.get_token(&self.base_url).await?;
            if token.access_token.contains(['\r', '\n']) {
                return Err(Error::Auth(AuthError::InvalidToken));
            }
            builder = builder.bearer_auth(&token.access_token);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        trace!(url = %url_text, "sending HTTP request");
        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(TransportResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

impl HttpTransport {
    fn map_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Api(ApiError::Timeout(self.timeout.unwrap_or_default()))
        } else {
            Error::Api(ApiError::Network(error))
        }
    }
}

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    base_url: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl HttpTransportBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token_provider: None,
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }

    /// Sets the token provider used for bearer authentication.
    pub fn token_provider<T: TokenProvider + 'static>(mut self, provider: T) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    pub(crate) fn shared_token_provider(mut self, provider: Option<Arc<dyn TokenProvider>>) -> Self {
        self.token_provider = provider;
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout. Ignored when a custom client is supplied.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Uses a preconfigured `reqwest` client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub(crate) fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn maybe_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub(crate) fn maybe_http_client(mut self, client: Option<Client>) -> Self {
        self.http_client = client;
        self
    }

    pub fn build(self) -> Result<HttpTransport, Error> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build().map_err(ApiError::from)?
            }
        };

        Ok(HttpTransport {
            base_url: self.base_url,
            http_client,
            token_provider: self.token_provider,
            timeout: self.timeout,
        })
    }
}
