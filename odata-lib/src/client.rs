//! Main ODataClient

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::api::Batch;
use crate::api::BatchResults;
use crate::api::BoundaryGenerator;
use crate::api::UuidBoundary;
use crate::api::batch::multipart;
use crate::api::extract_boundary;
use crate::api::query::QueryBuilder;
use crate::auth::TokenProvider;
use crate::error::ApiError;
use crate::error::Error;
use crate::response::ODataResponse;
use crate::transport::HttpTransport;
use crate::transport::Method;
use crate::transport::Transport;
use crate::transport::TransportRequest;

/// The main client for talking to an OData v4 service.
///
/// This client is cheap to clone (uses `Arc` internally) and can be shared
/// across threads safely.
///
/// # Example
///
/// ```ignore
/// use odata_lib::{ODataClient, auth::StaticTokenProvider};
///
/// let client = ODataClient::builder()
///     .url("https://services.odata.org/V4/TripPinService")
///     .token_provider(StaticTokenProvider::new("my-token"))
///     .build()?;
///
/// let people = client.from("People").top(10).get().await?;
/// ```
#[derive(Clone)]
pub struct ODataClient {
    inner: Arc<ODataClientInner>,
}

struct ODataClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
    default_page_size: Option<usize>,
    headers: Vec<(String, String)>,
    boundaries: Arc<dyn BoundaryGenerator>,
}

impl ODataClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> ODataClientBuilder<Missing> {
        ODataClientBuilder::new()
    }

    /// Returns the service root URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Page size requested through `Prefer: odata.maxpagesize` when a query
    /// sets none.
    pub fn default_page_size(&self) -> Option<usize> {
        self.inner.default_page_size
    }

    /// Starts a query with no entity set bound.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Starts a query against `entity_set`.
    pub fn from(&self, entity_set: impl Into<String>) -> QueryBuilder<'_> {
        self.query().from(entity_set)
    }

    /// Sends a request through the transport.
    ///
    /// Client-wide headers are added unless the request already carries one
    /// with the same name. Non-2xx responses become [`ApiError::Http`].
    pub async fn execute(&self, mut request: TransportRequest) -> Result<ODataResponse, Error> {
        request.uri = self.relative_uri(&request.uri);
        for (name, value) in &self.inner.headers {
            if request.header(name).is_none() {
                request.headers.push((name.clone(), value.clone()));
            }
        }

        debug!(method = %request.method, uri = %request.uri, "sending request");
        let response = self.inner.transport.send(request).await?;
        debug!(status = response.status, bytes = response.body.len(), "received response");

        ODataResponse::from_transport(response)
    }

    /// Sends a batch to the `$batch` endpoint and parses the multipart reply.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let batch = Batch::new()
    ///     .get("People('russellwhyte')")
    ///     .changeset(|cs| {
    ///         cs.add(BatchRequest::post("People", json!({"UserName": "new"})));
    ///     });
    ///
    /// let results = client.execute_batch(&batch).await?;
    /// assert!(results.all_succeeded());
    /// ```
    pub async fn execute_batch(&self, batch: &Batch) -> Result<BatchResults, Error> {
        let compiled = multipart::compile(batch, &self.inner.base_url, self.inner.boundaries.as_ref())?;
        debug!(
            requests = batch.request_count(),
            boundary = %compiled.boundary,
            "sending batch"
        );

        let request = TransportRequest::new(Method::Post, "$batch")
            .with_header("Content-Type", compiled.content_type())
            .with_body(compiled.body);
        let response = self.execute(request).await?;

        let text = response.text();
        let boundary = response
            .header("Content-Type")
            .and_then(extract_boundary)
            .ok_or_else(|| ApiError::parse_with_body("Batch response has no multipart boundary", text.clone()))?;

        BatchResults::parse(&text, &boundary)
    }

    /// Strips the service root from an absolute URI.
    ///
    /// URIs under another root are returned unchanged.
    pub(crate) fn relative_uri(&self, uri: &str) -> String {
        let base = self.inner.base_url.trim_end_matches('/');
        if let Some(rest) = uri.strip_prefix(base) {
            if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                return rest.trim_start_matches('/').to_string();
            }
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            warn!(uri, base_url = %self.inner.base_url, "absolute URI is outside the service root");
        }
        uri.to_string()
    }
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("base_url", &self.inner.base_url)
            .field("default_page_size", &self.inner.default_page_size)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing an [`ODataClient`].
///
/// Uses the typestate pattern to ensure the service URL is set at compile
/// time. Without an explicit [`transport`](Self::transport), an
/// [`HttpTransport`] is built from the HTTP settings.
///
/// # Example
///
/// ```ignore
/// let client = ODataClient::builder()
///     .url("https://services.odata.org/V4/TripPinService")
///     .timeout(Duration::from_secs(30))
///     .default_page_size(100)
///     .build()?;
/// ```
pub struct ODataClientBuilder<U> {
    url: U,
    transport: Option<Arc<dyn Transport>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
    default_page_size: Option<usize>,
    headers: Vec<(String, String)>,
    boundaries: Arc<dyn BoundaryGenerator>,
}

impl ODataClientBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            transport: None,
            token_provider: None,
            timeout: None,
            connect_timeout: None,
            http_client: None,
            default_page_size: None,
            headers: Vec::new(),
            boundaries: Arc::new(UuidBoundary),
        }
    }

    /// Sets the service root URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// .url("https://services.odata.org/V4/TripPinService")
    /// ```
    pub fn url(self, url: impl Into<String>) -> ODataClientBuilder<Set<String>> {
        ODataClientBuilder {
            url: Set(url.into()),
            transport: self.transport,
            token_provider: self.token_provider,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
            default_page_size: self.default_page_size,
            headers: self.headers,
            boundaries: self.boundaries,
        }
    }
}

impl Default for ODataClientBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ODataClientBuilder<U> {
    /// Sends requests through `transport` instead of the default
    /// [`HttpTransport`]. The HTTP settings below are then ignored.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the token provider for bearer authentication.
    pub fn token_provider<T: TokenProvider + 'static>(mut self, provider: T) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Page size to request when a query does not set one.
    pub fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = Some(size);
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the generator for batch boundaries.
    pub fn boundary_generator<B: BoundaryGenerator + 'static>(mut self, boundaries: B) -> Self {
        self.boundaries = Arc::new(boundaries);
        self
    }
}

impl ODataClientBuilder<Set<String>> {
    /// Builds the [`ODataClient`].
    ///
    /// This method is only available once `url` has been set. Fails when the
    /// URL is not absolute or the HTTP client cannot be created.
    pub fn build(self) -> Result<ODataClient, Error> {
        let base_url = self.url.0;
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let transport = HttpTransport::builder(base_url.clone())
                    .shared_token_provider(self.token_provider)
                    .maybe_timeout(self.timeout)
                    .maybe_connect_timeout(self.connect_timeout)
                    .maybe_http_client(self.http_client)
                    .build()?;
                Arc::new(transport) as Arc<dyn Transport>
            }
        };

        Ok(ODataClient {
            inner: Arc::new(ODataClientInner {
                base_url,
                transport,
                default_page_size: self.default_page_size,
                headers: self.headers,
                boundaries: self.boundaries,
            }),
        })
    }
}
