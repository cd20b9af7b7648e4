//! OData query builder.

use serde::Serialize;
use tracing::debug;

use crate::ODataClient;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::EntityKey;
use crate::model::Record;
use crate::response::ODataResponse;
use crate::transport::Method;
use crate::transport::TransportRequest;

use super::Clause;
use super::Cursor;
use super::Direction;
use super::ExpandBuilder;
use super::Filterable;
use super::ODataPages;
use super::OrderBy;
use super::QueryDescriptor;
use super::compile;
use super::filter::record_error;

/// Builder for constructing OData queries.
///
/// Use [`ODataClient::from`] (or [`ODataClient::query`] followed by
/// [`from`](Self::from)) to create a query builder. Filter methods come from
/// [`Filterable`].
///
/// Mistakes such as an unknown operator are not reported where they happen:
/// the first one is kept and returned by the terminal operation before any
/// request is sent.
///
/// # Example
///
/// ```ignore
/// let mut pages = client.from("People")
///     .select(["UserName", "FirstName"])
///     .filter_op("Age", ">", 30)
///     .order_by_desc("Age")
///     .page_size(50)
///     .pages();
///
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     for record in page.records() {
///         println!("{:?}", record);
///     }
/// }
/// ```
pub struct QueryBuilder<'a> {
    client: &'a ODataClient,
    query: QueryDescriptor,
    error: Option<Error>,
}

impl<'a> QueryBuilder<'a> {
    /// Creates an unbound query builder.
    pub(crate) fn new(client: &'a ODataClient) -> Self {
        Self {
            client,
            query: QueryDescriptor::default(),
            error: None,
        }
    }

    /// Returns a fresh builder on the same client, sharing no query state.
    pub fn new_query(&self) -> QueryBuilder<'a> {
        QueryBuilder::new(self.client)
    }

    /// Returns the query accumulated so far.
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Sets the entity set (or any resource path such as `People('x')/Trips`).
    pub fn from(mut self, entity_set: impl Into<String>) -> Self {
        self.query.entity_set = Some(entity_set.into());
        self
    }

    /// Specifies which fields to select, replacing any earlier selection.
    ///
    /// If not called, all fields are returned.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Appends fields to the selection.
    pub fn add_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Addresses a single entity: `People('russellwhyte')`.
    pub fn key(mut self, key: impl Into<EntityKey>) -> Self {
        self.query.entity_key = Some(key.into());
        self
    }

    /// Expands a navigation property without nested options.
    pub fn expand(mut self, navigation_property: impl Into<String>) -> Self {
        let (expand, _) = ExpandBuilder::new(navigation_property).into_parts();
        self.query.expands.push(expand);
        self
    }

    /// Expands a navigation property to include related records.
    ///
    /// # Example
    ///
    /// ```ignore
    /// client.from("People")
    ///     .select(["UserName"])
    ///     .expand_with("Trips", |e| {
    ///         e.select(["Name", "Budget"])
    ///          .filter_op("Budget", ">", 1000)
    ///          .top(5)
    ///     });
    /// ```
    pub fn expand_with<F>(mut self, navigation_property: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ExpandBuilder) -> ExpandBuilder,
    {
        let (expand, error) = build(ExpandBuilder::new(navigation_property)).into_parts();
        if let Some(error) = error {
            record_error(&mut self, error);
        }
        self.query.expands.push(expand);
        self
    }

    /// Sorts ascending by `field`, after any earlier ordering.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.query.orders.push((field.into(), Direction::Asc));
        self
    }

    /// Sorts descending by `field`, after any earlier ordering.
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.query.orders.push((field.into(), Direction::Desc));
        self
    }

    /// Appends a prebuilt ordering.
    pub fn order(mut self, order: OrderBy) -> Self {
        self.query.orders.extend(order.fields);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.query.skip = Some(n);
        self
    }

    /// Limits the total number of records returned.
    ///
    /// This is applied server-side and limits the total results across all
    /// pages. Ignored when a key is set.
    pub fn top(mut self, n: usize) -> Self {
        self.query.top = Some(n);
        self
    }

    /// Resumes from a continuation token taken from [`Page::skip_token`].
    ///
    /// [`Page::skip_token`]: super::Page::skip_token
    pub fn skip_token(mut self, token: impl Into<String>) -> Self {
        self.query.skip_token = Some(token.into());
        self
    }

    /// Sets the page size for pagination.
    ///
    /// This controls how many records the server returns per page through
    /// `Prefer: odata.maxpagesize`. Falls back to the client default.
    pub fn page_size(mut self, size: usize) -> Self {
        self.query.page_size = Some(size);
        self
    }

    /// Includes the total count of matching records in the response.
    ///
    /// When enabled, `Page::total_count()` will return the total number of
    /// records matching the query (not just the current page).
    pub fn include_count(mut self) -> Self {
        self.query.include_count = true;
        self
    }

    /// Adds a non-system query option such as `debug=true`.
    ///
    /// Keys starting with `$` or `@` are rejected.
    pub fn custom_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() || key.starts_with('$') || key.starts_with('@') {
            record_error(&mut self, Error::InvalidCustomOption { key });
        } else {
            self.query.custom_options.push((key, value.into()));
        }
        self
    }

    // -------------------------------------------------------------------------
    // Terminal operations
    // -------------------------------------------------------------------------

    /// Compiles the query into a URI relative to the service root.
    pub fn to_uri(self) -> Result<String, Error> {
        self.compiled()
    }

    /// Executes the query and returns the first page of results.
    ///
    /// Use [`pages`](Self::pages) or [`cursor`](Self::cursor) to read all
    /// pages.
    pub async fn get(self) -> Result<Vec<Record>, Error> {
        let mut pages = self.pages();
        match pages.next().await {
            Some(Ok(page)) => Ok(page.into_records()),
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// Returns an async iterator over pages.
    pub fn pages(self) -> ODataPages<'a> {
        let client = self.client;
        let headers = self.read_headers();
        let first = self.compiled();
        ODataPages::new(client, first, headers)
    }

    /// Returns an async iterator over records across all pages.
    pub fn cursor(self) -> Cursor<'a> {
        Cursor::new(self.pages())
    }

    /// Executes the query and returns the first matching record.
    pub async fn first(mut self) -> Result<Option<Record>, Error> {
        self.query.top = Some(1);
        let records = self.get().await?;
        Ok(records.into_iter().next())
    }

    /// Retrieves one entity by key. A `404 Not Found` is `Ok(None)`.
    pub async fn find(self, key: impl Into<EntityKey>) -> Result<Option<Record>, Error> {
        let builder = self.key(key);
        let client = builder.client;
        let headers = builder.read_headers();
        let uri = builder.compiled()?;

        let mut request = TransportRequest::new(Method::Get, uri);
        request.headers = headers;
        match client.execute(request).await {
            Ok(response) => response.record(),
            Err(Error::Api(ApiError::Http { status: 404, .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Counts matching records through the `/$count` segment.
    pub async fn count(mut self) -> Result<usize, Error> {
        self.query.count_only = true;
        let client = self.client;
        let uri = self.compiled()?;

        let request = TransportRequest::new(Method::Get, uri).with_header("Accept", "text/plain");
        let response = client.execute(request).await?;
        response.count()
    }

    /// Creates an entity in the entity set and returns it as the service
    /// echoed it (`Prefer: return=representation`).
    pub async fn insert(self, body: impl Serialize) -> Result<Option<Record>, Error> {
        let (client, request) = self.write_request(Method::Post, None, &body)?;
        let request = request.with_header("Prefer", "return=representation");
        client.execute(request).await?.record()
    }

    /// Posts `body` to the addressed resource (an action, for instance) and
    /// returns the raw response.
    pub async fn post(self, body: impl Serialize) -> Result<ODataResponse, Error> {
        let (client, request) = self.write_request(Method::Post, None, &body)?;
        client.execute(request).await
    }

    /// Updates the keyed entity with the properties in `body`.
    pub async fn patch(self, body: impl Serialize) -> Result<Option<Record>, Error> {
        let (client, request) = self.write_request(Method::Patch, Some("patch"), &body)?;
        client.execute(request).await?.record()
    }

    /// Replaces the keyed entity with `body`.
    pub async fn put(self, body: impl Serialize) -> Result<Option<Record>, Error> {
        let (client, request) = self.write_request(Method::Put, Some("put"), &body)?;
        client.execute(request).await?.record()
    }

    /// Deletes the keyed entity.
    pub async fn delete(self) -> Result<(), Error> {
        self.require_key("delete")?;
        let client = self.client;
        let uri = self.resource_uri()?;
        client
            .execute(TransportRequest::new(Method::Delete, uri))
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Returns the recorded usage error, or the compiled URI.
    fn compiled(self) -> Result<String, Error> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.query.entity_set.as_deref().is_none_or(str::is_empty) {
            return Err(Error::MissingEntitySet);
        }
        compile(&self.query)
    }

    /// URI of the addressed resource only: entity set, key and custom options.
    fn resource_uri(self) -> Result<String, Error> {
        let resource = QueryBuilder {
            client: self.client,
            query: QueryDescriptor {
                entity_set: self.query.entity_set,
                entity_key: self.query.entity_key,
                custom_options: self.query.custom_options,
                ..QueryDescriptor::default()
            },
            error: self.error,
        };
        resource.to_uri()
    }

    /// Recorded errors win over a missing key.
    fn require_key(&self, operation: &'static str) -> Result<(), Error> {
        if self.query.entity_key.is_none() && self.error.is_none() {
            return Err(Error::MissingKey { operation });
        }
        Ok(())
    }

    fn write_request(
        self,
        method: Method,
        keyed: Option<&'static str>,
        body: &impl Serialize,
    ) -> Result<(&'a ODataClient, TransportRequest), Error> {
        if let Some(operation) = keyed {
            self.require_key(operation)?;
        }
        let client = self.client;
        let uri = self.resource_uri()?;
        let body = serde_json::to_vec(body)?;
        debug!(method = %method, uri = %uri, bytes = body.len(), "prepared write request");

        let request = TransportRequest::new(method, uri)
            .with_header("Content-Type", "application/json")
            .with_body(body);
        Ok((client, request))
    }

    /// Headers for reads: the page size preference, when one applies.
    fn read_headers(&self) -> Vec<(String, String)> {
        self.query
            .page_size
            .or(self.client.default_page_size())
            .map(|size| vec![("Prefer".to_string(), format!("odata.maxpagesize={}", size))])
            .unwrap_or_default()
    }
}

impl Filterable for QueryBuilder<'_> {
    fn clauses_mut(&mut self) -> &mut Vec<Clause> {
        &mut self.query.clauses
    }

    fn error_slot(&mut self) -> &mut Option<Error> {
        &mut self.error
    }
}
