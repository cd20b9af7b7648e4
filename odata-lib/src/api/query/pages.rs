//! Async iterators for OData query pagination.

use futures::Stream;
use tracing::trace;

use crate::ODataClient;
use crate::error::Error;
use crate::model::Record;
use crate::transport::Method;
use crate::transport::TransportRequest;

use super::Page;

/// Async iterator that yields pages of OData query results.
///
/// Automatically follows `@odata.nextLink` for pagination. After the last
/// page, or after the first error, `next` returns `None`.
///
/// # Example
///
/// ```ignore
/// let mut pages = client.from("People")
///     .select(["UserName"])
///     .pages();
///
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     for record in page.records() {
///         println!("{:?}", record);
///     }
/// }
/// ```
pub struct ODataPages<'a> {
    client: &'a ODataClient,
    /// The next URI to fetch; `None` once pages are exhausted.
    pending: Option<Result<String, Error>>,
    /// Sent with every page request.
    headers: Vec<(String, String)>,
}

impl<'a> ODataPages<'a> {
    pub(crate) fn new(
        client: &'a ODataClient,
        first: Result<String, Error>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            client,
            pending: Some(first),
            headers,
        }
    }

    /// Fetches the next page of results.
    ///
    /// Returns `None` when all pages have been consumed.
    pub async fn next(&mut self) -> Option<Result<Page, Error>> {
        let uri = match self.pending.take()? {
            Ok(uri) => uri,
            Err(e) => return Some(Err(e)),
        };

        let mut request = TransportRequest::new(Method::Get, uri);
        request.headers = self.headers.clone();

        let page = match self.client.execute(request).await {
            Ok(response) => response.page(),
            Err(e) => Err(e),
        };
        let page = match page {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        match page.next_link() {
            Some(link) => {
                trace!(next_link = %link, records = page.len(), "following next link");
                self.pending = Some(Ok(self.client.relative_uri(link)));
            }
            None => trace!(records = page.len(), "last page reached"),
        }

        Some(Ok(page))
    }

    /// Returns `true` once no further page will be fetched.
    pub fn is_done(&self) -> bool {
        self.pending.is_none()
    }

    /// Converts the iterator into a [`Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page, Error>> + 'a {
        async_stream::stream! {
            let mut pages = self;
            while let Some(page) = pages.next().await {
                yield page;
            }
        }
    }
}

/// Async iterator over records across all pages.
///
/// Pages are fetched lazily: the next page is requested only once every
/// record of the current one has been yielded. Empty intermediate pages are
/// skipped.
pub struct Cursor<'a> {
    pages: ODataPages<'a>,
    buffer: std::vec::IntoIter<Record>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(pages: ODataPages<'a>) -> Self {
        Self {
            pages,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Returns the next record, fetching the next page when needed.
    pub async fn next(&mut self) -> Option<Result<Record, Error>> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            match self.pages.next().await? {
                Ok(page) => self.buffer = page.into_records().into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Drains every page into one vector, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record?);
        }
        Ok(records)
    }

    /// Converts the cursor into a [`Stream`] of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, Error>> + 'a {
        async_stream::stream! {
            let mut cursor = self;
            while let Some(record) = cursor.next().await {
                yield record;
            }
        }
    }
}
