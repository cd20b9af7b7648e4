//! Page type for paginated query results.

use url::Url;

use crate::model::Record;

/// A page of query results with pagination information.
///
/// When iterating over query results, each page contains a batch of records
/// along with the link needed to fetch the next page.
///
/// # Example
///
/// ```ignore
/// let mut pages = client.from("People").select(["UserName"]).pages();
///
/// while let Some(page) = pages.next().await {
///     let page = page?;
///
///     for record in page.records() {
///         println!("{:?}", record.get_string("UserName"));
///     }
///
///     if let Some(token) = page.skip_token() {
///         println!("Resume later with $skiptoken={}", token);
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Page {
    records: Vec<Record>,
    /// `@odata.nextLink` for fetching the next page.
    next_link: Option<String>,
    /// Total record count (if requested with `$count=true`).
    total_count: Option<usize>,
}

impl Page {
    /// Creates a new page with records and no pagination info.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            next_link: None,
            total_count: None,
        }
    }

    /// Sets the next link for pagination.
    pub fn with_next_link(mut self, next_link: impl Into<String>) -> Self {
        self.next_link = Some(next_link.into());
        self
    }

    /// Sets the total record count.
    pub fn with_total_count(mut self, count: usize) -> Self {
        self.total_count = Some(count);
        self
    }

    /// Returns a reference to the records in this page.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the page and returns the records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns the next link, if the service reported more results.
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Returns the `$skiptoken` carried by the next link, if any.
    ///
    /// Relative links are read against a placeholder root so only the query
    /// string matters.
    pub fn skip_token(&self) -> Option<String> {
        let link = self.next_link.as_deref()?;
        let url = Url::parse(link)
            .or_else(|_| Url::parse("http://localhost/").and_then(|root| root.join(link)))
            .ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "$skiptoken")
            .map(|(_, value)| value.into_owned())
    }

    /// Returns the total record count, if it was requested.
    ///
    /// This requires `$count=true` in the request.
    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// Returns `true` if this page has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of records in this page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are more pages available.
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}
