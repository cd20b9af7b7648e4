//! Batch/changeset operations
//!
//! A [`Batch`] collects sub-requests, optionally grouped into atomic
//! changesets, and is compiled into one `multipart/mixed` document sent as a
//! single `POST $batch`. Output order always equals call order.
//!
//! # Example
//!
//! ```ignore
//! let results = client
//!     .execute_batch(
//!         Batch::new()
//!             .get("People('russellwhyte')")
//!             .changeset(|cs| {
//!                 let person = cs.add(BatchRequest::post("People", json!({"UserName": "new"})));
//!                 cs.add(BatchRequest::post(format!("{}/Trips", person.as_ref_string()), trip));
//!             })
//!             .delete("People('scottketchum')"),
//!     )
//!     .await?;
//! ```

pub mod multipart;
pub mod response;

pub use multipart::BoundaryGenerator;
pub use multipart::CompiledBatch;
pub use multipart::UuidBoundary;
pub use response::BatchItemResult;
pub use response::BatchOperationError;
pub use response::BatchPartResponse;
pub use response::BatchResults;
pub use response::extract_boundary;

use crate::error::Error;
use crate::transport::Method;

/// Maximum number of requests a batch may hold, changeset members included.
pub const MAX_BATCH_REQUESTS: usize = 1000;

// =============================================================================
// Content-ID Reference
// =============================================================================

/// Opaque reference to a Content-ID for referencing operation results.
///
/// Used within changesets to reference the result of an earlier operation
/// (e.g., binding a trip to a newly created person).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdRef(pub(crate) String);

impl ContentIdRef {
    /// Returns the reference string (e.g., "$1").
    pub fn as_ref_string(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Batch Request
// =============================================================================

/// One sub-request of a batch.
///
/// `uri` is relative to the service root, or a Content-ID reference such as
/// `$1/Trips`, which is sent verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub method: Method,
    pub uri: String,
    pub body: Option<serde_json::Value>,
    pub content_id: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl BatchRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            content_id: None,
            headers: Vec::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    pub fn post(uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        Self::new(Method::Post, uri).with_body(body)
    }

    pub fn patch(uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        Self::new(Method::Patch, uri).with_body(body)
    }

    pub fn put(uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        Self::new(Method::Put, uri).with_body(body)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::Delete, uri)
    }

    pub fn with_body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// =============================================================================
// Changeset
// =============================================================================

/// A transactional group of requests.
///
/// All requests in a changeset either succeed together or fail together
/// (rollback). Changesets cannot be nested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Changeset {
    pub(crate) requests: Vec<BatchRequest>,
}

impl Changeset {
    pub fn requests(&self) -> &[BatchRequest] {
        &self.requests
    }
}

// =============================================================================
// Batch Item
// =============================================================================

/// A single item in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItem {
    /// A standalone request (not transactional).
    Request(BatchRequest),
    /// A transactional group of requests.
    Changeset(Changeset),
}

// =============================================================================
// Batch
// =============================================================================

/// A batch of requests to execute in a single HTTP request.
///
/// Requests are either added inside [`changeset`](Self::changeset) or
/// between [`begin_changeset`](Self::begin_changeset) and
/// [`end_changeset`](Self::end_changeset). Beginning a changeset while one is
/// open closes the open one first; a changeset still open at compile time is
/// closed implicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub(crate) items: Vec<BatchItem>,
    pub(crate) open: Option<Changeset>,
    next_content_id: u32,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    /// Creates a new empty batch.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            open: None,
            next_content_id: 1,
        }
    }

    // -------------------------------------------------------------------------
    // Adding items
    // -------------------------------------------------------------------------

    /// Adds a request to the open changeset, or as a standalone part.
    pub fn add(mut self, request: BatchRequest) -> Self {
        if self.open.is_some() {
            let request = self.assign_content_id(request);
            if let Some(changeset) = self.open.as_mut() {
                changeset.requests.push(request);
            }
        } else {
            self.items.push(BatchItem::Request(request));
        }
        self
    }

    pub fn get(self, uri: impl Into<String>) -> Self {
        self.add(BatchRequest::get(uri))
    }

    pub fn post(self, uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        self.add(BatchRequest::post(uri, body))
    }

    pub fn patch(self, uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        self.add(BatchRequest::patch(uri, body))
    }

    pub fn put(self, uri: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        self.add(BatchRequest::put(uri, body))
    }

    pub fn delete(self, uri: impl Into<String>) -> Self {
        self.add(BatchRequest::delete(uri))
    }

    /// Opens a changeset; later requests join it until it is ended.
    pub fn begin_changeset(mut self) -> Self {
        self.close_open();
        self.open = Some(Changeset::default());
        self
    }

    /// Closes the open changeset. Does nothing when none is open.
    pub fn end_changeset(mut self) -> Self {
        self.close_open();
        self
    }

    /// Adds a transactional changeset to the batch.
    ///
    /// All requests in the changeset succeed or fail together.
    ///
    /// # Example
    ///
    /// ```ignore
    /// Batch::new()
    ///     .changeset(|cs| {
    ///         let person = cs.add(BatchRequest::post("People", person));
    ///         cs.add(BatchRequest::post("Trips", trip.bind_ref("Traveler", &person)));
    ///     });
    /// ```
    pub fn changeset<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ChangesetBuilder),
    {
        self.close_open();
        let mut builder = ChangesetBuilder::new(self.next_content_id);
        build(&mut builder);
        self.next_content_id = builder.next_content_id;
        self.items.push(BatchItem::Changeset(builder.build()));
        self
    }

    fn close_open(&mut self) {
        if let Some(changeset) = self.open.take() {
            self.items.push(BatchItem::Changeset(changeset));
        }
    }

    /// Changeset members get a Content-ID so later requests can refer to them.
    fn assign_content_id(&mut self, mut request: BatchRequest) -> BatchRequest {
        if request.content_id.is_none() {
            request.content_id = Some(self.next_content_id.to_string());
            self.next_content_id += 1;
        }
        request
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Closed items in call order.
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    /// The changeset still accepting requests, if any. It follows every item.
    pub fn open_changeset(&self) -> Option<&Changeset> {
        self.open.as_ref()
    }

    /// Validates the batch.
    ///
    /// Returns an error if the batch exceeds the maximum of 1000 requests.
    pub fn validate(&self) -> Result<(), Error> {
        let count = self.request_count();
        if count > MAX_BATCH_REQUESTS {
            return Err(Error::BatchSizeExceeded {
                count,
                max: MAX_BATCH_REQUESTS,
            });
        }
        Ok(())
    }

    /// Counts the total number of requests (including within changesets).
    pub fn request_count(&self) -> usize {
        let closed: usize = self
            .items
            .iter()
            .map(|item| match item {
                BatchItem::Request(_) => 1,
                BatchItem::Changeset(cs) => cs.requests.len(),
            })
            .sum();
        closed + self.open.as_ref().map_or(0, |cs| cs.requests.len())
    }

    /// Returns true if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.open.is_none()
    }

    /// Returns the number of items (requests + changesets) in the batch.
    pub fn len(&self) -> usize {
        self.items.len() + usize::from(self.open.is_some())
    }
}

// =============================================================================
// Changeset Builder
// =============================================================================

/// Builder for changesets - only allows adding requests (not nested changesets).
pub struct ChangesetBuilder {
    requests: Vec<BatchRequest>,
    next_content_id: u32,
}

impl ChangesetBuilder {
    pub(crate) fn new(next_content_id: u32) -> Self {
        Self {
            requests: Vec::new(),
            next_content_id,
        }
    }

    /// Adds a request and returns a [`ContentIdRef`] for referencing its result.
    ///
    /// The returned reference can be used with [`Record::bind_ref()`] to bind
    /// a navigation property to the result of this request, or as the start
    /// of a later request URI.
    ///
    /// [`Record::bind_ref()`]: crate::model::Record::bind_ref
    pub fn add(&mut self, mut request: BatchRequest) -> ContentIdRef {
        let content_id = match request.content_id.clone() {
            Some(id) => id,
            None => {
                let id = self.next_content_id.to_string();
                self.next_content_id += 1;
                request.content_id = Some(id.clone());
                id
            }
        };

        self.requests.push(request);
        ContentIdRef(format!("${}", content_id))
    }

    pub(crate) fn build(self) -> Changeset {
        Changeset {
            requests: self.requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_items_follow_call_order() {
        let batch = Batch::new()
            .get("People")
            .begin_changeset()
            .post("People", json!({"UserName": "a"}))
            .end_changeset()
            .delete("People('b')");

        let items = batch.items();
        assert_eq!(items.len(), 3);
        assert!(batch.open_changeset().is_none());
        assert!(matches!(&items[0], BatchItem::Request(r) if r.method == Method::Get));
        assert!(matches!(&items[1], BatchItem::Changeset(cs) if cs.requests.len() == 1));
        assert!(matches!(&items[2], BatchItem::Request(r) if r.method == Method::Delete));
    }

    #[test]
    fn test_begin_closes_open_changeset() {
        let batch = Batch::new()
            .begin_changeset()
            .delete("People('a')")
            .begin_changeset()
            .delete("People('b')")
            .delete("People('c')");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.request_count(), 3);
    }

    #[test]
    fn test_changeset_content_ids() {
        let mut first = None;
        let batch = Batch::new().changeset(|cs| {
            first = Some(cs.add(BatchRequest::post("People", json!({}))));
            cs.add(BatchRequest::post("$1/Trips", json!({})));
        });

        assert_eq!(first.unwrap().as_ref_string(), "$1");
        let BatchItem::Changeset(cs) = &batch.items[0] else {
            panic!("expected a changeset");
        };
        assert_eq!(cs.requests[1].content_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_validate_limit() {
        let mut batch = Batch::new();
        for i in 0..=MAX_BATCH_REQUESTS {
            batch = batch.get(format!("People({})", i));
        }
        assert!(matches!(
            batch.validate(),
            Err(Error::BatchSizeExceeded { count: 1001, max: 1000 })
        ));
    }
}
