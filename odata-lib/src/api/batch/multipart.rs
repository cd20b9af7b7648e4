//! Multipart MIME request builder for batch operations.

use std::fmt::Write;

use uuid::Uuid;

use super::Batch;
use super::BatchItem;
use super::BatchRequest;
use super::Changeset;
use crate::error::Error;

/// Supplies boundary tokens for batch framing.
///
/// Every call must return a token that is unique within the document.
pub trait BoundaryGenerator: Send + Sync {
    /// Returns a boundary starting with `prefix` (`batch` or `changeset`).
    fn generate(&self, prefix: &str) -> String;
}

/// Generates `<prefix>_<uuid v4>` boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidBoundary;

impl BoundaryGenerator for UuidBoundary {
    fn generate(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }
}

/// A batch serialised for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBatch {
    pub boundary: String,
    pub body: Vec<u8>,
}

impl CompiledBatch {
    /// Value of the `Content-Type` header for the `$batch` request.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }
}

/// Builds the multipart batch request body.
///
/// Relative request URIs are resolved against `base_url`; URIs starting with
/// `$` refer to an earlier Content-ID and are written as-is.
pub fn compile(
    batch: &Batch,
    base_url: &str,
    boundaries: &dyn BoundaryGenerator,
) -> Result<CompiledBatch, Error> {
    batch.validate()?;

    let boundary = boundaries.generate("batch");
    let mut body = String::new();

    for item in &batch.items {
        match item {
            BatchItem::Request(request) => {
                write_request(&mut body, &boundary, request, base_url)?;
            }
            BatchItem::Changeset(changeset) => {
                write_changeset(&mut body, &boundary, changeset, base_url, boundaries)?;
            }
        }
    }
    if let Some(changeset) = &batch.open {
        write_changeset(&mut body, &boundary, changeset, base_url, boundaries)?;
    }

    let _ = write!(body, "--{}--\r\n", boundary);

    Ok(CompiledBatch {
        boundary,
        body: body.into_bytes(),
    })
}

fn write_changeset(
    body: &mut String,
    boundary: &str,
    changeset: &Changeset,
    base_url: &str,
    boundaries: &dyn BoundaryGenerator,
) -> Result<(), Error> {
    let cs_boundary = boundaries.generate("changeset");
    if cs_boundary == boundary {
        return Err(Error::compile(format!(
            "changeset boundary '{}' collides with the batch boundary",
            cs_boundary
        )));
    }

    let _ = write!(body, "--{}\r\n", boundary);
    let _ = write!(
        body,
        "Content-Type: multipart/mixed; boundary={}\r\n\r\n",
        cs_boundary
    );

    for request in &changeset.requests {
        write_request(body, &cs_boundary, request, base_url)?;
    }

    let _ = write!(body, "--{}--\r\n", cs_boundary);
    Ok(())
}

/// Writes one `application/http` part framed by `boundary`.
fn write_request(
    body: &mut String,
    boundary: &str,
    request: &BatchRequest,
    base_url: &str,
) -> Result<(), Error> {
    let _ = write!(body, "--{}\r\n", boundary);
    body.push_str("Content-Type: application/http\r\n");
    body.push_str("Content-Transfer-Encoding: binary\r\n");
    if let Some(id) = &request.content_id {
        let _ = write!(body, "Content-ID: {}\r\n", id);
    }
    body.push_str("\r\n");

    let _ = write!(
        body,
        "{} {} HTTP/1.1\r\n",
        request.method,
        request_url(&request.uri, base_url)
    );
    body.push_str("Accept: application/json\r\n");
    for (name, value) in &request.headers {
        let _ = write!(body, "{}: {}\r\n", name, value);
    }

    let json = request.body.as_ref().map(serde_json::to_string).transpose()?;
    if let Some(json) = &json {
        body.push_str("Content-Type: application/json\r\n");
        let _ = write!(body, "Content-Length: {}\r\n", json.len());
    }
    body.push_str("\r\n");

    if let Some(json) = json {
        body.push_str(&json);
    }
    body.push_str("\r\n");

    Ok(())
}

fn request_url(uri: &str, base_url: &str) -> String {
    if uri.starts_with('$') || uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        uri.trim_start_matches('/')
    )
}
