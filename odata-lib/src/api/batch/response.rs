//! Batch response parsing.

use crate::error::ApiError;
use crate::error::Error;
use crate::error::parse_odata_error;
use crate::model::Record;

// =============================================================================
// Part Response
// =============================================================================

/// A successful (2xx) sub-response.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPartResponse {
    pub status: u16,
    /// The Content-ID echoed by the service, if any.
    pub content_id: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Decoded JSON body; a non-JSON body is kept as a JSON string.
    pub body: Option<serde_json::Value>,
}

impl BatchPartResponse {
    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decodes an entity body into a [`Record`].
    pub fn record(&self) -> Option<Record> {
        match &self.body {
            Some(serde_json::Value::Object(map)) => Some(Record::from_json_map(map.clone())),
            _ => None,
        }
    }

    /// URI of a created entity, from the `OData-EntityId` or `Location` header.
    pub fn entity_id(&self) -> Option<&str> {
        self.header("OData-EntityId").or_else(|| self.header("Location"))
    }
}

// =============================================================================
// Batch Operation Error
// =============================================================================

/// Error from a single request in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOperationError {
    /// The Content-ID of the failed request, if set.
    pub content_id: Option<String>,
    /// The HTTP status code.
    pub status: u16,
    /// The OData error code, if available.
    pub code: Option<String>,
    /// The error message.
    pub message: String,
}

impl std::fmt::Display for BatchOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref code) = self.code {
            write!(f, "[{}] {}: {}", self.status, code, self.message)
        } else {
            write!(f, "[{}] {}", self.status, self.message)
        }
    }
}

impl std::error::Error for BatchOperationError {}

// =============================================================================
// Batch Item Result
// =============================================================================

/// Result of a single batch item (request or changeset).
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItemResult {
    /// Result of a standalone request.
    Request(Result<BatchPartResponse, BatchOperationError>),
    /// Result of a changeset; the first failing member fails the whole set.
    Changeset(Result<Vec<BatchPartResponse>, BatchOperationError>),
}

// =============================================================================
// Batch Results
// =============================================================================

/// Result of a batch execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResults {
    results: Vec<BatchItemResult>,
}

impl BatchResults {
    /// Parses a multipart batch response.
    pub fn parse(response_body: &str, boundary: &str) -> Result<Self, Error> {
        let mut results = Vec::new();

        for part in split_parts(response_body, boundary) {
            let (mime_headers, _) = split_section(part);
            match extract_boundary_from_header(mime_headers) {
                Some(nested_boundary) => {
                    let changeset = parse_changeset(part, &nested_boundary)?;
                    results.push(BatchItemResult::Changeset(changeset));
                }
                None => {
                    let result = parse_part(part)?;
                    results.push(BatchItemResult::Request(result));
                }
            }
        }

        Ok(BatchResults { results })
    }

    /// Returns the number of items in the batch result.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Checks if all requests succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| match r {
            BatchItemResult::Request(r) => r.is_ok(),
            BatchItemResult::Changeset(r) => r.is_ok(),
        })
    }

    /// Iterator over results.
    pub fn iter(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter()
    }

    /// Gets a standalone request result by item index.
    pub fn request(&self, index: usize) -> Option<&Result<BatchPartResponse, BatchOperationError>> {
        match self.results.get(index)? {
            BatchItemResult::Request(r) => Some(r),
            _ => None,
        }
    }

    /// Gets changeset results by item index.
    pub fn changeset(
        &self,
        index: usize,
    ) -> Option<&Result<Vec<BatchPartResponse>, BatchOperationError>> {
        match self.results.get(index)? {
            BatchItemResult::Changeset(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the results as a vector.
    pub fn into_vec(self) -> Vec<BatchItemResult> {
        self.results
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Splits a multipart body on `--boundary`, dropping preamble and epilogue.
fn split_parts<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let marker = format!("--{}", boundary);
    body.split(marker.as_str())
        .skip(1)
        .take_while(|part| !part.starts_with("--"))
        .map(|part| part.trim_start_matches(['\r', '\n']))
        .filter(|part| !part.trim().is_empty())
        .collect()
}

/// Splits a header block from what follows the first blank line.
fn split_section(text: &str) -> (&str, &str) {
    if let Some(idx) = text.find("\r\n\r\n") {
        (&text[..idx], &text[idx + 4..])
    } else if let Some(idx) = text.find("\n\n") {
        (&text[..idx], &text[idx + 2..])
    } else {
        (text, "")
    }
}

fn header_lines(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Extracts the boundary from a `Content-Type: multipart/mixed` header.
fn extract_boundary_from_header(header_section: &str) -> Option<String> {
    header_section
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, value)| {
            name.trim().eq_ignore_ascii_case("content-type")
                && value.to_ascii_lowercase().contains("multipart/mixed")
        })
        .and_then(|(_, value)| extract_boundary(value))
}

/// Parses a changeset's parts.
fn parse_changeset(
    changeset_part: &str,
    boundary: &str,
) -> Result<Result<Vec<BatchPartResponse>, BatchOperationError>, Error> {
    let mut results = Vec::new();

    for part in split_parts(changeset_part, boundary) {
        match parse_part(part)? {
            Ok(result) => results.push(result),
            Err(e) => return Ok(Err(e)),
        }
    }

    Ok(Ok(results))
}

/// Parses one `application/http` part.
fn parse_part(part: &str) -> Result<Result<BatchPartResponse, BatchOperationError>, Error> {
    let (mime_headers, http) = split_section(part);
    let content_id = header_lines(mime_headers)
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-id"))
        .map(|(_, value)| value);

    let http = http.trim_start_matches(['\r', '\n']);
    let (head, body) = split_section(http);
    let mut head_lines = head.lines();

    let status_line = head_lines
        .next()
        .filter(|line| line.starts_with("HTTP/"))
        .ok_or_else(|| {
            ApiError::parse_with_body("Batch response part is missing its HTTP status line", part)
        })?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ApiError::parse_with_body(format!("Invalid status line '{}'", status_line), part)
        })?;

    let headers = header_lines(&head_lines.collect::<Vec<_>>().join("\n"));
    let body = body.trim();

    if (200..300).contains(&status) {
        let body = if body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.to_string())),
            )
        };
        Ok(Ok(BatchPartResponse {
            status,
            content_id,
            headers,
            body,
        }))
    } else {
        let (code, message) = parse_odata_error(body);
        let message = if message.is_empty() {
            format!("HTTP {} error", status)
        } else {
            message
        };
        Ok(Err(BatchOperationError {
            content_id,
            status,
            code,
            message,
        }))
    }
}

/// Extracts the boundary from a response Content-Type header value.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "--batchresponse_1\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        \r\n\
        HTTP/1.1 200 OK\r\n\
        Content-Type: application/json; odata.metadata=minimal\r\n\
        \r\n\
        {\"UserName\":\"russellwhyte\"}\r\n\
        --batchresponse_1\r\n\
        Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\
        \r\n\
        --changesetresponse_2\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        Content-ID: 1\r\n\
        \r\n\
        HTTP/1.1 201 Created\r\n\
        OData-EntityId: https://host/svc/People('new')\r\n\
        \r\n\
        {\"UserName\":\"new\"}\r\n\
        --changesetresponse_2\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        Content-ID: 2\r\n\
        \r\n\
        HTTP/1.1 204 No Content\r\n\
        \r\n\
        \r\n\
        --changesetresponse_2--\r\n\
        --batchresponse_1\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        \r\n\
        HTTP/1.1 404 Not Found\r\n\
        Content-Type: application/json\r\n\
        \r\n\
        {\"error\":{\"code\":\"NotFound\",\"message\":\"No such person\"}}\r\n\
        --batchresponse_1--\r\n";

    #[test]
    fn test_parse_mixed_response() {
        let results = BatchResults::parse(RESPONSE, "batchresponse_1").unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results.all_succeeded());

        let first = results.request(0).unwrap().as_ref().unwrap();
        assert_eq!(first.status, 200);
        assert_eq!(
            first.record().unwrap().get_string("UserName").unwrap(),
            Some("russellwhyte")
        );

        let changeset = results.changeset(1).unwrap().as_ref().unwrap();
        assert_eq!(changeset.len(), 2);
        assert_eq!(changeset[0].status, 201);
        assert_eq!(changeset[0].content_id.as_deref(), Some("1"));
        assert_eq!(changeset[0].entity_id(), Some("https://host/svc/People('new')"));
        assert_eq!(changeset[1].status, 204);
        assert!(changeset[1].body.is_none());

        let failed = results.request(2).unwrap().as_ref().unwrap_err();
        assert_eq!(failed.status, 404);
        assert_eq!(failed.code.as_deref(), Some("NotFound"));
        assert_eq!(failed.to_string(), "[404] NotFound: No such person");
    }

    #[test]
    fn test_failing_member_fails_changeset() {
        let body = "--b\r\n\
            Content-Type: multipart/mixed; boundary=cs\r\n\
            \r\n\
            --cs\r\n\
            Content-Type: application/http\r\n\
            Content-ID: 1\r\n\
            \r\n\
            HTTP/1.1 400 Bad Request\r\n\
            \r\n\
            \r\n\
            --cs--\r\n\
            --b--\r\n";
        let results = BatchResults::parse(body, "b").unwrap();
        let err = results.changeset(0).unwrap().as_ref().unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.content_id.as_deref(), Some("1"));
        assert_eq!(err.message, "HTTP 400 error");
    }

    #[test]
    fn test_missing_status_line() {
        let body = "--b\r\nContent-Type: application/http\r\n\r\nnot http\r\n--b--\r\n";
        let err = BatchResults::parse(body, "b").unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Parse { .. })));
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=batchresponse_1").as_deref(),
            Some("batchresponse_1")
        );
        assert_eq!(
            extract_boundary("multipart/mixed; Boundary=\"quoted\"").as_deref(),
            Some("quoted")
        );
        assert_eq!(extract_boundary("application/json"), None);
    }
}
