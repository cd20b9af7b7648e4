//! Decoded service responses

use crate::api::query::Page;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Record;
use crate::model::Value;
use crate::transport::TransportResponse;

/// A successful response from the service.
///
/// Non-2xx responses never become an `ODataResponse`: they are turned into
/// [`ApiError::Http`] with the service's error code and message.
///
/// # Example
///
/// ```ignore
/// let response = client.execute(TransportRequest::new(Method::Get, "People('russellwhyte')")).await?;
///
/// if let Some(person) = response.record()? {
///     println!("{:?}", person.get_string("FirstName"));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ODataResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ODataResponse {
    /// Accepts a 2xx transport response, or maps the error body otherwise.
    pub fn from_transport(response: TransportResponse) -> Result<Self, Error> {
        if !response.is_success() {
            return Err(Error::Api(ApiError::from_response(
                response.status,
                &response.body,
            )));
        }
        Ok(Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// URI of a created or updated entity, from the `OData-EntityId` header.
    pub fn entity_id(&self) -> Option<&str> {
        self.header("OData-EntityId").or_else(|| self.header("Location"))
    }

    /// Parses the body as JSON. An empty body (`204 No Content`) is `None`.
    pub fn json(&self) -> Result<Option<serde_json::Value>, Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(|e| self.parse_error(e.to_string()))
    }

    /// Decodes a single-entity body, `None` when the body is empty.
    pub fn record(&self) -> Result<Option<Record>, Error> {
        match self.json()? {
            None => Ok(None),
            Some(serde_json::Value::Object(map)) => Ok(Some(Record::from_json_map(map))),
            Some(other) => Err(self.parse_error(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decodes a collection body (`value` plus paging annotations).
    ///
    /// A single-entity body becomes a one-record page; an empty body an empty
    /// page.
    pub fn page(&self) -> Result<Page, Error> {
        let map = match self.json()? {
            None => return Ok(Page::new(Vec::new())),
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => {
                return Err(self.parse_error(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )));
            }
        };

        let next_link = map
            .get("@odata.nextLink")
            .or_else(|| map.get("odata.nextLink"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let total_count = map
            .get("@odata.count")
            .or_else(|| map.get("odata.count"))
            .and_then(count_value);

        let is_collection = matches!(map.get("value"), Some(serde_json::Value::Array(_)));
        let records = if is_collection {
            let mut map = map;
            match map.remove("value") {
                Some(serde_json::Value::Array(items)) => items.into_iter().map(item_record).collect(),
                _ => Vec::new(),
            }
        } else {
            vec![Record::from_json_map(map)]
        };

        let mut page = Page::new(records);
        if let Some(link) = next_link {
            page = page.with_next_link(link);
        }
        if let Some(count) = total_count {
            page = page.with_total_count(count);
        }
        Ok(page)
    }

    /// Reads a plain-text `/$count` body.
    pub fn count(&self) -> Result<usize, Error> {
        let text = self.text();
        text.trim_start_matches('\u{feff}')
            .trim()
            .parse()
            .map_err(|_| {
                let message = format!("Invalid count response: {}", text.trim());
                Error::Api(ApiError::parse_with_body(message, text.clone()))
            })
    }

    fn parse_error(&self, message: String) -> Error {
        Error::Api(ApiError::parse_with_body(message, self.text()))
    }
}

/// Entities stay records; primitive collection members are wrapped as `{"value": ..}`.
fn item_record(item: serde_json::Value) -> Record {
    match item {
        serde_json::Value::Object(map) => Record::from_json_map(map),
        other => Record::new().set("value", Value::from_json(other)),
    }
}

/// `@odata.count` is a number, or a string under `IEEE754Compatible=true`.
fn count_value(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
