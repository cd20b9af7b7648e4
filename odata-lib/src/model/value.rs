//! Value enum for dynamic property values

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use uuid::Uuid;

use super::Record;

/// A dynamic value that can hold any OData primitive or structured value.
///
/// Values are used both as filter operands (rendered as OData literals by the
/// query compiler) and as property values inside a [`Record`].
///
/// # Type Mapping
///
/// | Edm Type | Rust Variant |
/// |----------|--------------|
/// | null | `Null` |
/// | Edm.Boolean | `Bool` |
/// | Edm.Int16, Edm.Int32 | `Int` |
/// | Edm.Int64 | `Long` |
/// | Edm.Double, Edm.Single | `Float` |
/// | Edm.Decimal | `Decimal` |
/// | Edm.String | `String` |
/// | Edm.Guid | `Guid` |
/// | Edm.DateTimeOffset | `DateTime` |
/// | Edm.Date | `Date` |
/// | entity / complex | `Record` |
/// | collection of entities | `Records` |
///
/// # Example
///
/// ```
/// use odata_lib::model::Value;
///
/// let name = Value::from("Contoso");
/// let revenue = Value::from(1_000_000i64);
/// let active = Value::from(true);
/// let empty = Value::Null;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/empty value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// GUID/UUID value.
    Guid(Uuid),
    /// Date and time with timezone.
    DateTime(DateTime<Utc>),
    /// Calendar date without time.
    Date(NaiveDate),
    /// Nested record (single-valued navigation or complex property).
    Record(Box<Record>),
    /// Collection of records (collection-valued navigation property).
    Records(Vec<Record>),
    /// Fallback for JSON that has no richer mapping.
    Json(serde_json::Value),
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Guid(_) => "guid",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Record(_) => "record",
            Value::Records(_) => "records",
            Value::Json(_) => "json",
        }
    }

    /// Converts a decoded JSON value into a `Value`.
    ///
    /// Strings that parse as a UUID or an RFC 3339 timestamp become `Guid` and
    /// `DateTime`; objects become nested records and arrays of objects become
    /// record collections.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Value::Int(small),
                        Err(_) => Value::Long(i),
                    }
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Json(serde_json::Value::Number(n))
                }
            }
            serde_json::Value::String(s) => {
                if let Ok(uuid) = Uuid::parse_str(&s) {
                    Value::Guid(uuid)
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                    Value::DateTime(dt.with_timezone(&Utc))
                } else {
                    Value::String(s)
                }
            }
            serde_json::Value::Array(items) => {
                if !items.is_empty() && items.iter().all(|item| item.is_object()) {
                    Value::Records(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                serde_json::Value::Object(map) => Some(Record::from_json_map(map)),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Value::Json(serde_json::Value::Array(items))
                }
            }
            serde_json::Value::Object(map) => Value::Record(Box::new(Record::from_json_map(map))),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Long(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(Box::new(v))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(5)), Value::Int(5));
        assert_eq!(
            Value::from_json(serde_json::json!(5_000_000_000i64)),
            Value::Long(5_000_000_000)
        );
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_from_json_strings() {
        assert_eq!(
            Value::from_json(serde_json::json!("Contoso")),
            Value::String("Contoso".to_string())
        );
        assert_eq!(
            Value::from_json(serde_json::json!("c2a3c4a5-0000-4000-8000-000000000001")).type_name(),
            "guid"
        );
        assert_eq!(
            Value::from_json(serde_json::json!("2024-03-01T10:00:00Z")).type_name(),
            "datetime"
        );
    }

    #[test]
    fn test_from_json_structured() {
        let nested = Value::from_json(serde_json::json!({"Name": "Lisa"}));
        assert_eq!(nested.type_name(), "record");

        let many = Value::from_json(serde_json::json!([{"Id": 1}, {"Id": 2}]));
        match many {
            Value::Records(records) => assert_eq!(records.len(), 2),
            other => panic!("expected records, got {}", other.type_name()),
        }

        let scalars = Value::from_json(serde_json::json!(["a", "b"]));
        assert_eq!(scalars.type_name(), "json");
    }
}
