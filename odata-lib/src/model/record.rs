//! Dynamic entity record

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Value;
use crate::api::ContentIdRef;
use crate::error::FieldError;

/// A dynamic entity record returned by (or sent to) an OData service.
///
/// Properties are kept in an ordered map in the order the service sent them.
/// Instance annotations (`@odata.etag`, `@odata.id`, `Name@odata.type`, ...)
/// are kept apart from the properties.
///
/// # Example
///
/// ```
/// use odata_lib::model::Record;
///
/// let record = Record::new()
///     .set("FirstName", "Russell")
///     .set("Age", 42);
///
/// assert_eq!(record.get_string("FirstName").unwrap(), Some("Russell"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// The property values, in wire order.
    pub(crate) fields: IndexMap<String, Value>,

    /// Instance and property annotations, keyed by their full JSON name.
    pub(crate) annotations: IndexMap<String, serde_json::Value>,
}

/// Tagged lookup result for a single property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// The record has no such property.
    Absent,
    /// The property is present and explicitly `null`.
    Null,
    /// The property is present with a value.
    Present(&'a Value),
}

impl<'a> Field<'a> {
    /// Returns the value if present and not null.
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Field::Present(v) => Some(v),
            Field::Absent | Field::Null => None,
        }
    }

    /// Returns the type name of the present value (`"absent"`, `"null"` otherwise).
    pub fn type_name(self) -> &'static str {
        match self {
            Field::Absent => "absent",
            Field::Null => "null",
            Field::Present(v) => v.type_name(),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Field::Absent)
    }
}

impl Record {
    /// Creates a new empty record.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Annotation accessors
    // =========================================================================

    /// Returns the `@odata.etag` annotation, if any.
    pub fn etag(&self) -> Option<&str> {
        self.annotation("@odata.etag").and_then(|v| v.as_str())
    }

    /// Returns the `@odata.id` annotation, if any.
    pub fn odata_id(&self) -> Option<&str> {
        self.annotation("@odata.id").and_then(|v| v.as_str())
    }

    /// Returns an annotation by its full name (e.g. `@odata.context`).
    pub fn annotation(&self, name: &str) -> Option<&serde_json::Value> {
        self.annotations.get(name)
    }

    /// Returns all annotations.
    pub fn annotations(&self) -> &IndexMap<String, serde_json::Value> {
        &self.annotations
    }

    /// Sets an annotation. Annotations are not sent back when the record is
    /// serialised, except `@odata.type`.
    pub fn set_annotation(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.annotations.insert(name.into(), value);
    }

    // =========================================================================
    // Raw field access
    // =========================================================================

    /// Looks up a property and reports whether it is absent, null or present.
    pub fn field(&self, name: &str) -> Field<'_> {
        match self.fields.get(name) {
            None => Field::Absent,
            Some(Value::Null) => Field::Null,
            Some(v) => Field::Present(v),
        }
    }

    /// Returns a reference to the property value, if it exists.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns `true` if the record contains the given property.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the properties in order.
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Sets a property value (builder pattern).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Inserts a property value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes a property and returns its value, keeping the order of the rest.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Binds a navigation property to an existing entity (`Nav@odata.bind`).
    ///
    /// ```
    /// use odata_lib::model::Record;
    ///
    /// let trip = Record::new().bind("Airline", "Airlines('AA')");
    /// assert!(trip.contains("Airline@odata.bind"));
    /// ```
    pub fn bind(mut self, navigation: impl Into<String>, target: impl Into<String>) -> Self {
        let bind_key = format!("{}@odata.bind", navigation.into());
        self.fields.insert(bind_key, Value::String(target.into()));
        self
    }

    /// Binds a navigation property to the result of an earlier changeset
    /// request, referenced by its Content-ID (`Nav@odata.bind: "$1"`).
    pub fn bind_ref(self, navigation: impl Into<String>, reference: &ContentIdRef) -> Self {
        self.bind(navigation, reference.as_ref_string())
    }

    // =========================================================================
    // Typed getters
    //
    // Err if the property is missing or has another type.
    // Ok(None) only if the property exists and is Value::Null.
    // =========================================================================

    /// Gets a string property value.
    pub fn get_string(&self, field: &str) -> Result<Option<&str>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(FieldError::type_mismatch(
                field,
                "string",
                other.type_name(),
            )),
        }
    }

    /// Gets a boolean property value.
    pub fn get_bool(&self, field: &str) -> Result<Option<bool>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(FieldError::type_mismatch(field, "bool", other.type_name())),
        }
    }

    /// Gets an i32 property value.
    pub fn get_int(&self, field: &str) -> Result<Option<i32>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(FieldError::type_mismatch(field, "int", other.type_name())),
        }
    }

    /// Gets an i64 property value. Int values widen.
    pub fn get_long(&self, field: &str) -> Result<Option<i64>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Long(n)) => Ok(Some(*n)),
            Some(Value::Int(n)) => Ok(Some(i64::from(*n))),
            Some(other) => Err(FieldError::type_mismatch(field, "long", other.type_name())),
        }
    }

    /// Gets an f64 property value. Integer values widen.
    pub fn get_float(&self, field: &str) -> Result<Option<f64>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Float(n)) => Ok(Some(*n)),
            Some(Value::Int(n)) => Ok(Some(f64::from(*n))),
            Some(other) => Err(FieldError::type_mismatch(field, "float", other.type_name())),
        }
    }

    pub fn get_decimal(&self, field: &str) -> Result<Option<Decimal>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Decimal(d)) => Ok(Some(*d)),
            Some(Value::Int(n)) => Ok(Some(Decimal::from(*n))),
            Some(Value::Long(n)) => Ok(Some(Decimal::from(*n))),
            Some(other) => Err(FieldError::type_mismatch(
                field,
                "decimal",
                other.type_name(),
            )),
        }
    }

    pub fn get_guid(&self, field: &str) -> Result<Option<Uuid>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Guid(g)) => Ok(Some(*g)),
            Some(other) => Err(FieldError::type_mismatch(field, "guid", other.type_name())),
        }
    }

    pub fn get_datetime(&self, field: &str) -> Result<Option<DateTime<Utc>>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::DateTime(dt)) => Ok(Some(*dt)),
            Some(other) => Err(FieldError::type_mismatch(
                field,
                "datetime",
                other.type_name(),
            )),
        }
    }

    /// Gets a date property value. `Edm.Date` arrives as a plain string on
    /// the wire, so `YYYY-MM-DD` strings are accepted too.
    pub fn get_date(&self, field: &str) -> Result<Option<NaiveDate>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Date(d)) => Ok(Some(*d)),
            Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| FieldError::type_mismatch(field, "date", "string")),
            Some(other) => Err(FieldError::type_mismatch(field, "date", other.type_name())),
        }
    }

    /// Gets a nested record (expanded single-valued navigation property).
    pub fn get_record(&self, field: &str) -> Result<Option<&Record>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Record(r)) => Ok(Some(r.as_ref())),
            Some(other) => Err(FieldError::type_mismatch(
                field,
                "record",
                other.type_name(),
            )),
        }
    }

    /// Gets a collection of records (expanded collection navigation property).
    ///
    /// An empty JSON array decodes as `Json([])` and is returned as an empty
    /// slice.
    pub fn get_records(&self, field: &str) -> Result<Option<&[Record]>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Records(r)) => Ok(Some(r.as_slice())),
            Some(Value::Json(serde_json::Value::Array(a))) if a.is_empty() => Ok(Some(&[])),
            Some(other) => Err(FieldError::type_mismatch(
                field,
                "records",
                other.type_name(),
            )),
        }
    }
}
