//! Custom serialization for Record.
//!
//! ## Write Format (Serialization)
//!
//! Properties serialize in order with their natural JSON form. `null`
//! properties are kept so a PATCH can clear a value. Of the annotations only
//! `@odata.type` is written, as the first member.
//!
//! ## Read Format (Deserialization)
//!
//! - Keys starting with `@` are instance annotations (`@odata.etag`,
//!   `@odata.context`, `@odata.id`).
//! - Keys with an embedded `@` are property annotations
//!   (`Photo@odata.mediaReadLink`, `Friends@odata.nextLink`).
//! - Everything else is a property, converted with [`Value::from_json`].

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;

use super::Record;
use super::Value;

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let odata_type = self.annotations.get("@odata.type");
        let len = self.fields.len() + usize::from(odata_type.is_some());
        let mut map = serializer.serialize_map(Some(len))?;

        if let Some(odata_type) = odata_type {
            map.serialize_entry("@odata.type", odata_type)?;
        }
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object representing an OData entity")
    }

    fn visit_map<M>(self, mut map: M) -> Result<Record, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut record = Record::new();
        while let Some(key) = map.next_key::<String>()? {
            let value: serde_json::Value = map.next_value()?;
            record.absorb(key, value);
        }
        Ok(record)
    }
}

impl Record {
    /// Builds a record from an already-decoded JSON object.
    pub fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut record = Record::new();
        for (key, value) in map {
            record.absorb(key, value);
        }
        record
    }

    fn absorb(&mut self, key: String, value: serde_json::Value) {
        if key.contains('@') {
            self.annotations.insert(key, value);
        } else {
            self.fields.insert(key, Value::from_json(value));
        }
    }
}

/// Lets a record serve directly as a batch request body.
impl From<Record> for serde_json::Value {
    fn from(record: Record) -> Self {
        serde_json::Value::from(&record)
    }
}

impl From<&Record> for serde_json::Value {
    fn from(record: &Record) -> Self {
        serde_json::to_value(record).unwrap_or_default()
    }
}
