//! Entity keys

use uuid::Uuid;

use super::Value;

/// Identifies a single entity within its entity set.
///
/// # Example
///
/// ```
/// use odata_lib::model::EntityKey;
///
/// let by_id = EntityKey::from(5);
/// let by_name = EntityKey::from("russellwhyte");
/// let composite = EntityKey::composite([("OrderId", 1.into()), ("Line", "x".into())]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKey {
    /// Single-property key: `Set(value)`.
    Single(Value),
    /// Multi-property key in declaration order: `Set(k1=v1,k2=v2)`.
    Composite(Vec<(String, Value)>),
}

impl EntityKey {
    /// Creates a composite key from `(property, value)` pairs.
    pub fn composite<K, I>(parts: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Composite(parts.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for EntityKey {
    fn from(v: Value) -> Self {
        Self::Single(v)
    }
}

impl From<i32> for EntityKey {
    fn from(v: i32) -> Self {
        Self::Single(Value::Int(v))
    }
}

impl From<i64> for EntityKey {
    fn from(v: i64) -> Self {
        Self::Single(Value::Long(v))
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        Self::Single(Value::String(v.to_string()))
    }
}

impl From<String> for EntityKey {
    fn from(v: String) -> Self {
        Self::Single(Value::String(v))
    }
}

impl From<Uuid> for EntityKey {
    fn from(v: Uuid) -> Self {
        Self::Single(Value::Guid(v))
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Value); N]> for EntityKey {
    fn from(parts: [(K, Value); N]) -> Self {
        Self::composite(parts)
    }
}

impl From<Vec<(String, Value)>> for EntityKey {
    fn from(parts: Vec<(String, Value)>) -> Self {
        Self::Composite(parts)
    }
}
