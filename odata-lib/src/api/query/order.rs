//! Ordering types for OData queries.

use std::str::FromStr;

/// Sort direction for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("Unknown sort direction '{}'", other)),
        }
    }
}

/// Specifies the ordering of query results.
///
/// Multiple properties can be chained together for secondary, tertiary, etc. sorting.
///
/// # Example
///
/// ```
/// use odata_lib::api::query::OrderBy;
///
/// let order = OrderBy::desc("Budget").then_asc("Name");
/// assert_eq!(order.to_odata(), "Budget desc,Name asc");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBy {
    pub(crate) fields: Vec<(String, Direction)>,
}

impl OrderBy {
    /// Creates an ascending order on a property.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Direction::Asc)],
        }
    }

    /// Creates a descending order on a property.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Direction::Desc)],
        }
    }

    /// Adds a secondary ascending order on a property.
    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Direction::Asc));
        self
    }

    /// Adds a secondary descending order on a property.
    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Direction::Desc));
        self
    }

    /// Returns the ordered properties with their directions.
    pub fn fields(&self) -> &[(String, Direction)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the `$orderby` expression.
    pub fn to_odata(&self) -> String {
        super::grammar::compile_orders(&self.fields)
    }
}
