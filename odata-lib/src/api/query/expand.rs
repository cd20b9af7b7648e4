//! OData $expand builder for nested navigation properties.

use crate::error::Error;

use super::Clause;
use super::Direction;
use super::Filterable;
use super::filter::record_error;
use super::grammar::compile_expands;
use super::grammar::compile_filter;
use super::grammar::compile_orders;

/// One navigation property to expand, with its nested query options.
#[derive(Debug, Clone, PartialEq)]
pub struct Expand {
    /// The navigation property name to expand.
    pub navigation_property: String,
    /// Fields to select from the expanded entity.
    pub select: Vec<String>,
    /// Filter to apply to the expanded records.
    pub clauses: Vec<Clause>,
    /// Ordering for the expanded records.
    pub orders: Vec<(String, Direction)>,
    pub skip: Option<usize>,
    /// Maximum number of expanded records to return.
    pub top: Option<usize>,
    /// Nested expands within this expand.
    pub expands: Vec<Expand>,
}

impl Expand {
    pub fn new(navigation_property: impl Into<String>) -> Self {
        Self {
            navigation_property: navigation_property.into(),
            select: Vec::new(),
            clauses: Vec::new(),
            orders: Vec::new(),
            skip: None,
            top: None,
            expands: Vec::new(),
        }
    }

    /// Converts this expand to an OData `$expand` item.
    ///
    /// Returns the full expand expression including nested options.
    pub fn to_odata(&self) -> String {
        let mut parts = Vec::new();

        if !self.select.is_empty() {
            parts.push(format!("$select={}", self.select.join(",")));
        }

        let filter = compile_filter(&self.clauses);
        if !filter.is_empty() {
            parts.push(format!("$filter={}", filter));
        }

        if !self.orders.is_empty() {
            parts.push(format!("$orderby={}", compile_orders(&self.orders)));
        }

        if let Some(skip) = self.skip {
            parts.push(format!("$skip={}", skip));
        }

        if let Some(top) = self.top {
            parts.push(format!("$top={}", top));
        }

        if !self.expands.is_empty() {
            parts.push(format!("$expand={}", compile_expands(&self.expands)));
        }

        if parts.is_empty() {
            self.navigation_property.clone()
        } else {
            format!("{}({})", self.navigation_property, parts.join(";"))
        }
    }
}

/// Builder for constructing OData `$expand` clauses.
///
/// Supports nested query options within the expand, allowing filtering,
/// selecting, and ordering of related records. Filters come from
/// [`Filterable`].
///
/// # Example
///
/// ```
/// use odata_lib::api::query::ExpandBuilder;
/// use odata_lib::api::query::Filterable;
///
/// let expand = ExpandBuilder::new("Trips")
///     .select(["Name", "Budget"])
///     .filter_op("Budget", ">", 1000)
///     .top(5);
///
/// assert_eq!(
///     expand.to_odata().unwrap(),
///     "Trips($select=Name,Budget;$filter=Budget gt 1000;$top=5)"
/// );
/// ```
#[derive(Debug)]
pub struct ExpandBuilder {
    expand: Expand,
    error: Option<Error>,
}

impl ExpandBuilder {
    /// Creates a new expand builder for a navigation property.
    pub fn new(navigation_property: impl Into<String>) -> Self {
        Self {
            expand: Expand::new(navigation_property),
            error: None,
        }
    }

    /// Specifies which fields to select from the expanded entity.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sorts expanded records ascending by `field`, after any earlier ordering.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.expand.orders.push((field.into(), Direction::Asc));
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.expand.orders.push((field.into(), Direction::Desc));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.expand.skip = Some(n);
        self
    }

    /// Limits the number of expanded records returned.
    pub fn top(mut self, n: usize) -> Self {
        self.expand.top = Some(n);
        self
    }

    /// Adds a nested expand within this expand.
    ///
    /// # Example
    ///
    /// ```
    /// use odata_lib::api::query::ExpandBuilder;
    ///
    /// let expand = ExpandBuilder::new("Trips")
    ///     .select(["Name"])
    ///     .expand("PlanItems", |e| e.select(["ConfirmationCode"]));
    ///
    /// assert_eq!(
    ///     expand.to_odata().unwrap(),
    ///     "Trips($select=Name;$expand=PlanItems($select=ConfirmationCode))"
    /// );
    /// ```
    pub fn expand<F>(mut self, navigation_property: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ExpandBuilder) -> ExpandBuilder,
    {
        let (nested, error) = build(ExpandBuilder::new(navigation_property)).into_parts();
        if let Some(error) = error {
            record_error(&mut self, error);
        }
        self.expand.expands.push(nested);
        self
    }

    /// Returns the navigation property name.
    pub fn navigation_property(&self) -> &str {
        &self.expand.navigation_property
    }

    /// Splits into the finished expand and the first recorded error.
    pub fn into_parts(self) -> (Expand, Option<Error>) {
        (self.expand, self.error)
    }

    /// Renders the `$expand` item, or the first recorded error.
    pub fn to_odata(self) -> Result<String, Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.expand.to_odata()),
        }
    }
}

impl Filterable for ExpandBuilder {
    fn clauses_mut(&mut self) -> &mut Vec<Clause> {
        &mut self.expand.clauses
    }

    fn error_slot(&mut self) -> &mut Option<Error> {
        &mut self.error
    }
}
