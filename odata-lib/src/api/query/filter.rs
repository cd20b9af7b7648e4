//! Fluent filter construction shared by every builder that owns clauses.

use crate::error::Error;
use crate::model::Value;

use super::Boolean;
use super::Clause;
use super::Condition;
use super::LambdaKind;
use super::Operator;
use super::OperatorKind;
use super::StringFunction;

/// Clause-building methods for [`QueryBuilder`](super::QueryBuilder),
/// [`ExpandBuilder`](super::ExpandBuilder) and [`FilterBuilder`].
///
/// Every `filter_*` method joins with `and`; its `or_filter_*` counterpart
/// joins with `or`. Invalid operator and value combinations do not panic:
/// the first one is recorded and returned by the terminal operation.
///
/// # Example
///
/// ```
/// use odata_lib::api::query::FilterBuilder;
/// use odata_lib::api::query::Filterable;
///
/// let filter = FilterBuilder::new()
///     .filter("Status", "Open")
///     .filter_op("Total", ">", 100)
///     .or_filter_nested(|q| q.filter_null("ClosedAt").filter("Priority", 1));
///
/// assert_eq!(
///     filter.to_odata().unwrap(),
///     "Status eq 'Open' and Total gt 100 or (ClosedAt eq null and Priority eq 1)"
/// );
/// ```
pub trait Filterable: Sized {
    #[doc(hidden)]
    fn clauses_mut(&mut self) -> &mut Vec<Clause>;

    #[doc(hidden)]
    fn error_slot(&mut self) -> &mut Option<Error>;

    /// `column eq value`; a null value becomes `column eq null`.
    fn filter(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_op(column, "eq", value)
    }

    fn or_filter(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.or_filter_op(column, "eq", value)
    }

    /// `column op value` with `op` looked up in the operator table
    /// (`=`, `!=`, `<>`, `>=`, `gt`, `contains`, ...).
    ///
    /// An unknown operator with a null value is read as a null check.
    fn filter_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        let condition = comparison(column.into(), operator, value.into());
        push(self, Boolean::And, condition)
    }

    fn or_filter_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        let condition = comparison(column.into(), operator, value.into());
        push(self, Boolean::Or, condition)
    }

    /// `function(column,value)`, e.g. `startswith(Name,'A')`.
    fn filter_fn(
        self,
        function: StringFunction,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let condition = Condition::Function {
            function,
            column: column.into(),
            value: value.into(),
        };
        push(self, Boolean::And, Ok(condition))
    }

    fn or_filter_fn(
        self,
        function: StringFunction,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let condition = Condition::Function {
            function,
            column: column.into(),
            value: value.into(),
        };
        push(self, Boolean::Or, Ok(condition))
    }

    /// Compares two properties: `first op second`.
    fn filter_column(
        self,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Self {
        let condition = column_comparison(first.into(), operator, second.into());
        push(self, Boolean::And, condition)
    }

    fn or_filter_column(
        self,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Self {
        let condition = column_comparison(first.into(), operator, second.into());
        push(self, Boolean::Or, condition)
    }

    fn filter_null(self, column: impl Into<String>) -> Self {
        push(self, Boolean::And, Ok(null_check(column.into(), false)))
    }

    fn or_filter_null(self, column: impl Into<String>) -> Self {
        push(self, Boolean::Or, Ok(null_check(column.into(), false)))
    }

    fn filter_not_null(self, column: impl Into<String>) -> Self {
        push(self, Boolean::And, Ok(null_check(column.into(), true)))
    }

    fn or_filter_not_null(self, column: impl Into<String>) -> Self {
        push(self, Boolean::Or, Ok(null_check(column.into(), true)))
    }

    /// Membership test, written out as `(column eq v1 or column eq v2)`.
    fn filter_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = membership(column.into(), values, false);
        push(self, Boolean::And, Ok(condition))
    }

    fn or_filter_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = membership(column.into(), values, false);
        push(self, Boolean::Or, Ok(condition))
    }

    fn filter_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = membership(column.into(), values, true);
        push(self, Boolean::And, Ok(condition))
    }

    fn or_filter_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = membership(column.into(), values, true);
        push(self, Boolean::Or, Ok(condition))
    }

    /// Parenthesised group built by `build`.
    fn filter_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        group(self, Boolean::And, build, false)
    }

    fn or_filter_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        group(self, Boolean::Or, build, false)
    }

    /// Negated group: `not (...)`.
    fn filter_not<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        group(self, Boolean::And, build, true)
    }

    fn or_filter_not<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        group(self, Boolean::Or, build, true)
    }

    /// One group holding every `(column, operator, value)` condition joined
    /// with `and`.
    fn filter_all_of<I, C, O, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (C, O, V)>,
        C: Into<String>,
        O: AsRef<str>,
        V: Into<Value>,
    {
        group(self, Boolean::And, |q| all_of(q, conditions), false)
    }

    fn or_filter_all_of<I, C, O, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (C, O, V)>,
        C: Into<String>,
        O: AsRef<str>,
        V: Into<Value>,
    {
        group(self, Boolean::Or, |q| all_of(q, conditions), false)
    }

    /// `navigation/any(v: ...)`: at least one related entity matches.
    ///
    /// Properties named inside `build` refer to the related entity.
    fn filter_any<F>(self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        lambda(self, Boolean::And, navigation.into(), LambdaKind::Any, build)
    }

    fn or_filter_any<F>(self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        lambda(self, Boolean::Or, navigation.into(), LambdaKind::Any, build)
    }

    /// `navigation/all(v: ...)`: every related entity matches.
    fn filter_all<F>(self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        lambda(self, Boolean::And, navigation.into(), LambdaKind::All, build)
    }

    fn or_filter_all<F>(self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FilterBuilder) -> FilterBuilder,
    {
        lambda(self, Boolean::Or, navigation.into(), LambdaKind::All, build)
    }

    /// Expression emitted as-is.
    fn filter_raw(self, expression: impl Into<String>) -> Self {
        push(self, Boolean::And, Ok(Condition::Raw(expression.into())))
    }

    fn or_filter_raw(self, expression: impl Into<String>) -> Self {
        push(self, Boolean::Or, Ok(Condition::Raw(expression.into())))
    }
}

/// Standalone clause list, handed to the closures of
/// [`filter_nested`](Filterable::filter_nested) and friends.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<Clause>,
    error: Option<Error>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Splits into the clauses built so far and the first recorded error.
    pub fn into_parts(self) -> (Vec<Clause>, Option<Error>) {
        (self.clauses, self.error)
    }

    /// Renders the `$filter` body, or the first recorded error.
    pub fn to_odata(self) -> Result<String, Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(super::compile_filter(&self.clauses)),
        }
    }
}

impl Filterable for FilterBuilder {
    fn clauses_mut(&mut self) -> &mut Vec<Clause> {
        &mut self.clauses
    }

    fn error_slot(&mut self) -> &mut Option<Error> {
        &mut self.error
    }
}

/// Records `error` unless an earlier one is already held.
pub(crate) fn record_error<T: Filterable>(target: &mut T, error: Error) {
    let slot = target.error_slot();
    if slot.is_none() {
        *slot = Some(error);
    }
}

fn push<T: Filterable>(mut target: T, boolean: Boolean, condition: Result<Condition, Error>) -> T {
    match condition {
        Ok(condition) => target.clauses_mut().push(Clause::new(boolean, condition)),
        Err(error) => record_error(&mut target, error),
    }
    target
}

fn group<T, F>(mut target: T, boolean: Boolean, build: F, negated: bool) -> T
where
    T: Filterable,
    F: FnOnce(FilterBuilder) -> FilterBuilder,
{
    let (clauses, error) = build(FilterBuilder::new()).into_parts();
    if let Some(error) = error {
        record_error(&mut target, error);
    }
    push(target, boolean, Ok(Condition::Nested { clauses, negated }))
}

fn lambda<T, F>(mut target: T, boolean: Boolean, navigation: String, kind: LambdaKind, build: F) -> T
where
    T: Filterable,
    F: FnOnce(FilterBuilder) -> FilterBuilder,
{
    let (clauses, error) = build(FilterBuilder::new()).into_parts();
    if let Some(error) = error {
        record_error(&mut target, error);
    }
    let condition = Condition::Lambda {
        navigation,
        kind,
        clauses,
    };
    push(target, boolean, Ok(condition))
}

fn all_of<I, C, O, V>(mut builder: FilterBuilder, conditions: I) -> FilterBuilder
where
    I: IntoIterator<Item = (C, O, V)>,
    C: Into<String>,
    O: AsRef<str>,
    V: Into<Value>,
{
    for (column, operator, value) in conditions {
        builder = builder.filter_op(column, operator.as_ref(), value);
    }
    builder
}

fn null_check(column: String, negated: bool) -> Condition {
    Condition::Null { column, negated }
}

fn membership<I, V>(column: String, values: I, negated: bool) -> Condition
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Condition::In {
        column,
        values: values.into_iter().map(Into::into).collect(),
        negated,
    }
}

fn comparison(column: String, operator: &str, value: Value) -> Result<Condition, Error> {
    let kind = match operator.parse::<OperatorKind>() {
        Ok(kind) => kind,
        Err(_) if value.is_null() => return Ok(null_check(column, false)),
        Err(_) => {
            return Err(Error::InvalidOperator {
                column,
                operator: operator.to_string(),
            });
        }
    };

    match kind {
        OperatorKind::Comparison(Operator::Eq) if value.is_null() => Ok(null_check(column, false)),
        OperatorKind::Comparison(Operator::Ne) if value.is_null() => Ok(null_check(column, true)),
        _ if value.is_null() => Err(Error::IllegalOperatorAndValue {
            column,
            operator: operator.to_string(),
        }),
        OperatorKind::Comparison(operator) => Ok(Condition::Basic {
            column,
            operator,
            value,
        }),
        OperatorKind::Function(function) => Ok(Condition::Function {
            function,
            column,
            value,
        }),
    }
}

fn column_comparison(first: String, operator: &str, second: String) -> Result<Condition, Error> {
    match operator.parse::<Operator>() {
        Ok(operator) => Ok(Condition::Column {
            first,
            operator,
            second,
        }),
        Err(_) => Err(Error::InvalidOperator {
            column: first,
            operator: operator.to_string(),
        }),
    }
}
