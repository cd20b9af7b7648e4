//! Filter clause tree.

use std::fmt;
use std::str::FromStr;

use crate::model::Value;

/// How a clause joins the clause before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

/// OData comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Enum flag test: `Style has Namespace.Color'Red'`.
    Has,
}

impl Operator {
    /// Returns the OData keyword for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Has => "has",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String functions usable as predicates: `name(column,value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFunction {
    Contains,
    StartsWith,
    EndsWith,
    SubstringOf,
}

impl StringFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFunction::Contains => "contains",
            StringFunction::StartsWith => "startswith",
            StringFunction::EndsWith => "endswith",
            StringFunction::SubstringOf => "substringof",
        }
    }
}

/// Result of looking an operator up in the operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Comparison(Operator),
    Function(StringFunction),
}

/// Returned when an operator is not in the operator table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl FromStr for OperatorKind {
    type Err = UnknownOperator;

    /// Maps SQL-style symbols and OData keywords (case-insensitive) onto
    /// operators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => OperatorKind::Comparison(Operator::Eq),
            "!=" | "<>" | "ne" => OperatorKind::Comparison(Operator::Ne),
            ">" | "gt" => OperatorKind::Comparison(Operator::Gt),
            ">=" | "ge" => OperatorKind::Comparison(Operator::Ge),
            "<" | "lt" => OperatorKind::Comparison(Operator::Lt),
            "<=" | "le" => OperatorKind::Comparison(Operator::Le),
            "has" => OperatorKind::Comparison(Operator::Has),
            "contains" => OperatorKind::Function(StringFunction::Contains),
            "startswith" => OperatorKind::Function(StringFunction::StartsWith),
            "endswith" => OperatorKind::Function(StringFunction::EndsWith),
            "substringof" => OperatorKind::Function(StringFunction::SubstringOf),
            _ => return Err(UnknownOperator(s.to_string())),
        };
        Ok(kind)
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<OperatorKind>()? {
            OperatorKind::Comparison(op) => Ok(op),
            OperatorKind::Function(_) => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// Lambda operator over a collection-valued navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaKind {
    Any,
    All,
}

impl LambdaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LambdaKind::Any => "any",
            LambdaKind::All => "all",
        }
    }
}

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column op value`
    Basic {
        column: String,
        operator: Operator,
        value: Value,
    },
    /// `function(column,value)`
    Function {
        function: StringFunction,
        column: String,
        value: Value,
    },
    /// `first op second`, comparing two properties.
    Column {
        first: String,
        operator: Operator,
        second: String,
    },
    /// `column eq null`, or `column ne null` when negated.
    Null { column: String, negated: bool },
    /// Membership, written out as a disjunction of equalities.
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Parenthesised group, optionally negated with `not`.
    Nested { clauses: Vec<Clause>, negated: bool },
    /// `navigation/any(v: ...)` or `navigation/all(v: ...)`.
    Lambda {
        navigation: String,
        kind: LambdaKind,
        clauses: Vec<Clause>,
    },
    /// Expression passed through untouched.
    Raw(String),
}

/// A condition plus the boolean joining it to the preceding clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub boolean: Boolean,
    pub condition: Condition,
}

impl Clause {
    pub fn new(boolean: Boolean, condition: Condition) -> Self {
        Self { boolean, condition }
    }

    pub fn and(condition: Condition) -> Self {
        Self::new(Boolean::And, condition)
    }

    pub fn or(condition: Condition) -> Self {
        Self::new(Boolean::Or, condition)
    }
}
