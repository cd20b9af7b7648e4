//! Query building and compilation.
//!
//! A query is accumulated by [`QueryBuilder`] (or by hand in a
//! [`QueryDescriptor`]) and compiled into a URI relative to the service root
//! by [`compile`]. Results come back as [`Page`]s, read one at a time through
//! [`ODataPages`] or record by record through [`Cursor`].
//!
//! # Shared Types
//!
//! - [`Clause`] - One `$filter` condition with its boolean connective
//! - [`OrderBy`] - Ordering of query results
//! - [`Expand`] - A `$expand` entry with nested options
//! - [`Page`] - A page of query results with pagination info

mod builder;
mod clause;
mod descriptor;
mod expand;
mod filter;
mod grammar;
mod literal;
mod order;
mod page;
mod pages;

pub use builder::QueryBuilder;
pub use clause::Boolean;
pub use clause::Clause;
pub use clause::Condition;
pub use clause::LambdaKind;
pub use clause::Operator;
pub use clause::OperatorKind;
pub use clause::StringFunction;
pub use clause::UnknownOperator;
pub use descriptor::QueryDescriptor;
pub use expand::Expand;
pub use expand::ExpandBuilder;
pub use filter::FilterBuilder;
pub use filter::Filterable;
pub use grammar::compile;
pub use grammar::compile_filter;
pub use grammar::compile_key;
pub use literal::escape_string;
pub use literal::is_iso_datetime;
pub use literal::is_typed_literal;
pub use literal::prepare_value;
pub use literal::string_literal;
pub use order::Direction;
pub use order::OrderBy;
pub use page::Page;
pub use pages::Cursor;
pub use pages::ODataPages;
