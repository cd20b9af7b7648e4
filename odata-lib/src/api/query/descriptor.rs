//! Query state accumulated by the builders.

use crate::model::EntityKey;

use super::Clause;
use super::Direction;
use super::Expand;

/// Everything a query intends, ready to hand to [`compile`](super::compile).
///
/// Builders own one of these and fill it in call by call; the compiler only
/// reads it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDescriptor {
    pub entity_set: Option<String>,
    /// When set, `$top` and `$count=true` are not emitted.
    pub entity_key: Option<EntityKey>,
    /// Address the `/$count` segment; only `$filter` and custom options apply.
    pub count_only: bool,
    pub select: Vec<String>,
    pub clauses: Vec<Clause>,
    pub expands: Vec<Expand>,
    pub orders: Vec<(String, Direction)>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
    pub skip_token: Option<String>,
    /// Sent as `Prefer: odata.maxpagesize`, never in the URI.
    pub page_size: Option<usize>,
    pub include_count: bool,
    /// Non-system options in insertion order.
    pub custom_options: Vec<(String, String)>,
}

impl QueryDescriptor {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: Some(entity_set.into()),
            ..Self::default()
        }
    }
}
