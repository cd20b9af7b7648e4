//! Query and batch APIs

pub mod batch;
pub mod query;

pub use batch::*;
