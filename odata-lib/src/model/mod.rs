//! Entity data model

mod key;
mod record;
mod record_serde;
mod value;

pub use key::*;
pub use record::*;
pub use value::*;
