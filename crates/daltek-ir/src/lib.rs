//! Daltek shared data model
//!
//! Types that cross every stage of the query-to-visualization pipeline:
//! the declarative query spec, the in-flight table, mapper configuration,
//! widget payloads and the shared error taxonomy. All types are plain serde
//! data so they can be logged, fingerprinted and sent over the wire as-is.

mod dto;
mod error;
mod mapper;
mod query;
mod table;
mod types;
pub mod value;

pub use dto::*;
pub use error::{DaltekError, Result};
pub use mapper::*;
pub use query::*;
pub use table::Table;
pub use types::*;
