//! Query construction for the daltek pipeline
//!
//! [`QueryBuilder`] turns a declarative [`QuerySpec`](daltek_ir::QuerySpec)
//! into SQL text, either with values inlined or as a parameterized
//! [`SqlStatement`]. Execution lives behind the [`RowSource`] trait.

use daltek_ir::DaltekError;
use thiserror::Error;

mod builder;
mod source;

pub use builder::{QueryBuilder, SqlStatement};
pub use source::{RowSource, StaticRowSource};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("malformed query specification")]
    Malformed,

    #[error("Field 'from' is required")]
    MissingFrom,

    #[error("{clause} must be an integer, got {value}")]
    InvalidNumber { clause: &'static str, value: String },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsafe identifier: {0}")]
    UnsafeIdentifier(String),

    #[error("Operator {operator} expects {expected}")]
    BadOperand {
        operator: String,
        expected: &'static str,
    },

    #[error("Query execution failed: {0}")]
    Execution(String),
}

impl From<QueryError> for DaltekError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Malformed => DaltekError::InvalidInput(err.to_string()),
            QueryError::Execution(msg) => DaltekError::Execution(msg),
            other => DaltekError::InvalidSpec(other.to_string()),
        }
    }
}
