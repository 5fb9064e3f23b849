//! Table transformations for the daltek pipeline
//!
//! Every operation on [`TransformEngine`] takes a [`Table`] by reference and
//! returns a new one; inputs are never mutated. [`TransformEngine::apply`]
//! runs the configured stages in pipeline order: filter, aggregate,
//! calculate, sort, limit, format.

use daltek_formula::FormulaError;
use daltek_ir::{DaltekError, Table, TransformConfig};
use thiserror::Error;
use tracing::debug;

mod aggregate;
mod derive;
mod filter;
mod format;
mod merge;
mod order;
mod profile;

pub use aggregate::aggregate_values;
pub use derive::{ResampleFreq, RollingFunc};
pub use merge::JoinHow;
pub use profile::ColumnStats;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Column '{0}' does not exist in the data")]
    UnknownColumn(String),

    #[error("Error calculating column '{column}': {source}")]
    Calculation {
        column: String,
        #[source]
        source: FormulaError,
    },

    #[error("Invalid {operation}: {message}")]
    InvalidArgument {
        operation: &'static str,
        message: String,
    },

    /// An aggregation or filter names a function the engine does not know
    #[error(transparent)]
    Unsupported(#[from] DaltekError),
}

impl TransformError {
    pub(crate) fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        TransformError::InvalidArgument {
            operation,
            message: message.into(),
        }
    }
}

impl From<TransformError> for DaltekError {
    fn from(err: TransformError) -> Self {
        if let TransformError::Unsupported(inner) = err {
            return inner;
        }
        match &err {
            TransformError::UnknownColumn(_)
            | TransformError::Calculation {
                source: FormulaError::UnknownColumn(_),
                ..
            } => DaltekError::Validation(err.to_string()),
            _ => DaltekError::InvalidSpec(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;

pub(crate) fn require(table: &Table, column: &str) -> Result<usize> {
    table
        .column_index(column)
        .ok_or_else(|| TransformError::UnknownColumn(column.to_string()))
}

/// Stateless executor for table operations
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformEngine;

impl TransformEngine {
    pub fn new() -> Self {
        TransformEngine
    }

    /// Run the configured stages in order. Empty stages are skipped.
    ///
    /// `limit` overrides `config.limit` when given.
    pub fn apply(&self, table: &Table, config: &TransformConfig, limit: Option<usize>) -> Result<Table> {
        let mut current = table.clone();

        if !config.filters.is_empty() {
            current = self.filter(&current, &config.filters)?;
            debug!(rows = current.row_count(), "filter stage");
        }

        if !config.aggregations.is_empty() {
            current = self.aggregate(&current, &config.group_by, &config.aggregations)?;
            debug!(rows = current.row_count(), "aggregate stage");
        }

        if !config.calculations.is_empty() {
            current = self.calculate(&current, &config.calculations)?;
            debug!(columns = current.width(), "calculate stage");
        }

        if let Some(sort) = &config.sort {
            let columns = sort.columns();
            if !columns.is_empty() {
                current = self.sort(&current, &columns, sort.ascending())?;
                debug!("sort stage");
            }
        }

        if let Some(n) = limit.or(config.limit) {
            current = current.head(n);
        }

        if !config.formats.is_empty() {
            current = self.format_values(&current, &config.formats)?;
            debug!("format stage");
        }

        Ok(current)
    }
}
