//! Row source seam: where built SQL turns into rows

use daltek_ir::{value, QuerySpec, Table};
use std::collections::HashMap;
use tracing::debug;

use crate::{QueryError, SqlStatement};

/// Executes a built statement and returns the resulting rows
pub trait RowSource {
    fn fetch(&self, spec: &QuerySpec, statement: &SqlStatement) -> Result<Table, QueryError>;
}

/// In-memory row source keyed by table name, for tests and previews.
///
/// Honors the projection and LIMIT/OFFSET of the `QuerySpec`; WHERE and the
/// other clauses are left to a real database.
#[derive(Debug, Clone, Default)]
pub struct StaticRowSource {
    tables: HashMap<String, Table>,
}

impl StaticRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    pub fn with_table(mut self, name: impl Into<String>, table: Table) -> Self {
        self.add_table(name, table);
        self
    }
}

impl RowSource for StaticRowSource {
    fn fetch(&self, spec: &QuerySpec, statement: &SqlStatement) -> Result<Table, QueryError> {
        let name = spec.from.as_deref().map(str::trim).unwrap_or_default();
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| QueryError::Execution(format!("Table '{}' not found", name)))?;

        let mut result = if spec.select.is_empty() || spec.select.iter().any(|c| c.trim() == "*") {
            table.clone()
        } else {
            table.project(&spec.select)
        };

        let count = |raw: &Option<serde_json::Value>| {
            raw.as_ref()
                .and_then(value::coerce_f64)
                .filter(|f| *f >= 0.0)
                .map(|f| f as usize)
        };
        if let Some(offset) = count(&spec.offset) {
            result = result.take_rows(offset..result.row_count());
        }
        if let Some(limit) = count(&spec.limit) {
            result = result.head(limit);
        }

        debug!(sql = %statement.sql, rows = result.row_count(), "fetched static rows");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryBuilder;
    use serde_json::json;

    fn source() -> StaticRowSource {
        let table = Table::from_records(&[
            json!({"month": "Jan", "sales": 100, "region": "N"}),
            json!({"month": "Feb", "sales": 200, "region": "S"}),
            json!({"month": "Mar", "sales": 300, "region": "N"}),
        ])
        .unwrap();
        StaticRowSource::new().with_table("Sales", table)
    }

    fn fetch(spec: serde_json::Value) -> Result<Table, QueryError> {
        let builder = QueryBuilder::from_json(&spec)?;
        let stmt = builder.build_parameterized()?;
        source().fetch(builder.spec(), &stmt)
    }

    #[test]
    fn test_select_star_returns_everything() {
        let table = fetch(json!({"from": "Sales"})).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.columns, vec!["month", "sales", "region"]);
    }

    #[test]
    fn test_projection_and_limit() {
        let table = fetch(json!({"from": "Sales", "select": ["sales", "month"], "limit": 2, "offset": 1})).unwrap();
        assert_eq!(table.columns, vec!["sales", "month"]);
        assert_eq!(table.rows, vec![vec![json!(200), json!("Feb")], vec![json!(300), json!("Mar")]]);
    }

    #[test]
    fn test_unknown_table() {
        let err = fetch(json!({"from": "Missing"})).unwrap_err();
        assert!(matches!(err, QueryError::Execution(_)));
        assert_eq!(daltek_ir::DaltekError::from(err).kind(), "ExecutionError");
    }
}
