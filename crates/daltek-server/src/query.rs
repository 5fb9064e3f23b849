//! QueryService: SQL generation and saved-query execution

use daltek_ir::{DaltekError, SavedQuery};
use daltek_registry::{QueryCheck, QueryValidator};
use daltek_sql::{QueryBuilder, RowSource, SqlStatement};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows of an executed saved query, with the statement that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedQuery {
    pub query_id: String,
    pub sql: String,
    pub params: Vec<Value>,
    pub results: Vec<Value>,
}

pub struct QueryService {
    source: Arc<dyn RowSource + Send + Sync>,
    saved: Vec<SavedQuery>,
    validator: QueryValidator,
}

impl QueryService {
    pub fn new(source: Arc<dyn RowSource + Send + Sync>) -> Self {
        Self {
            source,
            saved: Vec::new(),
            validator: QueryValidator,
        }
    }

    pub fn with_saved(mut self, queries: Vec<SavedQuery>) -> Self {
        self.saved = queries;
        self
    }

    /// SQL with inlined values
    pub fn build(&self, spec: &Value) -> Result<String, DaltekError> {
        let builder = QueryBuilder::from_json(spec)?;
        let sql = builder.build()?;
        debug!(fingerprint = %builder.spec().fingerprint(), "built query");
        Ok(sql)
    }

    /// SQL with `?` placeholders and ordered parameters
    pub fn build_parameterized(&self, spec: &Value) -> Result<SqlStatement, DaltekError> {
        let builder = QueryBuilder::from_json(spec)?;
        let statement = builder.build_parameterized()?;
        debug!(
            fingerprint = %builder.spec().fingerprint(),
            params = statement.params.len(),
            "built parameterized query"
        );
        Ok(statement)
    }

    pub fn find_saved(&self, id: &str) -> Result<&SavedQuery, DaltekError> {
        self.saved
            .iter()
            .find(|q| q.id.as_deref() == Some(id))
            .ok_or_else(|| DaltekError::NotFound(format!("Saved query '{}' not found", id)))
    }

    /// Build the saved query parameterized and fetch its rows from the row source
    pub fn execute_saved(&self, id: &str) -> Result<ExecutedQuery, DaltekError> {
        let saved = self.find_saved(id)?;
        let builder = QueryBuilder::new(saved.to_query_spec())?;
        let statement = builder.build_parameterized()?;
        let table = self.source.fetch(builder.spec(), &statement)?;

        info!(
            query_id = id,
            name = %saved.name,
            rows = table.row_count(),
            fingerprint = %builder.spec().fingerprint(),
            "executed saved query"
        );
        Ok(ExecutedQuery {
            query_id: id.to_string(),
            sql: statement.sql,
            params: statement.params,
            results: table.to_records(),
        })
    }

    pub fn validate(&self, query: &Value) -> QueryCheck {
        self.validator.validate_query(query)
    }
}
