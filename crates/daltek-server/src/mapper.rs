//! DataMapperService: query result in, widget payload out

use daltek_chart::ChartAdapter;
use daltek_ir::{ColumnMeta, ColumnType, DaltekError, MapperConfig, Table};
use daltek_registry::{MappingValidator, ValidationReport};
use daltek_transform::TransformEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, warn};

pub const DEFAULT_PREVIEW_LIMIT: usize = 100;

/// Rows returned by the query layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(results: Vec<Value>) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformMetadata {
    pub original_rows: usize,
    pub transformed_rows: usize,
    pub columns: Vec<String>,
    /// Seconds with three decimals, e.g. `"0.012s"`
    pub execution_time: String,
}

/// `{success, data, metadata}` or `{success: false, error, error_type}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TransformMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl TransformResponse {
    pub fn failure(err: &DaltekError) -> Self {
        Self {
            success: false,
            data: None,
            metadata: None,
            error: Some(err.to_string()),
            error_type: Some(err.kind().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableOperations {
    pub aggregations: Vec<String>,
    pub operators: Vec<String>,
    pub calculations: Vec<String>,
}

pub struct DataMapperService {
    engine: TransformEngine,
    adapter: ChartAdapter,
    validator: MappingValidator,
    preview_limit: usize,
}

impl Default for DataMapperService {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_LIMIT)
    }
}

impl DataMapperService {
    pub fn new(preview_limit: usize) -> Self {
        Self {
            engine: TransformEngine::new(),
            adapter: ChartAdapter,
            validator: MappingValidator::default(),
            preview_limit,
        }
    }

    /// Run the full pipeline: load, filter, aggregate, calculate, sort,
    /// limit, format, adapt. A caller `limit` overrides the configured one.
    ///
    /// Mapping validation here is advisory: problems are logged, and the
    /// pipeline fails only where a stage itself cannot proceed.
    pub fn transform(&self, query_result: &QueryResult, config: &MapperConfig, limit: Option<usize>) -> TransformResponse {
        let start = Instant::now();
        match self.run(query_result, config, limit) {
            Ok((data, table)) => {
                let metadata = TransformMetadata {
                    original_rows: query_result.results.len(),
                    transformed_rows: table.row_count(),
                    columns: table.columns,
                    execution_time: format!("{:.3}s", start.elapsed().as_secs_f64()),
                };
                debug!(
                    widget = config.widget_mapping.type_name(),
                    original_rows = metadata.original_rows,
                    transformed_rows = metadata.transformed_rows,
                    "transform completed"
                );
                TransformResponse {
                    success: true,
                    data: Some(data),
                    metadata: Some(metadata),
                    error: None,
                    error_type: None,
                }
            }
            Err(err) => {
                error!(widget = config.widget_mapping.type_name(), error = %err, "transform failed");
                TransformResponse::failure(&err)
            }
        }
    }

    /// [`transform`](Self::transform) capped at the preview limit
    pub fn preview(&self, query_result: &QueryResult, config: &MapperConfig) -> TransformResponse {
        self.transform(query_result, config, Some(self.preview_limit))
    }

    fn run(&self, query_result: &QueryResult, config: &MapperConfig, limit: Option<usize>) -> Result<(Value, Table), DaltekError> {
        if !query_result.success {
            let message = query_result.error.clone().unwrap_or_else(|| "Query failed".to_string());
            return Err(DaltekError::Execution(message));
        }
        if query_result.results.is_empty() {
            return Err(DaltekError::Execution("No data to transform".to_string()));
        }

        let table = Table::from_records(&query_result.results)?;
        let report = self
            .validator
            .validate_columns_exist(&config.transformations, &table.columns);
        if !report.is_valid {
            warn!(errors = ?report.errors, "mapping references unknown columns");
        }

        let transformed = self.engine.apply(&table, &config.transformations, limit)?;
        let data = self.adapter.adapt(&transformed, &config.widget_mapping)?;
        Ok((data, transformed))
    }

    pub fn validate_mapping(&self, config: &MapperConfig, columns: &[ColumnMeta]) -> ValidationReport {
        self.validator.validate_mapping(config, columns)
    }

    /// Aggregations, filter operators and calculation helpers for a type
    /// name such as `"Currency"`, `"Data"` or `"Datetime"`
    pub fn get_available_operations(&self, column_type: &str) -> AvailableOperations {
        let operations = self.validator.registry().lookup(ColumnType::classify(column_type));
        AvailableOperations {
            aggregations: self.validator.compatible_aggregations(column_type),
            operators: self.validator.compatible_operators(column_type),
            calculations: operations.calculations.clone(),
        }
    }

    pub fn get_column_metadata(&self, records: &[Value]) -> Result<Vec<ColumnMeta>, DaltekError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let table = Table::from_records(records)?;
        Ok(self.engine.column_metadata(&table))
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit
    }
}
