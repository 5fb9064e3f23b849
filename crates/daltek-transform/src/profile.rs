use daltek_ir::{value, AggFunc, ColumnMeta, ColumnType, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::aggregate::aggregate_values;
use crate::{require, Result, TransformEngine};

const SAMPLE_SIZE: usize = 3;

/// Summary statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub count: usize,
    pub nulls: usize,
    pub unique: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<Value>,
}

impl TransformEngine {
    /// Profile every column: inferred type, nullability, distinct count and
    /// the first few values.
    pub fn column_metadata(&self, table: &Table) -> Vec<ColumnMeta> {
        table
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnMeta {
                name: name.clone(),
                column_type: ColumnType::infer(table.column_values(i)),
                nullable: table.column_values(i).any(value::is_null),
                unique_count: unique(table, i),
                sample_values: table.column_values(i).take(SAMPLE_SIZE).cloned().collect(),
            })
            .collect()
    }

    /// Counts for any column; min/max/mean/sum only for numeric ones
    pub fn column_stats(&self, table: &Table, column: &str) -> Result<ColumnStats> {
        let idx = require(table, column)?;
        let cells: Vec<&Value> = table.column_values(idx).collect();
        let nulls = cells.iter().filter(|v| value::is_null(v)).count();
        let column_type = ColumnType::infer(cells.iter().copied());

        let numeric = |func: AggFunc| (column_type == ColumnType::Numeric).then(|| aggregate_values(func, &cells));

        Ok(ColumnStats {
            column: column.to_string(),
            column_type,
            count: cells.len() - nulls,
            nulls,
            unique: unique(table, idx),
            min: numeric(AggFunc::Min),
            max: numeric(AggFunc::Max),
            mean: numeric(AggFunc::Mean),
            sum: numeric(AggFunc::Sum),
        })
    }
}

fn unique(table: &Table, index: usize) -> usize {
    table
        .column_values(index)
        .filter(|v| !value::is_null(v))
        .map(value::group_key)
        .collect::<HashSet<_>>()
        .len()
}
