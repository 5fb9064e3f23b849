//! Cross-checks a mapper configuration against the columns it will run on

use daltek_ir::{AggFunc, ColumnMeta, ColumnType, FilterOp, MapperConfig, Table, TransformConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{OperationRegistry, ValidationReport};

const LARGE_DATASET_ROWS: usize = 10_000;

/// Summary of a table's shape used for chart compatibility
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataShape {
    #[serde(default)]
    pub num_columns: usize,
    #[serde(default)]
    pub num_rows: usize,
    #[serde(default)]
    pub has_numeric: bool,
    #[serde(default)]
    pub numeric_columns: usize,
}

impl DataShape {
    pub fn of(table: &Table) -> Self {
        let numeric_columns = (0..table.width())
            .filter(|&i| ColumnType::infer(table.column_values(i)) == ColumnType::Numeric)
            .count();
        Self {
            num_columns: table.width(),
            num_rows: table.row_count(),
            has_numeric: numeric_columns > 0,
            numeric_columns,
        }
    }
}

#[derive(Default)]
pub struct MappingValidator {
    registry: OperationRegistry,
}

impl MappingValidator {
    pub fn new(registry: OperationRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Aggregations valid for a type name such as `"Currency"` or `"varchar"`
    pub fn compatible_aggregations(&self, column_type: &str) -> Vec<String> {
        self.registry
            .compatible_aggregations(ColumnType::classify(column_type))
            .iter()
            .map(AggFunc::name)
            .collect()
    }

    pub fn compatible_operators(&self, column_type: &str) -> Vec<String> {
        self.registry
            .compatible_operators(ColumnType::classify(column_type))
            .iter()
            .map(|op| op.as_str().to_string())
            .collect()
    }

    pub fn validate_aggregation_compatibility(&self, column_type: &str, func: &str) -> bool {
        func.parse::<AggFunc>()
            .map(|f| self.registry.supports_aggregation(ColumnType::classify(column_type), f))
            .unwrap_or(false)
    }

    pub fn validate_filter_operator(&self, column_type: &str, operator: &str) -> bool {
        operator
            .parse::<FilterOp>()
            .map(|op| op.is_null_check() || self.registry.supports_operator(ColumnType::classify(column_type), op))
            .unwrap_or(false)
    }

    /// Check every column the transformations reference, and the type
    /// compatibility of each aggregation and filter.
    ///
    /// Axis columns missing from both the data and the aggregation aliases
    /// only produce warnings, since they may be calculated later.
    pub fn validate_mapping(&self, config: &MapperConfig, columns: &[ColumnMeta]) -> ValidationReport {
        let by_name: HashMap<&str, &ColumnMeta> = columns.iter().map(|c| (c.name.as_str(), c)).collect();
        let t = &config.transformations;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for col in &t.group_by {
            if !by_name.contains_key(col.as_str()) {
                errors.push(format!("Column '{}' in group_by does not exist", col));
            }
        }

        for (alias, agg) in &t.aggregations {
            let Some(meta) = by_name.get(agg.column.as_str()) else {
                errors.push(format!(
                    "Column '{}' in aggregation '{}' does not exist",
                    agg.column, alias
                ));
                continue;
            };
            let supported = agg
                .function()
                .is_ok_and(|func| self.registry.supports_aggregation(meta.column_type, func));
            if !supported {
                errors.push(format!(
                    "Aggregation '{}' is not compatible with type '{}' for column '{}'",
                    agg.func, meta.column_type, agg.column
                ));
            }
        }

        for (i, filter) in t.filters.iter().enumerate() {
            let Some(meta) = by_name.get(filter.column.as_str()) else {
                errors.push(format!("Column '{}' in filter #{} does not exist", filter.column, i + 1));
                continue;
            };
            let supported = filter
                .op()
                .is_ok_and(|op| op.is_null_check() || self.registry.supports_operator(meta.column_type, op));
            if !supported {
                errors.push(format!(
                    "Operator '{}' is not compatible with type '{}' for column '{}'",
                    filter.operator, meta.column_type, filter.column
                ));
            }
        }

        // Sorting runs after aggregation and calculation, so their outputs are valid keys
        if let Some(sort) = &t.sort {
            for col in sort.columns() {
                let known = by_name.contains_key(col.as_str())
                    || t.aggregations.contains_key(&col)
                    || t.calculations.contains_key(&col);
                if !known {
                    errors.push(format!("Column '{}' in sort does not exist", col));
                }
            }
        }

        let (x_axis, y_axes) = config.widget_mapping.axis_columns();
        let missing = |col: &str| !by_name.contains_key(col) && !t.aggregations.contains_key(col);
        if let Some(x) = x_axis.filter(|x| missing(*x)) {
            warnings.push(format!("Column '{}' in x_axis does not exist (calculated column?)", x));
        }
        for y in y_axes.iter().filter(|y| missing(y.as_str())) {
            warnings.push(format!("Column '{}' in y_axes does not exist (calculated column?)", y));
        }

        ValidationReport::new(errors, warnings)
    }

    /// Plain existence check for group_by, aggregation and filter columns
    pub fn validate_columns_exist(&self, config: &TransformConfig, available: &[String]) -> ValidationReport {
        let mut referenced: Vec<&str> = Vec::new();
        let candidates = config
            .group_by
            .iter()
            .chain(config.aggregations.values().map(|a| &a.column))
            .chain(config.filters.iter().map(|f| &f.column));
        for col in candidates {
            if !col.is_empty() && !referenced.contains(&col.as_str()) {
                referenced.push(col);
            }
        }

        let errors = referenced
            .into_iter()
            .filter(|col| !available.iter().any(|a| a == col))
            .map(|col| format!("Column '{}' does not exist in the data", col))
            .collect();
        ValidationReport::new(errors, Vec::new())
    }

    /// Whether a table of the given shape can feed the given chart type
    pub fn validate_chart_compatibility(&self, chart_type: &str, shape: &DataShape) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match chart_type {
            "line" | "bar" | "area" => {
                if shape.num_columns < 2 {
                    errors.push(format!("{} chart requires at least 2 columns (X and Y)", chart_type));
                }
                if !shape.has_numeric {
                    errors.push(format!("{} chart requires at least one numeric column", chart_type));
                }
            }
            "pie" => {
                if shape.num_columns < 2 {
                    errors.push("pie chart requires 2 columns (label and value)".to_string());
                }
                if shape.num_columns > 2 {
                    warnings.push("pie chart only uses 2 columns, extra columns will be ignored".to_string());
                }
            }
            "scatter" => {
                if shape.numeric_columns < 2 {
                    errors.push("scatter chart requires at least 2 numeric columns".to_string());
                }
            }
            "heatmap" => {
                if shape.num_columns < 3 {
                    errors.push("heatmap requires at least 3 columns (X, Y, value)".to_string());
                }
            }
            _ => {}
        }

        if shape.num_rows == 0 {
            errors.push("No data to visualize".to_string());
        } else if shape.num_rows > LARGE_DATASET_ROWS {
            warnings.push(format!(
                "Large dataset ({} rows), rendering may be slow",
                shape.num_rows
            ));
        }

        ValidationReport::new(errors, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<ColumnMeta> {
        serde_json::from_value(json!([
            {"name": "month", "type": "Data"},
            {"name": "amount", "type": "Currency"},
            {"name": "text_col", "type": "Text"},
            {"name": "posted", "type": "Date"}
        ]))
        .unwrap()
    }

    fn config(value: serde_json::Value) -> MapperConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sum_on_text_is_invalid() {
        let validator = MappingValidator::default();
        let cfg = config(json!({"transformations": {
            "aggregations": {"total": {"column": "text_col", "func": "sum"}}
        }}));
        let report = validator.validate_mapping(&cfg, &columns());
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("sum"));
    }

    #[test]
    fn test_unknown_columns_are_errors() {
        let validator = MappingValidator::default();
        let cfg = config(json!({"transformations": {
            "group_by": ["region"],
            "filters": [{"column": "status", "operator": "=", "value": "Paid"}],
            "sort": "nope"
        }}));
        let report = validator.validate_mapping(&cfg, &columns());
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn test_operator_type_check() {
        let validator = MappingValidator::default();
        let cfg = config(json!({"transformations": {
            "filters": [
                {"column": "amount", "operator": "contains", "value": "1"},
                {"column": "amount", "operator": "is_null"},
                {"column": "posted", "operator": "date_before", "value": "2024-01-01"}
            ]
        }}));
        let report = validator.validate_mapping(&cfg, &columns());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("contains"));
    }

    #[test]
    fn test_unknown_function_and_operator_are_reported() {
        let validator = MappingValidator::default();
        let cfg = config(json!({"transformations": {
            "group_by": ["region"],
            "aggregations": {"total": {"column": "amount", "func": "total"}},
            "filters": [{"column": "text_col", "operator": "matches", "value": "a.*"}]
        }}));
        let report = validator.validate_mapping(&cfg, &columns());
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[1].starts_with("Aggregation 'total' is not compatible"));
        assert!(report.errors[2].starts_with("Operator 'matches' is not compatible"));
    }

    #[test]
    fn test_axis_warnings_accept_aliases() {
        let validator = MappingValidator::default();
        let cfg = config(json!({
            "transformations": {
                "group_by": ["month"],
                "aggregations": {"total": {"column": "amount", "func": "sum"}},
                "sort": {"column": "total", "order": "desc"}
            },
            "widget_mapping": {"type": "echart", "x_axis": "month", "y_axes": ["total", "margin"]}
        }));
        let report = validator.validate_mapping(&cfg, &columns());
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("margin"));
    }

    #[test]
    fn test_string_helpers() {
        let validator = MappingValidator::default();
        assert!(validator.validate_aggregation_compatibility("float", "percentile_95"));
        assert!(!validator.validate_aggregation_compatibility("varchar", "avg"));
        assert!(validator.validate_filter_operator("whatever", "is_null"));
        assert!(!validator.validate_filter_operator("int", "starts_with"));
        assert_eq!(validator.compatible_operators("blob"), vec!["=", "!=", "in", "not_in", "is_null", "is_not_null"]);
    }

    #[test]
    fn test_columns_exist() {
        let validator = MappingValidator::default();
        let cfg: TransformConfig = serde_json::from_value(json!({
            "group_by": ["month"],
            "aggregations": {"total": {"column": "amount", "func": "sum"}}
        }))
        .unwrap();
        let report = validator.validate_columns_exist(&cfg, &["month".to_string()]);
        assert_eq!(report.errors, vec!["Column 'amount' does not exist in the data"]);
    }

    #[test]
    fn test_chart_compatibility() {
        let validator = MappingValidator::default();
        let shape = DataShape {
            num_columns: 3,
            num_rows: 5,
            has_numeric: true,
            numeric_columns: 1,
        };
        let pie = validator.validate_chart_compatibility("pie", &shape);
        assert!(pie.is_valid);
        assert_eq!(pie.warnings.len(), 1);

        assert!(!validator.validate_chart_compatibility("scatter", &shape).is_valid);

        let empty = DataShape { num_rows: 0, ..shape.clone() };
        assert!(!validator.validate_chart_compatibility("line", &empty).is_valid);

        let big = DataShape { num_rows: 20_000, ..shape };
        assert_eq!(validator.validate_chart_compatibility("bar", &big).warnings.len(), 1);
    }
}
