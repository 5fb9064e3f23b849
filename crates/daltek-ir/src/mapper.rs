//! Mapper configuration: how a raw query result becomes widget data

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DaltekError;
use crate::types::{AggFunc, FilterOp};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default)]
    pub transformations: TransformConfig,
    #[serde(default)]
    pub widget_mapping: WidgetMapping,
}

/// Transform stages, applied as filter, aggregate, calculate, sort, limit, format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,

    /// Output alias -> source column and function, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub aggregations: IndexMap<String, AggregationSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub calculations: IndexMap<String, CalculationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub formats: IndexMap<String, FormatSpec>,
}

/// Operator and function names stay as written so that an unknown one
/// surfaces as a validation error for that entry rather than rejecting the
/// whole config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(alias = "field")]
    pub column: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl FilterSpec {
    pub fn op(&self) -> Result<FilterOp, DaltekError> {
        self.operator.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub column: String,
    #[serde(alias = "function")]
    pub func: String,
}

impl AggregationSpec {
    pub fn function(&self) -> Result<AggFunc, DaltekError> {
        self.func.parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    Column(String),
    Config {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
        #[serde(default = "default_order")]
        order: String,
    },
}

fn default_order() -> String {
    "asc".to_string()
}

impl SortSpec {
    pub fn columns(&self) -> Vec<String> {
        match self {
            SortSpec::Column(c) => vec![c.clone()],
            SortSpec::Config {
                column, columns, ..
            } => column.iter().chain(columns.iter()).cloned().collect(),
        }
    }

    pub fn ascending(&self) -> bool {
        match self {
            SortSpec::Column(_) => true,
            SortSpec::Config { order, .. } => !order.eq_ignore_ascii_case("desc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Currency,
    Percentage,
    Date,
    Number,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<usize>,
    /// strftime pattern for dates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Target widget shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetMapping {
    #[serde(alias = "chart")]
    Echart {
        #[serde(default = "default_chart_type")]
        chart_type: String,
        #[serde(default)]
        x_axis: Option<String>,
        #[serde(default)]
        y_axes: Vec<String>,
        #[serde(default)]
        chart_config: AxisChartOptions,
    },
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
    Card {
        metric_config: MetricConfig,
    },
    Heatmap {
        x: String,
        y: String,
        value: String,
    },
    Treemap {
        hierarchy: Vec<String>,
        value: String,
    },
    Gauge {
        value_column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_value: Option<f64>,
    },
    Funnel {
        label_column: String,
        value_column: String,
    },
    Sankey {
        source: String,
        target: String,
        value: String,
    },
    /// Unrecognised widget types render as a plain table
    #[serde(other)]
    Other,
}

fn default_chart_type() -> String {
    "line".to_string()
}

impl Default for WidgetMapping {
    fn default() -> Self {
        WidgetMapping::Table { columns: None }
    }
}

impl WidgetMapping {
    pub fn type_name(&self) -> &'static str {
        match self {
            WidgetMapping::Echart { .. } => "echart",
            WidgetMapping::Table { .. } => "table",
            WidgetMapping::Card { .. } => "card",
            WidgetMapping::Heatmap { .. } => "heatmap",
            WidgetMapping::Treemap { .. } => "treemap",
            WidgetMapping::Gauge { .. } => "gauge",
            WidgetMapping::Funnel { .. } => "funnel",
            WidgetMapping::Sankey { .. } => "sankey",
            WidgetMapping::Other => "other",
        }
    }

    /// Columns plotted on the axes, for advisory validation
    pub fn axis_columns(&self) -> (Option<&str>, &[String]) {
        match self {
            WidgetMapping::Echart { x_axis, y_axes, .. } => (x_axis.as_deref(), y_axes.as_slice()),
            _ => (None, &[]),
        }
    }
}

/// Per-series styling for axis charts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisChartOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smooth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub value_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_column: Option<String>,
    #[serde(default = "default_metric_format")]
    pub format: String,
}

fn default_metric_format() -> String {
    "number".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_config() {
        let config: MapperConfig = serde_json::from_value(json!({
            "transformations": {
                "filters": [{"column": "status", "operator": "=", "value": "Paid"}],
                "group_by": ["month"],
                "aggregations": {
                    "total": {"column": "amount", "func": "sum"},
                    "orders": {"column": "id", "func": "count"}
                },
                "sort": {"column": "total", "order": "desc"},
                "limit": 12
            },
            "widget_mapping": {"type": "echart", "chart_type": "bar", "x_axis": "month", "y_axes": ["total"]}
        }))
        .unwrap();

        let t = &config.transformations;
        assert_eq!(t.aggregations.keys().collect::<Vec<_>>(), vec!["total", "orders"]);
        assert_eq!(t.filters[0].op().unwrap(), FilterOp::Eq);
        assert!(!t.sort.as_ref().unwrap().ascending());
        assert_eq!(config.widget_mapping.type_name(), "echart");
    }

    #[test]
    fn test_unknown_names_still_parse() {
        let config: TransformConfig = serde_json::from_value(json!({
            "filters": [{"column": "status", "operator": "matches", "value": "P.*"}],
            "aggregations": {"total": {"column": "amount", "func": "total"}}
        }))
        .unwrap();
        assert_eq!(config.filters[0].op().unwrap_err().kind(), "ValidationError");
        assert!(config.aggregations["total"].function().is_err());
    }

    #[test]
    fn test_default_mapping_is_table() {
        let config: MapperConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.widget_mapping, WidgetMapping::Table { columns: None });
    }

    #[test]
    fn test_unknown_widget_type_falls_back() {
        let mapping: WidgetMapping = serde_json::from_value(json!({"type": "radar"})).unwrap();
        assert_eq!(mapping, WidgetMapping::Other);
    }

    #[test]
    fn test_sort_string_shorthand() {
        let sort: SortSpec = serde_json::from_value(json!("month")).unwrap();
        assert_eq!(sort.columns(), vec!["month"]);
        assert!(sort.ascending());
    }
}
