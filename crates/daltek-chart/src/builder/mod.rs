//! EChart option builders
//!
//! Each builder turns raw chart input (named series plus categories, or
//! name/value items for pie) into a complete EChart option. All of them run
//! the same protocol in [`ChartBuilder::build`]: validate, base config,
//! series, axes, then visual options.

use daltek_ir::value;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::{ChartError, Result, DEFAULT_PALETTE};

mod bar;
mod line;
mod pie;
mod scatter;

pub use bar::BarChartBuilder;
pub use line::LineChartBuilder;
pub use pie::PieChartBuilder;
pub use scatter::ScatterChartBuilder;

/// Visual settings accepted by the builders. Each builder reads the keys it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_position: Option<String>,
    #[serde(default)]
    pub fill_area: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smooth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, rename = "symbolSize", skip_serializing_if = "Option::is_none")]
    pub symbol_size: Option<Value>,
    #[serde(default, rename = "barWidth", skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub show_labels: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xaxis_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaxis_name: Option<String>,
}

/// The closed set of chart types with a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [ChartKind::Bar, ChartKind::Line, ChartKind::Pie, ChartKind::Scatter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
        }
    }

    /// Type names in alphabetical order
    pub fn available() -> Vec<&'static str> {
        Self::ALL.iter().map(ChartKind::as_str).collect()
    }

    pub fn builder(&self) -> Box<dyn ChartBuilder> {
        match self {
            ChartKind::Bar => Box::new(BarChartBuilder),
            ChartKind::Line => Box::new(LineChartBuilder),
            ChartKind::Pie => Box::new(PieChartBuilder),
            ChartKind::Scatter => Box::new(ScatterChartBuilder),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ChartError::UnknownChartType {
                requested: s.to_string(),
                available: Self::available(),
            })
    }
}

/// Look up the builder for a chart type name, ignoring case and surrounding whitespace
pub fn builder_for(chart_type: &str) -> Result<Box<dyn ChartBuilder>> {
    chart_type.parse::<ChartKind>().map(|k| k.builder())
}

pub trait ChartBuilder: Send + Sync {
    fn kind(&self) -> ChartKind;

    /// Every problem found in the input, as readable messages
    fn validate(&self, data: &Value) -> Vec<String>;

    /// Called only after `validate` returned no errors
    fn build_series(&self, data: &Value, config: &BuilderConfig) -> Vec<Value>;

    /// `(xAxis, yAxis)` for charts drawn on axes
    fn axes(&self, _data: &Value, _config: &BuilderConfig) -> Option<(Value, Value)> {
        None
    }

    fn base_config(&self, data: &Value) -> Map<String, Value> {
        let mut base = Map::new();
        base.insert("tooltip".into(), json!({"trigger": "axis"}));
        base.insert("legend".into(), json!({"data": legend_names(data)}));
        base.insert(
            "grid".into(),
            json!({"left": "3%", "right": "4%", "bottom": "3%", "containLabel": true}),
        );
        base
    }

    fn build(&self, data: &Value, config: &BuilderConfig) -> Result<Value> {
        let errors = self.validate(data);
        if !errors.is_empty() {
            return Err(ChartError::Validation(errors));
        }

        let mut option = self.base_config(data);
        option.insert("series".into(), Value::Array(self.build_series(data, config)));
        if let Some((x_axis, y_axis)) = self.axes(data, config) {
            option.insert("xAxis".into(), x_axis);
            option.insert("yAxis".into(), y_axis);
        }
        apply_options(&mut option, config);

        debug!(chart_type = %self.kind(), "built chart option");
        Ok(Value::Object(option))
    }
}

/// Response envelope of a build request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOutcome {
    pub success: bool,
    pub chart_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn new(chart_type: impl Into<String>, data: &Value, result: Result<Value>) -> Self {
        let chart_type = chart_type.into();
        match result {
            Ok(config) => Self {
                success: true,
                chart_type,
                data: Some(data.clone()),
                config: Some(config),
                error: None,
            },
            Err(err) => Self {
                success: false,
                chart_type,
                data: None,
                config: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Resolve the builder, build, and wrap the result
pub fn build_chart(chart_type: &str, data: &Value, config: &BuilderConfig) -> BuildOutcome {
    match builder_for(chart_type) {
        Ok(builder) => BuildOutcome::new(builder.kind().as_str(), data, builder.build(data, config)),
        Err(err) => BuildOutcome::new(chart_type.trim(), data, Err(err)),
    }
}

fn apply_options(option: &mut Map<String, Value>, config: &BuilderConfig) {
    let color = config.colors.clone().unwrap_or_else(|| json!(DEFAULT_PALETTE));
    option.insert("color".into(), color);

    if let Some(title) = &config.title {
        option.insert("title".into(), json!({"text": title, "left": "center"}));
    }
    if let Some(position) = &config.legend_position {
        let legend = option.entry("legend").or_insert_with(|| json!({}));
        if let Value::Object(legend) = legend {
            legend.insert("orient".into(), json!(position));
        }
    }
}

/// Series names as shown in the legend
fn legend_names(data: &Value) -> Vec<Value> {
    data.get("series")
        .and_then(Value::as_array)
        .map(|series| {
            series
                .iter()
                .map(|s| match s.get("name") {
                    Some(name) => json!(series_name(name)),
                    None if s.is_object() => json!(""),
                    None => s.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn series_name(name: &Value) -> String {
    match name {
        Value::String(s) => s.trim().to_string(),
        other => value::display(other),
    }
}

pub(crate) fn is_numeric(v: &Value) -> bool {
    value::coerce_f64(v).is_some()
}

/// Numeric view used after validation; anything unreadable becomes 0
pub(crate) fn ensure_numeric(v: &Value) -> Value {
    value::number(value::coerce_f64(v).unwrap_or(0.0))
}

/// Shared checks for category charts: named numeric series, each as long as `categories`
pub(crate) fn validate_category_series(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let series = match data.get("series") {
        None => {
            errors.push("Missing field 'series'".to_string());
            None
        }
        Some(Value::Array(series)) if !series.is_empty() => Some(series),
        Some(_) => {
            errors.push("'series' must be a non-empty list".to_string());
            None
        }
    };

    let categories = match data.get("categories") {
        None => {
            errors.push("Missing field 'categories'".to_string());
            None
        }
        Some(Value::Array(categories)) if !categories.is_empty() => Some(categories),
        Some(_) => {
            errors.push("'categories' must be a non-empty list".to_string());
            None
        }
    };

    for (i, serie) in series.into_iter().flatten().enumerate() {
        if !serie.is_object() {
            errors.push(format!("Series {} must be an object", i));
            continue;
        }
        let Some(name) = serie.get("name").map(series_name) else {
            errors.push(format!("Series {} is missing 'name'", i));
            continue;
        };
        let points = match serie.get("data") {
            Some(Value::Array(points)) if !points.is_empty() => points,
            Some(_) => {
                errors.push(format!("Series '{}' has empty or invalid 'data'", name));
                continue;
            }
            None => {
                errors.push(format!("Series {} is missing 'data'", i));
                continue;
            }
        };
        if let Some((j, bad)) = points.iter().enumerate().find(|(_, v)| !is_numeric(v)) {
            errors.push(format!(
                "Series '{}' position {}: value '{}' is not numeric",
                name,
                j,
                value::display(bad)
            ));
        }
        if let Some(categories) = categories {
            if categories.len() != points.len() {
                errors.push(format!(
                    "Category count ({}) does not match series '{}' data length ({})",
                    categories.len(),
                    name,
                    points.len()
                ));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_lookup() {
        assert_eq!(builder_for("  LINE ").unwrap().kind(), ChartKind::Line);
        assert_eq!(builder_for("Pie").unwrap().kind(), ChartKind::Pie);

        let err = builder_for("radar").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Chart type 'radar' is not supported. Available types: bar, line, pie, scatter"
        );
    }

    #[test]
    fn test_common_options() {
        let data = json!({"series": [{"name": " Sales ", "data": [1, 2]}], "categories": ["a", "b"]});
        let config: BuilderConfig = serde_json::from_value(json!({
            "title": "Quarterly",
            "legend_position": "horizontal",
            "colors": ["#000000"]
        }))
        .unwrap();
        let option = LineChartBuilder.build(&data, &config).unwrap();
        assert_eq!(option["title"], json!({"text": "Quarterly", "left": "center"}));
        assert_eq!(option["legend"], json!({"data": ["Sales"], "orient": "horizontal"}));
        assert_eq!(option["color"], json!(["#000000"]));

        let option = LineChartBuilder.build(&data, &BuilderConfig::default()).unwrap();
        assert_eq!(option["color"], json!(DEFAULT_PALETTE));
        assert!(option.get("title").is_none());
    }

    #[test]
    fn test_build_outcome_envelope() {
        let data = json!({"data": [{"name": "a", "value": 1}]});
        let ok = serde_json::to_value(build_chart("pie", &data, &BuilderConfig::default())).unwrap();
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["chart_type"], json!("pie"));
        assert_eq!(ok["data"], data);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(build_chart("bar", &json!({}), &BuilderConfig::default())).unwrap();
        assert_eq!(failed["success"], json!(false));
        assert_eq!(
            failed["error"],
            json!("Validation failed: Missing field 'series'; Missing field 'categories'")
        );
        assert!(failed.get("config").is_none());

        let unknown = build_chart("donut", &data, &BuilderConfig::default());
        assert!(!unknown.success);
        assert_eq!(unknown.chart_type, "donut");
    }
}
