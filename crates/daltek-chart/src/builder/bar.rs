use serde_json::{json, Value};

use super::{ensure_numeric, series_name, validate_category_series, BuilderConfig, ChartBuilder, ChartKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct BarChartBuilder;

impl ChartBuilder for BarChartBuilder {
    fn kind(&self) -> ChartKind {
        ChartKind::Bar
    }

    fn validate(&self, data: &Value) -> Vec<String> {
        validate_category_series(data)
    }

    fn build_series(&self, data: &Value, config: &BuilderConfig) -> Vec<Value> {
        let bar_width = config.bar_width.clone().unwrap_or_else(|| json!("60%"));
        data.get("series")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|serie| {
                json!({
                    "name": series_name(&serie["name"]),
                    "data": serie["data"].as_array().into_iter().flatten().map(ensure_numeric).collect::<Vec<_>>(),
                    "type": "bar",
                    "barWidth": bar_width,
                })
            })
            .collect()
    }

    fn axes(&self, data: &Value, _config: &BuilderConfig) -> Option<(Value, Value)> {
        let categories = data.get("categories").cloned().unwrap_or_else(|| json!([]));
        Some((json!({"type": "category", "data": categories}), json!({"type": "value"})))
    }
}
