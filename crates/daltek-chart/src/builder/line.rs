use serde_json::{json, Value};

use super::{ensure_numeric, series_name, validate_category_series, BuilderConfig, ChartBuilder, ChartKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct LineChartBuilder;

impl ChartBuilder for LineChartBuilder {
    fn kind(&self) -> ChartKind {
        ChartKind::Line
    }

    fn validate(&self, data: &Value) -> Vec<String> {
        validate_category_series(data)
    }

    fn build_series(&self, data: &Value, config: &BuilderConfig) -> Vec<Value> {
        let Some(series) = data.get("series").and_then(Value::as_array) else {
            return Vec::new();
        };
        series
            .iter()
            .map(|serie| {
                let points: Vec<Value> = serie["data"].as_array().into_iter().flatten().map(ensure_numeric).collect();
                let mut out = json!({
                    "name": series_name(&serie["name"]),
                    "data": points,
                    "type": "line",
                    "smooth": config.smooth.unwrap_or(true),
                    "symbol": config.symbol.as_deref().unwrap_or("circle"),
                    "symbolSize": config.symbol_size.clone().unwrap_or_else(|| json!(4)),
                });
                if config.fill_area {
                    out["areaStyle"] = json!({"opacity": 0.3});
                }
                out
            })
            .collect()
    }

    fn axes(&self, data: &Value, config: &BuilderConfig) -> Option<(Value, Value)> {
        let x_axis = json!({
            "type": "category",
            "data": data.get("categories").cloned().unwrap_or_else(|| json!([])),
            "boundaryGap": false,
        });
        let mut y_axis = json!({
            "type": "value",
            "name": config.yaxis_name.as_deref().unwrap_or(""),
        });
        if let Some(min) = &config.min {
            y_axis["min"] = ensure_numeric(min);
        }
        if let Some(max) = &config.max {
            y_axis["max"] = ensure_numeric(max);
        }
        Some((x_axis, y_axis))
    }
}
