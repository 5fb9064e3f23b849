use serde_json::{json, Value};

use super::{ensure_numeric, is_numeric, series_name, BuilderConfig, ChartBuilder, ChartKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScatterChartBuilder;

impl ChartBuilder for ScatterChartBuilder {
    fn kind(&self) -> ChartKind {
        ChartKind::Scatter
    }

    fn validate(&self, data: &Value) -> Vec<String> {
        let series = match data.get("series") {
            None => return vec!["Missing field 'series'".to_string()],
            Some(Value::Array(series)) if !series.is_empty() => series,
            Some(_) => return vec!["'series' must be a non-empty list".to_string()],
        };

        let mut errors = Vec::new();
        for (i, serie) in series.iter().enumerate() {
            let (Some(name), Some(points)) = (serie.get("name"), serie.get("data")) else {
                errors.push(format!("Series {} is incomplete (name and data required)", i));
                continue;
            };
            let name = series_name(name);
            let Some(points) = points.as_array() else {
                errors.push(format!("Series '{}' data must be a list", name));
                continue;
            };
            for (j, point) in points.iter().enumerate() {
                match point.as_array() {
                    Some(xy) if xy.len() >= 2 => {
                        if !(is_numeric(&xy[0]) && is_numeric(&xy[1])) {
                            errors.push(format!("Series '{}' point {}: values are not numeric", name, j));
                        }
                    }
                    _ => errors.push(format!("Series '{}' point {}: must be [x, y]", name, j)),
                }
            }
        }
        errors
    }

    fn build_series(&self, data: &Value, config: &BuilderConfig) -> Vec<Value> {
        let symbol_size = config.symbol_size.clone().unwrap_or_else(|| json!(8));
        data["series"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|serie| {
                let points: Vec<Value> = serie["data"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|p| json!([ensure_numeric(&p[0]), ensure_numeric(&p[1])]))
                    .collect();
                json!({
                    "name": series_name(&serie["name"]),
                    "data": points,
                    "type": "scatter",
                    "symbolSize": symbol_size,
                })
            })
            .collect()
    }

    fn axes(&self, _data: &Value, config: &BuilderConfig) -> Option<(Value, Value)> {
        Some((
            json!({"type": "value", "name": config.xaxis_name.as_deref().unwrap_or("X")}),
            json!({"type": "value", "name": config.yaxis_name.as_deref().unwrap_or("Y")}),
        ))
    }
}
