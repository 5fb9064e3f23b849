//! Final preparation of stored EChart options before they reach the browser

use chrono::Utc;
use daltek_ir::{value, WidgetContent, WidgetDto};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::DEFAULT_PALETTE;

/// Chart types the client renders with ECharts
const ECHART_TYPES: [&str; 6] = ["line", "bar", "pie", "scatter", "radar", "gauge"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInfo {
    pub transformed_at: String,
    #[serde(rename = "type")]
    pub render_type: String,
    pub is_echart: bool,
}

/// A widget with its option prepared for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedWidget {
    #[serde(flatten)]
    pub widget: WidgetDto,
    pub render_info: RenderInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EChartTransformer {
    /// Down-sample series longer than `sample_threshold`. Lossy.
    pub optimize_large_series: bool,
    pub sample_threshold: usize,
    pub sample_target: usize,
}

impl Default for EChartTransformer {
    fn default() -> Self {
        Self {
            optimize_large_series: true,
            sample_threshold: 1000,
            sample_target: 500,
        }
    }
}

impl EChartTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sampling(optimize_large_series: bool, sample_threshold: usize, sample_target: usize) -> Self {
        Self {
            optimize_large_series,
            sample_threshold,
            sample_target: sample_target.max(1),
        }
    }

    /// Apply sampling, colour normalisation, tooltip and animation defaults,
    /// and the responsive breakpoints to an EChart option
    pub fn transform_config(&self, config: &Value) -> Value {
        let Value::Object(source) = config else {
            return config.clone();
        };
        let mut option = source.clone();

        if self.optimize_large_series {
            if let Some(Value::Array(series)) = option.get_mut("series") {
                series.iter_mut().for_each(|serie| self.sample_series(serie));
            }
        }
        if let Some(color) = option.get_mut("color") {
            *color = normalize_colors(color);
        }
        if let Some(Value::Object(tooltip)) = option.get_mut("tooltip") {
            tooltip.entry("confine").or_insert(json!(true));
            let text_style = tooltip.entry("textStyle").or_insert_with(|| json!({}));
            if let Value::Object(text_style) = text_style {
                text_style.entry("fontSize").or_insert(json!(12));
            }
        }
        option.entry("animationDuration").or_insert(json!(500));
        option.entry("animationEasing").or_insert(json!("cubicOut"));
        option.insert("responsive".into(), responsive_breakpoints());

        Value::Object(option)
    }

    pub fn transform_widget(&self, widget: &WidgetDto) -> RenderedWidget {
        let mut widget = widget.clone();
        let render_type = match &mut widget.content {
            WidgetContent::Echart { chart_type, config, .. } => {
                if !config.is_null() {
                    *config = self.transform_config(config);
                }
                chart_type.clone()
            }
            _ => widget.widget_type.clone(),
        };

        let render_info = RenderInfo {
            transformed_at: Utc::now().to_rfc3339(),
            is_echart: ECHART_TYPES.contains(&render_type.as_str()),
            render_type,
        };
        RenderedWidget { widget, render_info }
    }

    pub fn transform_batch(&self, widgets: &[WidgetDto]) -> Vec<RenderedWidget> {
        widgets.iter().map(|w| self.transform_widget(w)).collect()
    }

    /// Tabular `{headers, rows, type}` view of a chart's data for export.
    /// Chart types without a tabular form return their data unchanged.
    pub fn export(&self, widget: &WidgetDto) -> Value {
        match &widget.content {
            WidgetContent::Echart { chart_type, data, .. } => export_data(chart_type, data),
            _ => json!({}),
        }
    }

    fn sample_series(&self, serie: &mut Value) {
        let Some(Value::Array(points)) = serie.get_mut("data") else {
            return;
        };
        if points.len() <= self.sample_threshold {
            return;
        }
        let step = (points.len() / self.sample_target).max(1);
        let before = points.len();
        *points = points.iter().step_by(step).cloned().collect();
        debug!(from = before, to = points.len(), step, "sampled large series");
    }
}

/// A string becomes a one-colour list; six-digit hex values get their `#`.
/// Falls back to the default palette when nothing usable remains.
fn normalize_colors(colors: &Value) -> Value {
    let candidates: Vec<&Value> = match colors {
        Value::Array(list) => list.iter().collect(),
        other => vec![other],
    };
    let normalized: Vec<String> = candidates
        .into_iter()
        .filter_map(Value::as_str)
        .map(|c| {
            let c = c.trim();
            if !c.starts_with('#') && c.len() == 6 {
                format!("#{}", c)
            } else {
                c.to_string()
            }
        })
        .collect();

    if normalized.is_empty() {
        json!(DEFAULT_PALETTE)
    } else {
        json!(normalized)
    }
}

fn responsive_breakpoints() -> Value {
    json!({
        "media": [
            {
                "query": "(max-width: 768px)",
                "option": {
                    "grid": {"left": "5%", "right": "5%", "bottom": "10%"},
                    "legend": {"orient": "horizontal", "bottom": "0%"},
                },
            },
            {
                "query": "(min-width: 768px)",
                "option": {"grid": {"left": "3%", "right": "4%", "bottom": "3%"}},
            },
        ]
    })
}

fn list<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn tabular(headers: Vec<Value>, rows: Vec<Value>) -> Value {
    json!({"headers": headers, "rows": rows, "type": "tabular"})
}

fn export_axis(data: &Value) -> Value {
    let series = list(data, "series");
    let mut headers = vec![json!("Category")];
    headers.extend(
        series
            .iter()
            .enumerate()
            .map(|(i, s)| s.get("name").cloned().unwrap_or_else(|| json!(format!("Series {}", i)))),
    );

    let rows = list(data, "categories")
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let mut row = vec![category.clone()];
            row.extend(series.iter().map(|s| list(s, "data").get(i).cloned().unwrap_or(Value::Null)));
            Value::Array(row)
        })
        .collect();
    tabular(headers, rows)
}

fn export_pie(data: &Value) -> Value {
    let items = list(data, "data");
    let amount = |item: &Value| item.get("value").and_then(value::coerce_f64).unwrap_or(0.0);
    let total: f64 = items.iter().map(amount).sum();

    let rows = items
        .iter()
        .map(|item| {
            let share = if total > 0.0 { amount(item) / total * 100.0 } else { 0.0 };
            json!([
                item.get("name").cloned().unwrap_or_else(|| json!("")),
                item.get("value").cloned().unwrap_or_else(|| json!(0)),
                format!("{:.2}%", share),
            ])
        })
        .collect();
    tabular(vec![json!("Name"), json!("Value"), json!("Percentage")], rows)
}

fn export_scatter(data: &Value) -> Value {
    let mut rows = Vec::new();
    for serie in list(data, "series") {
        let name = serie.get("name").cloned().unwrap_or_else(|| json!(""));
        for point in list(serie, "data") {
            if let Some([x, y, ..]) = point.as_array().map(Vec::as_slice) {
                rows.push(json!([name, x, y]));
            }
        }
    }
    tabular(vec![json!("Series"), json!("X"), json!("Y")], rows)
}

/// Tabular export of raw chart data that is not wrapped in a widget
pub fn export_data(chart_type: &str, data: &Value) -> Value {
    match chart_type.trim().to_lowercase().as_str() {
        "line" | "bar" => export_axis(data),
        "pie" => export_pie(data),
        "scatter" => export_scatter(data),
        _ => data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daltek_ir::Position;
    use serde_json::Map;

    fn chart(chart_type: &str, data: Value, config: Value) -> WidgetDto {
        WidgetDto::echart(chart_type, "Chart", Position::default(), data, config)
    }

    #[test]
    fn test_samples_long_series() {
        let points: Vec<usize> = (0..2500).collect();
        let config = json!({"series": [{"name": "big", "data": points}, {"name": "small", "data": [1, 2, 3]}]});

        let out = EChartTransformer::new().transform_config(&config);
        let big = out["series"][0]["data"].as_array().unwrap();
        assert_eq!(big.len(), 500);
        assert_eq!(big[1], json!(5));
        assert_eq!(out["series"][1]["data"], json!([1, 2, 3]));

        let exact = EChartTransformer::with_sampling(false, 1000, 500).transform_config(&config);
        assert_eq!(exact["series"][0]["data"].as_array().unwrap().len(), 2500);
    }

    #[test]
    fn test_config_defaults() {
        let config = json!({
            "color": " ff0000 ",
            "tooltip": {"trigger": "axis", "textStyle": {"color": "#fff"}},
            "animationDuration": 200
        });
        let out = EChartTransformer::new().transform_config(&config);
        assert_eq!(out["color"], json!(["#ff0000"]));
        assert_eq!(out["tooltip"]["confine"], json!(true));
        assert_eq!(out["tooltip"]["textStyle"], json!({"color": "#fff", "fontSize": 12}));
        assert_eq!(out["animationDuration"], json!(200));
        assert_eq!(out["animationEasing"], json!("cubicOut"));
        assert_eq!(out["responsive"]["media"][0]["query"], json!("(max-width: 768px)"));

        let out = EChartTransformer::new().transform_config(&json!({"color": [1, 2]}));
        assert_eq!(out["color"], json!(DEFAULT_PALETTE));
    }

    #[test]
    fn test_render_info() {
        let widgets = vec![
            chart("pie", json!({}), json!({"series": []})),
            WidgetDto::new("table", "Orders", Position::default(), Map::new(), WidgetContent::empty("table")),
        ];
        let rendered = EChartTransformer::new().transform_batch(&widgets);
        assert_eq!(rendered[0].render_info.render_type, "pie");
        assert!(rendered[0].render_info.is_echart);
        assert!(!rendered[1].render_info.is_echart);

        let json = serde_json::to_value(&rendered[0]).unwrap();
        assert_eq!(json["type"], json!("echart"));
        assert_eq!(json["render_info"]["type"], json!("pie"));
        assert_eq!(json["content"]["config"]["animationEasing"], json!("cubicOut"));
    }

    #[test]
    fn test_export_shapes() {
        let t = EChartTransformer::new();
        let line = chart(
            "line",
            json!({"categories": ["Jan", "Feb"], "series": [{"name": "a", "data": [1, 2]}, {"data": [3]}]}),
            json!({}),
        );
        assert_eq!(
            t.export(&line),
            json!({
                "headers": ["Category", "a", "Series 1"],
                "rows": [["Jan", 1, 3], ["Feb", 2, null]],
                "type": "tabular"
            })
        );

        let pie = chart("pie", json!({"data": [{"name": "x", "value": 1}, {"name": "y", "value": 3}]}), json!({}));
        assert_eq!(t.export(&pie)["rows"], json!([["x", 1, "25.00%"], ["y", 3, "75.00%"]]));

        let scatter = chart("scatter", json!({"series": [{"name": "s", "data": [[1, 2], [3]]}]}), json!({}));
        assert_eq!(t.export(&scatter)["rows"], json!([["s", 1, 2]]));

        let gauge = chart("gauge", json!({"value": 7}), json!({}));
        assert_eq!(t.export(&gauge), json!({"value": 7}));
    }
}
