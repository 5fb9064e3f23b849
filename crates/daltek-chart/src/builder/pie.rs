use daltek_ir::value;
use serde_json::{json, Map, Value};

use super::{ensure_numeric, is_numeric, BuilderConfig, ChartBuilder, ChartKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct PieChartBuilder;

impl ChartBuilder for PieChartBuilder {
    fn kind(&self) -> ChartKind {
        ChartKind::Pie
    }

    fn validate(&self, data: &Value) -> Vec<String> {
        let items = match data.get("data") {
            None => return vec!["Missing field 'data'".to_string()],
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(_) => return vec!["'data' must be a non-empty list".to_string()],
        };

        let mut errors = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match (item.get("name"), item.get("value")) {
                _ if !item.is_object() => errors.push(format!("Item {} must be an object", i)),
                (Some(name), Some(v)) if !is_numeric(v) => {
                    errors.push(format!("Item '{}': value is not numeric", value::display(name)))
                }
                (Some(_), Some(_)) => {}
                _ => errors.push(format!("Item {} is incomplete (name and value required)", i)),
            }
        }
        errors
    }

    fn build_series(&self, data: &Value, config: &BuilderConfig) -> Vec<Value> {
        let items: Vec<Value> = data["data"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|item| json!({"name": item["name"], "value": ensure_numeric(&item["value"])}))
            .collect();

        let mut serie = json!({
            "name": config.name.as_deref().unwrap_or("Distribution"),
            "type": "pie",
            "radius": config.radius.clone().unwrap_or_else(|| json!("50%")),
            "data": items,
            "emphasis": {"itemStyle": {"shadowBlur": 10, "shadowOffsetX": 0}},
        });
        if config.show_labels {
            serie["label"] = json!({"formatter": "{b}: {c} ({d}%)", "position": "outside"});
        }
        vec![serie]
    }

    fn base_config(&self, data: &Value) -> Map<String, Value> {
        let names: Vec<Value> = data["data"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|item| item.get("name").cloned().unwrap_or_else(|| json!("")))
            .collect();

        let mut base = Map::new();
        base.insert("tooltip".into(), json!({"trigger": "item"}));
        base.insert("legend".into(), json!({"data": names, "orient": "vertical", "left": "left"}));
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pie_option() {
        let data = json!({"data": [{"name": "Chrome", "value": 60}, {"name": "Firefox", "value": "40"}]});
        let option = PieChartBuilder.build(&data, &BuilderConfig::default()).unwrap();

        let series = option["series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["name"], json!("Distribution"));
        assert_eq!(series[0]["data"], json!([{"name": "Chrome", "value": 60}, {"name": "Firefox", "value": 40}]));
        assert!(series[0].get("label").is_none());
        assert!(option.get("xAxis").is_none());
        assert!(option.get("yAxis").is_none());
        assert_eq!(option["legend"]["data"], json!(["Chrome", "Firefox"]));
        assert_eq!(option["tooltip"], json!({"trigger": "item"}));
    }

    #[test]
    fn test_pie_labels_and_errors() {
        let data = json!({"data": [{"name": "a", "value": 1}]});
        let config: BuilderConfig = serde_json::from_value(json!({"show_labels": true, "radius": ["40%", "70%"]})).unwrap();
        let option = PieChartBuilder.build(&data, &config).unwrap();
        assert_eq!(option["series"][0]["label"]["position"], json!("outside"));
        assert_eq!(option["series"][0]["radius"], json!(["40%", "70%"]));

        let bad = json!({"data": [{"name": "a"}, {"name": "b", "value": "lots"}, 3]});
        assert_eq!(
            PieChartBuilder.validate(&bad),
            vec![
                "Item 0 is incomplete (name and value required)",
                "Item 'b': value is not numeric",
                "Item 2 must be an object",
            ]
        );
        assert_eq!(PieChartBuilder.validate(&json!({"data": []})), vec!["'data' must be a non-empty list"]);
    }
}
