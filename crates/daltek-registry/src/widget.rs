//! Structural checks on widgets before they are stored

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SUPPORTED_WIDGET_TYPES: [&str; 7] = [
    "card",
    "line_chart",
    "bar_chart",
    "pie_chart",
    "table",
    "metric",
    "echart",
];

const REQUIRED_FIELDS: [&str; 2] = ["type", "properties"];
const POSITION_FIELDS: [&str; 4] = ["x", "y", "width", "height"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WidgetCheck {
    fn ok() -> Self {
        Self { valid: true, error: None }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetBatchError {
    pub index: usize,
    pub widget_id: Value,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetBatchReport {
    pub valid: bool,
    pub errors: Vec<WidgetBatchError>,
    pub valid_widgets: Vec<Value>,
    pub total: usize,
    pub valid_count: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WidgetValidator;

impl WidgetValidator {
    /// Required fields present and non-empty, type supported, position numeric
    pub fn validate_widget(&self, widget: &Value) -> WidgetCheck {
        for field in REQUIRED_FIELDS {
            if widget.get(field).map_or(true, is_blank) {
                return WidgetCheck::fail(format!("Missing required field: '{}'", field));
            }
        }

        let widget_type = widget.get("type").and_then(Value::as_str).unwrap_or_default();
        if !SUPPORTED_WIDGET_TYPES.contains(&widget_type) {
            return WidgetCheck::fail(format!(
                "Unsupported widget type: '{}'. Valid types: {}",
                widget_type,
                SUPPORTED_WIDGET_TYPES.join(", ")
            ));
        }

        if !widget["properties"].is_object() {
            return WidgetCheck::fail("Properties must be an object");
        }

        for key in ["position", "layout"] {
            let Some(position) = widget.get(key) else {
                continue;
            };
            let Some(position) = position.as_object() else {
                return WidgetCheck::fail(format!("'{}' must be an object", key));
            };
            for field in POSITION_FIELDS {
                if let Some(v) = position.get(field) {
                    if !is_integral(v) {
                        return WidgetCheck::fail(format!("Position '{}' must be a number", field));
                    }
                }
            }
        }

        WidgetCheck::ok()
    }

    pub fn validate_batch(&self, widgets: &[Value]) -> WidgetBatchReport {
        let mut errors = Vec::new();
        let mut valid_widgets = Vec::new();

        for (index, widget) in widgets.iter().enumerate() {
            let check = self.validate_widget(widget);
            match check.error {
                Some(error) => errors.push(WidgetBatchError {
                    index,
                    widget_id: widget.get("id").cloned().unwrap_or(Value::Null),
                    error,
                }),
                None => valid_widgets.push(widget.clone()),
            }
        }

        WidgetBatchReport {
            valid: errors.is_empty(),
            errors,
            valid_count: valid_widgets.len(),
            valid_widgets,
            total: widgets.len(),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_widget() {
        let check = WidgetValidator.validate_widget(&json!({
            "type": "echart",
            "properties": {"title": "Sales"},
            "layout": {"x": 0, "y": "2", "width": 8, "height": 6}
        }));
        assert!(check.valid, "{:?}", check.error);
    }

    #[test]
    fn test_missing_and_unsupported() {
        let missing = WidgetValidator.validate_widget(&json!({"type": "card"}));
        assert_eq!(missing.error.as_deref(), Some("Missing required field: 'properties'"));

        let unsupported = WidgetValidator.validate_widget(&json!({"type": "radar", "properties": {"a": 1}}));
        assert!(unsupported.error.unwrap().contains("radar"));
    }

    #[test]
    fn test_bad_position() {
        let check = WidgetValidator.validate_widget(&json!({
            "type": "card",
            "properties": {"title": "KPI"},
            "position": {"x": "left"}
        }));
        assert!(!check.valid);
    }

    #[test]
    fn test_batch() {
        let report = WidgetValidator.validate_batch(&[
            json!({"id": "w1", "type": "card", "properties": {"title": "A"}}),
            json!({"id": "w2", "type": "card"}),
        ]);
        assert!(!report.valid);
        assert_eq!(report.total, 2);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].widget_id, json!("w2"));
    }
}
