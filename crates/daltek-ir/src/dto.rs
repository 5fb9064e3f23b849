//! Payloads exchanged with the persistence collaborator

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{DaltekError, Result};
use crate::query::{Condition, QuerySpec};

/// A query as the dashboard document stores it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "doctype", skip_serializing_if = "Option::is_none")]
    pub doctype_or_table: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<SavedFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Filter entry; older documents use `col`/`op`/`val`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    #[serde(alias = "col")]
    pub field: String,
    #[serde(alias = "op", default = "default_operator")]
    pub operator: String,
    #[serde(alias = "val", default)]
    pub value: Value,
}

fn default_operator() -> String {
    "=".to_string()
}

impl SavedQuery {
    /// Query spec equivalent: columns become the select list, the doctype the table
    pub fn to_query_spec(&self) -> QuerySpec {
        QuerySpec {
            select: self.columns.clone(),
            from: self.doctype_or_table.clone(),
            where_: self
                .filters
                .iter()
                .map(|f| Condition::field(f.field.clone(), f.operator.clone(), f.value.clone()))
                .collect(),
            ..Default::default()
        }
    }
}

/// Next id for a saved query: `<n>_<millis>`.
///
/// `n` follows the largest numeric prefix among existing ids, or the
/// collection size plus one when none has a numeric prefix.
pub fn next_query_id(existing: &[SavedQuery], millis: i64) -> String {
    let next = existing
        .iter()
        .filter_map(|q| q.id.as_deref())
        .filter_map(|id| id.split('_').next()?.parse::<u64>().ok())
        .max()
        .map(|n| n + 1)
        .unwrap_or(existing.len() as u64 + 1);
    format!("{}_{}", next, millis)
}

/// Size constraints for a widget type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub min_width: u32,
    pub min_height: u32,
    pub default_width: u32,
    pub default_height: u32,
}

const fn dims(min_width: u32, min_height: u32, default_width: u32, default_height: u32) -> Dimensions {
    Dimensions {
        min_width,
        min_height,
        default_width,
        default_height,
    }
}

impl Dimensions {
    pub fn for_widget(widget_type: &str) -> Dimensions {
        match widget_type {
            "card" => dims(4, 3, 6, 4),
            "table" => dims(6, 4, 8, 6),
            "metric" => dims(3, 3, 4, 3),
            "echart" => dims(6, 4, 8, 6),
            _ => dims(4, 3, 6, 4),
        }
    }

    pub fn for_chart(chart_type: &str) -> Dimensions {
        match chart_type {
            "pie" => dims(5, 5, 6, 6),
            "gauge" => dims(4, 4, 5, 5),
            "candlestick" => dims(6, 4, 10, 6),
            "heatmap" => dims(6, 5, 8, 6),
            _ => dims(6, 4, 8, 6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetMetadata {
    pub created_at: String,
    pub modified_at: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl WidgetMetadata {
    pub fn now() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            created_at: now.clone(),
            modified_at: now,
            version: 1,
        }
    }
}

/// Requested position on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    6
}

fn default_height() -> u32 {
    4
}

impl Default for Position {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetLayout {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl WidgetLayout {
    /// Width and height never fall below the type's default size
    pub fn fit(position: Position, dims: Dimensions) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: position.width.max(dims.default_width),
            height: position.height.max(dims.default_height),
            min_width: dims.min_width,
            min_height: dims.min_height,
        }
    }
}

/// Type-specific widget body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetContent {
    Card(Map<String, Value>),
    Table(Map<String, Value>),
    Metric(Map<String, Value>),
    Echart {
        #[serde(default)]
        chart_type: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        config: Value,
    },
    /// Any other widget kind, kept verbatim including its `type`
    #[serde(untagged)]
    Other(Map<String, Value>),
}

impl WidgetContent {
    pub fn empty(widget_type: &str) -> Self {
        match widget_type {
            "card" => WidgetContent::Card(Map::new()),
            "table" => WidgetContent::Table(Map::new()),
            "metric" => WidgetContent::Metric(Map::new()),
            "echart" => WidgetContent::Echart {
                chart_type: String::new(),
                data: Value::Object(Map::new()),
                config: Value::Object(Map::new()),
            },
            other => {
                let mut body = Map::new();
                body.insert("type".into(), Value::String(other.to_string()));
                WidgetContent::Other(body)
            }
        }
    }

    fn dimensions(&self, widget_type: &str) -> Dimensions {
        match self {
            WidgetContent::Echart { chart_type, .. } if !chart_type.is_empty() => {
                Dimensions::for_chart(chart_type)
            }
            _ => Dimensions::for_widget(widget_type),
        }
    }
}

/// A widget on the dashboard canvas, in its normalized nested form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDto {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub label: String,
    pub metadata: WidgetMetadata,
    pub layout: WidgetLayout,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub content: WidgetContent,
}

impl WidgetDto {
    pub fn new(
        widget_type: impl Into<String>,
        label: impl Into<String>,
        position: Position,
        properties: Map<String, Value>,
        content: WidgetContent,
    ) -> Self {
        let widget_type = widget_type.into();
        let layout = WidgetLayout::fit(position, content.dimensions(&widget_type));
        Self {
            id: format!("widget_{}", Uuid::new_v4().simple()),
            widget_type,
            label: label.into(),
            metadata: WidgetMetadata::now(),
            layout,
            properties,
            content,
        }
    }

    pub fn echart(
        chart_type: impl Into<String>,
        label: impl Into<String>,
        position: Position,
        data: Value,
        config: Value,
    ) -> Self {
        let content = WidgetContent::Echart {
            chart_type: chart_type.into(),
            data,
            config,
        };
        Self::new("echart", label, position, Map::new(), content)
    }

    pub fn is_echart(&self) -> bool {
        matches!(self.content, WidgetContent::Echart { .. })
    }
}

/// The widget collection of one dashboard document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub widgets: Vec<WidgetDto>,
}

impl Layout {
    pub fn find(&self, id: &str) -> Result<&WidgetDto> {
        self.widgets
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| widget_not_found(id))
    }

    pub fn add(&mut self, widget: WidgetDto) -> Result<()> {
        if self.widgets.iter().any(|w| w.id == widget.id) {
            return Err(DaltekError::InvalidInput(format!(
                "Widget '{}' already exists",
                widget.id
            )));
        }
        self.widgets.push(widget);
        Ok(())
    }

    /// Replace a widget, keeping its id and creation time
    pub fn update(&mut self, id: &str, mut widget: WidgetDto) -> Result<&WidgetDto> {
        let slot = self
            .widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| widget_not_found(id))?;

        widget.id = slot.id.clone();
        widget.metadata.created_at = slot.metadata.created_at.clone();
        widget.metadata.modified_at = Utc::now().to_rfc3339();
        *slot = widget;
        Ok(&*slot)
    }

    pub fn remove(&mut self, id: &str) -> Result<WidgetDto> {
        let index = self
            .widgets
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| widget_not_found(id))?;
        Ok(self.widgets.remove(index))
    }
}

fn widget_not_found(id: &str) -> DaltekError {
    DaltekError::NotFound(format!("Widget '{}'", id))
}
