//! Reshape a transformed table into widget payloads
//!
//! Every `to_*` function is pure: it reads the table and returns a fresh
//! JSON payload in the option schema of the target widget.

use daltek_ir::{value, AggFunc, AxisChartOptions, ColumnType, MetricConfig, Table, WidgetMapping};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::ChartError;

/// Stateless adapter from [`Table`] to chart payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartAdapter;

impl ChartAdapter {
    /// Dispatch on the widget mapping. Unrecognised widget types render as a table.
    pub fn adapt(&self, table: &Table, mapping: &WidgetMapping) -> Result<Value, ChartError> {
        match mapping {
            WidgetMapping::Echart {
                chart_type,
                x_axis,
                y_axes,
                chart_config,
            } => {
                let x = x_axis
                    .as_deref()
                    .ok_or_else(|| ChartError::InvalidConfig("echart mapping requires 'x_axis'".into()))?;
                self.to_axis_chart(table, x, y_axes, chart_type, chart_config)
            }
            WidgetMapping::Table { columns } => self.to_table(table, columns.as_deref()),
            WidgetMapping::Card { metric_config } => self.to_card(table, metric_config),
            WidgetMapping::Heatmap { x, y, value } => self.to_heatmap(table, x, y, value),
            WidgetMapping::Treemap { hierarchy, value } => self.to_treemap(table, hierarchy, value),
            WidgetMapping::Gauge {
                value_column,
                max_value,
            } => self.to_gauge(table, value_column, *max_value),
            WidgetMapping::Funnel {
                label_column,
                value_column,
            } => self.to_funnel(table, label_column, value_column),
            WidgetMapping::Sankey { source, target, value } => self.to_sankey(table, source, target, value),
            WidgetMapping::Other => self.to_table(table, None),
        }
    }

    /// One series per y column present in the table.
    ///
    /// A `"pie"` chart type returns a pie payload instead, built from the
    /// first present y column with one `{value, name}` entry per x value.
    pub fn to_axis_chart(
        &self,
        table: &Table,
        x_column: &str,
        y_columns: &[String],
        chart_type: &str,
        options: &AxisChartOptions,
    ) -> Result<Value, ChartError> {
        let x_idx = column(table, x_column)?;
        let x_data: Vec<Value> = table.column_values(x_idx).cloned().collect();

        let mut series = Vec::new();
        for y in y_columns {
            let Some(y_idx) = table.column_index(y) else {
                continue;
            };
            let y_data: Vec<Value> = table.column_values(y_idx).cloned().collect();

            if chart_type == "pie" {
                let data: Vec<Value> = x_data
                    .iter()
                    .zip(&y_data)
                    .map(|(name, value)| json!({"value": value, "name": name}))
                    .collect();
                return Ok(json!({
                    "series": [{
                        "name": y,
                        "type": "pie",
                        "radius": options.radius.clone().unwrap_or_else(|| json!("50%")),
                        "data": data,
                    }],
                    "tooltip": {"trigger": "item"},
                    "legend": {"orient": "vertical", "left": "left"},
                }));
            }

            let mut serie = json!({"name": y, "type": chart_type, "data": y_data});
            match chart_type {
                "line" => {
                    serie["smooth"] = json!(options.smooth.unwrap_or(true));
                    serie["symbol"] = json!(options.symbol.as_deref().unwrap_or("circle"));
                    serie["symbolSize"] = options.symbol_size.clone().unwrap_or_else(|| json!(6));
                }
                "bar" => {
                    serie["barWidth"] = options.bar_width.clone().unwrap_or_else(|| json!("60%"));
                }
                _ => {}
            }
            series.push(serie);
        }

        let mut result = json!({
            "xAxis": {"type": "category", "data": x_data},
            "yAxis": {"type": "value"},
            "series": series,
            "tooltip": {"trigger": "axis"},
            "legend": {"data": y_columns},
            "grid": {"left": "3%", "right": "4%", "bottom": "3%", "containLabel": true},
        });
        if let Some(color) = &options.color {
            result["color"] = color.clone();
        }
        if let Some(title) = &options.title {
            result["title"] = json!({"text": title, "left": "center"});
        }
        Ok(result)
    }

    /// Column definitions with inferred display types, plus the rows as records
    pub fn to_table(&self, table: &Table, columns: Option<&[String]>) -> Result<Value, ChartError> {
        let selected: Vec<String> = match columns {
            Some(cols) => cols.iter().filter(|c| table.has_column(c)).cloned().collect(),
            None => table.columns.clone(),
        };
        let projected = table.project(&selected);

        let defs: Vec<Value> = projected
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let display = match ColumnType::infer(projected.column_values(i)) {
                    ColumnType::Numeric => "number",
                    ColumnType::Date => "date",
                    ColumnType::Boolean => "boolean",
                    _ => "text",
                };
                json!({"field": name, "label": title_case(&name.replace('_', " ")), "type": display})
            })
            .collect();

        let rows = projected.to_records();
        Ok(json!({"columns": defs, "count": rows.len(), "rows": rows}))
    }

    /// KPI card: the single row's value, or the column sum over several rows
    pub fn to_card(&self, table: &Table, config: &MetricConfig) -> Result<Value, ChartError> {
        let value_idx = column(table, &config.value_column)?;
        let value = headline(table, value_idx);

        let mut result = json!({
            "value": value,
            "label": config.label.as_deref().unwrap_or(&config.value_column),
            "format": config.format,
        });

        let compare_idx = config.compare_column.as_deref().and_then(|c| table.column_index(c));
        if let Some(compare_idx) = compare_idx {
            let current = value::coerce_f64(&value);
            let previous = value::coerce_f64(&headline(table, compare_idx));
            if let (Some(current), Some(previous)) = (current, previous) {
                if previous != 0.0 {
                    let change = (current - previous) / previous * 100.0;
                    let trend = if change > 0.0 {
                        "up"
                    } else if change < 0.0 {
                        "down"
                    } else {
                        "neutral"
                    };
                    result["change"] = json!(format!("{:+.1}%", change));
                    result["trend"] = json!(trend);
                    result["subtitle"] = json!("vs previous period");
                }
            }
        }
        Ok(result)
    }

    /// Sparse matrix of `[x_index, y_index, value]` over the distinct x and
    /// y values, taking the first row of each cell
    pub fn to_heatmap(&self, table: &Table, x: &str, y: &str, value: &str) -> Result<Value, ChartError> {
        let (xi, yi, vi) = (column(table, x)?, column(table, y)?, column(table, value)?);
        let x_cats = distinct(table, xi);
        let y_cats = distinct(table, yi);

        let mut data = Vec::new();
        for (row_pos, y_val) in y_cats.iter().enumerate() {
            for (col_pos, x_val) in x_cats.iter().enumerate() {
                let hit = table
                    .rows
                    .iter()
                    .find(|r| value::loose_eq(&r[xi], x_val) && value::loose_eq(&r[yi], y_val));
                if let Some(row) = hit {
                    data.push(json!([col_pos, row_pos, row[vi]]));
                }
            }
        }

        let cells: Vec<&Value> = table.column_values(vi).collect();
        Ok(json!({
            "xAxis": {"type": "category", "data": x_cats},
            "yAxis": {"type": "category", "data": y_cats},
            "visualMap": {
                "min": reduce_numeric(AggFunc::Min, &cells),
                "max": reduce_numeric(AggFunc::Max, &cells),
                "calculable": true,
                "orient": "horizontal",
                "left": "center",
                "bottom": "15%",
            },
            "series": [{"type": "heatmap", "data": data, "label": {"show": true}}],
            "tooltip": {"position": "top"},
        }))
    }

    /// Nested `{name, value, children?}` nodes, summing `value` per level.
    /// Siblings are ordered by name.
    pub fn to_treemap(&self, table: &Table, hierarchy: &[String], value: &str) -> Result<Value, ChartError> {
        let levels = hierarchy
            .iter()
            .map(|c| column(table, c))
            .collect::<Result<Vec<_>, _>>()?;
        let vi = column(table, value)?;
        let all: Vec<usize> = (0..table.row_count()).collect();

        Ok(json!({
            "series": [{
                "type": "treemap",
                "data": tree_level(table, &all, &levels, vi),
                "leafDepth": 1,
                "label": {"show": true, "formatter": "{b}"},
                "upperLabel": {"show": true, "height": 30},
            }],
            "tooltip": {"formatter": "{b}: {c}"},
        }))
    }

    /// Gauge on the first row's value; `max` defaults to 120% of the column maximum
    pub fn to_gauge(&self, table: &Table, value_column: &str, max_value: Option<f64>) -> Result<Value, ChartError> {
        let idx = column(table, value_column)?;
        let current = table
            .rows
            .first()
            .and_then(|r| value::coerce_f64(&r[idx]))
            .unwrap_or(0.0);
        let max = max_value.unwrap_or_else(|| {
            table
                .column_values(idx)
                .filter_map(value::as_f64)
                .reduce(f64::max)
                .map_or(100.0, |m| m * 1.2)
        });

        Ok(json!({
            "series": [{
                "type": "gauge",
                "detail": {"formatter": "{value}"},
                "data": [{"value": value::number(current), "name": value_column}],
                "max": value::number(max),
            }]
        }))
    }

    pub fn to_funnel(&self, table: &Table, label_column: &str, value_column: &str) -> Result<Value, ChartError> {
        let (li, vi) = (column(table, label_column)?, column(table, value_column)?);
        let data: Vec<Value> = table
            .rows
            .iter()
            .map(|r| json!({"value": r[vi], "name": r[li]}))
            .collect();

        Ok(json!({
            "series": [{"type": "funnel", "data": data, "label": {"show": true, "position": "inside"}}],
            "tooltip": {"trigger": "item", "formatter": "{b}: {c}"},
        }))
    }

    /// Nodes are the distinct sources then targets, in first-seen order
    pub fn to_sankey(&self, table: &Table, source: &str, target: &str, value: &str) -> Result<Value, ChartError> {
        let (si, ti, vi) = (column(table, source)?, column(table, target)?, column(table, value)?);

        let mut seen = HashSet::new();
        let nodes: Vec<Value> = table
            .column_values(si)
            .chain(table.column_values(ti))
            .filter(|v| !value::is_null(v))
            .filter(|v| seen.insert(value::group_key(v)))
            .map(|v| json!({"name": v}))
            .collect();
        let links: Vec<Value> = table
            .rows
            .iter()
            .map(|r| json!({"source": r[si], "target": r[ti], "value": r[vi]}))
            .collect();

        Ok(json!({
            "series": [{"type": "sankey", "data": nodes, "links": links, "layout": "none"}],
            "tooltip": {"trigger": "item"},
        }))
    }
}

fn column(table: &Table, name: &str) -> Result<usize, ChartError> {
    table
        .column_index(name)
        .ok_or_else(|| ChartError::MissingColumn(name.to_string()))
}

fn headline(table: &Table, idx: usize) -> Value {
    if table.row_count() == 1 {
        return table.rows[0][idx].clone();
    }
    let cells: Vec<&Value> = table.column_values(idx).collect();
    reduce_numeric(AggFunc::Sum, &cells)
}

/// Numeric reduction over a column, ignoring nulls and non-numeric cells
fn reduce_numeric(func: AggFunc, cells: &[&Value]) -> Value {
    let nums = cells.iter().filter_map(|v| value::coerce_f64(v));
    let reduced = match func {
        AggFunc::Min => nums.reduce(f64::min),
        AggFunc::Max => nums.reduce(f64::max),
        _ => Some(nums.sum()),
    };
    reduced.map_or(Value::Null, value::number)
}

/// Distinct non-null values in first-seen order
fn distinct(table: &Table, idx: usize) -> Vec<Value> {
    let mut seen = HashSet::new();
    table
        .column_values(idx)
        .filter(|v| !value::is_null(v))
        .filter(|v| seen.insert(value::group_key(v)))
        .cloned()
        .collect()
}

fn tree_level(table: &Table, rows: &[usize], levels: &[usize], vi: usize) -> Vec<Value> {
    let Some((&level, deeper)) = levels.split_first() else {
        return Vec::new();
    };

    let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
    for &r in rows {
        let key = &table.rows[r][level];
        if value::is_null(key) {
            continue;
        }
        match groups.iter_mut().find(|(k, _)| value::loose_eq(k, key)) {
            Some((_, members)) => members.push(r),
            None => groups.push((key.clone(), vec![r])),
        }
    }
    groups.sort_by(|(a, _), (b, _)| value::compare(a, b));

    groups
        .into_iter()
        .map(|(name, members)| {
            let total: f64 = members.iter().filter_map(|&r| value::coerce_f64(&table.rows[r][vi])).sum();
            let mut node = Map::new();
            node.insert("name".into(), name);
            node.insert("value".into(), value::number(total));
            let children = tree_level(table, &members, deeper, vi);
            if !children.is_empty() {
                node.insert("children".into(), Value::Array(children));
            }
            Value::Object(node)
        })
        .collect()
}

/// Capitalize the first letter of every word and lowercase the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut boundary = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}
