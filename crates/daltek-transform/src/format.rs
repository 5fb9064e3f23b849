use chrono::format::{Item, StrftimeItems};
use daltek_ir::{value, FormatKind, FormatSpec, Table};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::Write;

use crate::{Result, TransformEngine, TransformError};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

impl TransformEngine {
    /// Render columns as display strings.
    ///
    /// Nulls become `""`. Cells that cannot be read as the target kind keep
    /// their value. Columns absent from the table are skipped.
    pub fn format_values(&self, table: &Table, formats: &IndexMap<String, FormatSpec>) -> Result<Table> {
        let mut out = table.clone();
        for (column, spec) in formats {
            let Some(idx) = out.column_index(column) else {
                continue;
            };
            if spec.kind == FormatKind::Other {
                continue;
            }
            let date_format = spec.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
            if spec.kind == FormatKind::Date && StrftimeItems::new(date_format).any(|i| matches!(i, Item::Error)) {
                return Err(TransformError::invalid(
                    "format",
                    format!("bad date format '{}' for column '{}'", date_format, column),
                ));
            }

            for row in &mut out.rows {
                row[idx] = format_cell(&row[idx], spec, date_format);
            }
        }
        Ok(out)
    }
}

fn format_cell(cell: &Value, spec: &FormatSpec, date_format: &str) -> Value {
    if value::is_null(cell) {
        return Value::String(String::new());
    }
    let rendered = match spec.kind {
        FormatKind::Currency => value::coerce_f64(cell).map(|f| format!("${}", grouped(f, spec.decimals.unwrap_or(2)))),
        FormatKind::Percentage => value::coerce_f64(cell).map(|f| format!("{:.*}%", spec.decimals.unwrap_or(1), f)),
        FormatKind::Number => value::coerce_f64(cell).map(|f| grouped(f, spec.decimals.unwrap_or(0))),
        FormatKind::Date => value::as_datetime(cell).and_then(|dt| {
            let mut s = String::new();
            write!(s, "{}", dt.format(date_format)).ok().map(|_| s)
        }),
        FormatKind::Other => None,
    };
    rendered.map(Value::String).unwrap_or_else(|| cell.clone())
}

/// Fixed decimals with comma thousands separators
fn grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}
