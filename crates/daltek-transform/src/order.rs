use daltek_ir::{value, Table};
use serde_json::Value;
use std::cmp::Ordering;

use crate::{require, Result, TransformEngine};

impl TransformEngine {
    /// Stable sort on one or more columns, all in the same direction.
    /// Nulls sort last either way.
    pub fn sort(&self, table: &Table, columns: &[String], ascending: bool) -> Result<Table> {
        let keys = columns
            .iter()
            .map(|c| require(table, c))
            .collect::<Result<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..table.row_count()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .map(|&k| cmp_nulls_last(&table.rows[a][k], &table.rows[b][k], ascending))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Ok(table.take_rows(order))
    }

    /// Rows with the `n` largest values of `column`, or the smallest when
    /// `ascending`. Rows whose value is not numeric are never selected.
    pub fn top_n(&self, table: &Table, column: &str, n: usize, ascending: bool) -> Result<Table> {
        let idx = require(table, column)?;
        let mut ranked: Vec<(usize, f64)> = table
            .column_values(idx)
            .enumerate()
            .filter_map(|(i, v)| value::as_f64(v).map(|f| (i, f)))
            .collect();
        ranked.sort_by(|a, b| {
            let o = a.1.total_cmp(&b.1);
            if ascending {
                o
            } else {
                o.reverse()
            }
        });
        Ok(table.take_rows(ranked.into_iter().take(n).map(|(i, _)| i)))
    }

    pub fn head(&self, table: &Table, n: usize) -> Table {
        table.head(n)
    }
}

fn cmp_nulls_last(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (value::is_null(a), value::is_null(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ if ascending => value::compare(a, b),
        _ => value::compare(b, a),
    }
}
