use daltek_ir::{value, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{require, Result, TransformEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
}

impl TransformEngine {
    /// Join two tables on a shared key column.
    ///
    /// The result holds the left columns, then the right columns minus the
    /// key. Other clashing names get `_x`/`_y` suffixes. Rows follow the
    /// left table (the right table for `Right`); `Outer` appends unmatched
    /// right rows after the left-join rows.
    pub fn merge(&self, left: &Table, right: &Table, on: &str, how: JoinHow) -> Result<Table> {
        let lk = require(left, on)?;
        let rk = require(right, on)?;

        let right_cols: Vec<usize> = (0..right.width()).filter(|&i| i != rk).collect();
        let clash = |name: &str| name != on && left.has_column(name) && right.has_column(name);

        let mut columns: Vec<String> = left
            .columns
            .iter()
            .map(|c| if clash(c) { format!("{}_x", c) } else { c.clone() })
            .collect();
        columns.extend(right_cols.iter().map(|&i| {
            let c = &right.columns[i];
            if clash(c) {
                format!("{}_y", c)
            } else {
                c.clone()
            }
        }));
        let mut out = Table::new(columns);

        let index = |table: &Table, key: usize| {
            let mut map: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, row) in table.rows.iter().enumerate() {
                if !value::is_null(&row[key]) {
                    map.entry(value::group_key(&row[key])).or_default().push(i);
                }
            }
            map
        };

        let combine = |l: Option<&Vec<Value>>, r: Option<&Vec<Value>>| -> Vec<Value> {
            let mut row: Vec<Value> = match l {
                Some(l) => l.clone(),
                None => {
                    let mut blank = vec![Value::Null; left.width()];
                    if let Some(r) = r {
                        blank[lk] = r[rk].clone();
                    }
                    blank
                }
            };
            row.extend(right_cols.iter().map(|&i| r.map_or(Value::Null, |r| r[i].clone())));
            row
        };

        if how == JoinHow::Right {
            let by_key = index(left, lk);
            for r in &right.rows {
                match by_key.get(&value::group_key(&r[rk])) {
                    Some(matches) => {
                        for &m in matches {
                            out.push_row(combine(Some(&left.rows[m]), Some(r)));
                        }
                    }
                    None => out.push_row(combine(None, Some(r))),
                }
            }
            return Ok(out);
        }

        let by_key = index(right, rk);
        let mut matched = vec![false; right.row_count()];
        for l in &left.rows {
            let hits = by_key.get(&value::group_key(&l[lk])).filter(|_| !value::is_null(&l[lk]));
            match hits {
                Some(hits) => {
                    for &h in hits {
                        matched[h] = true;
                        out.push_row(combine(Some(l), Some(&right.rows[h])));
                    }
                }
                None if how != JoinHow::Inner => out.push_row(combine(Some(l), None)),
                None => {}
            }
        }

        if how == JoinHow::Outer {
            for (i, r) in right.rows.iter().enumerate() {
                if !matched[i] {
                    out.push_row(combine(None, Some(r)));
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> Table {
        Table::from_records(&[
            json!({"cust": "a", "total": 10, "note": "x"}),
            json!({"cust": "b", "total": 20, "note": "y"}),
            json!({"cust": "z", "total": 5, "note": "z"}),
        ])
        .unwrap()
    }

    fn customers() -> Table {
        Table::from_records(&[
            json!({"cust": "b", "name": "Bea", "note": "vip"}),
            json!({"cust": "a", "name": "Al", "note": "new"}),
            json!({"cust": "q", "name": "Quinn", "note": null}),
        ])
        .unwrap()
    }

    #[test]
    fn test_inner_join_columns_and_order() {
        let out = TransformEngine.merge(&orders(), &customers(), "cust", JoinHow::Inner).unwrap();
        assert_eq!(out.columns, vec!["cust", "total", "note_x", "name", "note_y"]);
        assert_eq!(
            out.rows,
            vec![
                vec![json!("a"), json!(10), json!("x"), json!("Al"), json!("new")],
                vec![json!("b"), json!(20), json!("y"), json!("Bea"), json!("vip")],
            ]
        );
    }

    #[test]
    fn test_left_right_outer() {
        let left = TransformEngine.merge(&orders(), &customers(), "cust", JoinHow::Left).unwrap();
        assert_eq!(left.row_count(), 3);
        assert_eq!(left.rows[2][3], Value::Null);

        let right = TransformEngine.merge(&orders(), &customers(), "cust", JoinHow::Right).unwrap();
        let keys: Vec<&Value> = right.column_values(0).collect();
        assert_eq!(keys, vec![&json!("b"), &json!("a"), &json!("q")]);
        assert_eq!(right.rows[2][1], Value::Null);

        let outer = TransformEngine.merge(&orders(), &customers(), "cust", JoinHow::Outer).unwrap();
        assert_eq!(outer.row_count(), 4);
        assert_eq!(outer.rows[3][0], json!("q"));
    }
}
