use daltek_ir::{value, AggFunc, AggregationSpec, Table};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

use crate::{require, Result, TransformEngine};

impl TransformEngine {
    /// Group by `group_by` and reduce each aggregation per group.
    ///
    /// Output columns are the group columns followed by the aggregation
    /// aliases in declaration order. Groups appear in encounter order. With
    /// no group columns the result is a single row.
    pub fn aggregate(
        &self,
        table: &Table,
        group_by: &[String],
        aggregations: &IndexMap<String, AggregationSpec>,
    ) -> Result<Table> {
        let keys = group_by
            .iter()
            .map(|c| require(table, c))
            .collect::<Result<Vec<_>>>()?;
        let inputs = aggregations
            .iter()
            .map(|(alias, spec)| -> Result<_> { Ok((alias, require(table, &spec.column)?, spec.function()?)) })
            .collect::<Result<Vec<_>>>()?;

        let groups = group_rows(table, &keys);

        let mut columns = group_by.to_vec();
        columns.extend(aggregations.keys().cloned());
        let mut out = Table::new(columns);

        for rows in groups.values() {
            let first = &table.rows[rows[0]];
            let mut row: Vec<Value> = keys.iter().map(|&k| first[k].clone()).collect();
            for (_, idx, func) in &inputs {
                let cells: Vec<&Value> = rows.iter().map(|&r| &table.rows[r][*idx]).collect();
                row.push(aggregate_values(*func, &cells));
            }
            out.push_row(row);
        }

        // A global aggregate over zero rows still yields one row
        if keys.is_empty() && table.is_empty() {
            out.push_row(inputs.iter().map(|(_, _, func)| aggregate_values(*func, &[])).collect());
        }

        Ok(out)
    }

    /// Spread `columns` values into their own columns, one row per `index`
    /// value, reducing `values` with `func`. Missing cells are filled with 0.
    /// Row and column keys are sorted.
    pub fn pivot(&self, table: &Table, index: &str, columns: &str, values: &str, func: AggFunc) -> Result<Table> {
        let index_idx = require(table, index)?;
        let column_idx = require(table, columns)?;
        let value_idx = require(table, values)?;

        let mut row_keys = distinct(table.column_values(index_idx));
        let mut col_keys = distinct(table.column_values(column_idx));
        row_keys.sort_by(value::compare);
        col_keys.sort_by(value::compare);

        let mut header = vec![index.to_string()];
        header.extend(col_keys.iter().map(value::display));
        let mut out = Table::new(header);

        for row_key in &row_keys {
            let rk = value::group_key(row_key);
            let mut row = vec![row_key.clone()];
            for col_key in &col_keys {
                let ck = value::group_key(col_key);
                let cells: Vec<&Value> = table
                    .rows
                    .iter()
                    .filter(|r| value::group_key(&r[index_idx]) == rk && value::group_key(&r[column_idx]) == ck)
                    .map(|r| &r[value_idx])
                    .collect();
                let reduced = if cells.is_empty() {
                    Value::from(0)
                } else {
                    aggregate_values(func, &cells)
                };
                row.push(if value::is_null(&reduced) { Value::from(0) } else { reduced });
            }
            out.push_row(row);
        }

        Ok(out)
    }
}

/// Row indices per group, in first-seen order
fn group_rows(table: &Table, keys: &[usize]) -> IndexMap<Vec<String>, Vec<usize>> {
    let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = keys.iter().map(|&k| value::group_key(&row[k])).collect();
        groups.entry(key).or_default().push(i);
    }
    groups
}

/// Non-null distinct values in first-seen order
fn distinct<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !value::is_null(v))
        .filter(|v| seen.insert(value::group_key(v)))
        .cloned()
        .collect()
}

/// Reduce a column slice with one aggregation function.
///
/// Nulls are skipped by every function. Numeric functions read numbers and
/// numeric strings and ignore anything else; `std`/`var` are sample
/// statistics.
pub fn aggregate_values(func: AggFunc, cells: &[&Value]) -> Value {
    let present = || cells.iter().copied().filter(|v| !value::is_null(v));
    let numbers = || -> Vec<f64> { present().filter_map(value::coerce_f64).collect() };

    match func {
        AggFunc::Sum => value::number(numbers().iter().sum()),
        AggFunc::Avg | AggFunc::Mean => mean(&numbers()).map_or(Value::Null, value::number),
        AggFunc::Min => present().min_by(|a, b| value::compare(a, b)).cloned().unwrap_or(Value::Null),
        AggFunc::Max => present().max_by(|a, b| value::compare(a, b)).cloned().unwrap_or(Value::Null),
        AggFunc::Count => Value::from(present().count()),
        AggFunc::Median => percentile(numbers(), 50.0).map_or(Value::Null, value::number),
        AggFunc::Percentile(p) => percentile(numbers(), p as f64).map_or(Value::Null, value::number),
        AggFunc::Std => variance(&numbers()).map_or(Value::Null, |v| value::number(v.sqrt())),
        AggFunc::Var => variance(&numbers()).map_or(Value::Null, value::number),
        AggFunc::CountUnique => {
            let unique: HashSet<String> = present().map(value::group_key).collect();
            Value::from(unique.len())
        }
        AggFunc::First => present().next().cloned().unwrap_or(Value::Null),
        AggFunc::Last => present().last().cloned().unwrap_or(Value::Null),
        AggFunc::Concat => Value::String(present().map(value::display).collect::<Vec<_>>().join(", ")),
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator); undefined below two values
pub(crate) fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Linear interpolation between closest ranks
fn percentile(mut values: Vec<f64>, p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aggs(spec: serde_json::Value) -> IndexMap<String, AggregationSpec> {
        serde_json::from_value(spec).unwrap()
    }

    #[test]
    fn test_group_sum_in_encounter_order() {
        let table = Table::from_records(&[
            json!({"m": "Jan", "v": 100}),
            json!({"m": "Jan", "v": 200}),
            json!({"m": "Feb", "v": 50}),
        ])
        .unwrap();
        let out = TransformEngine
            .aggregate(&table, &["m".into()], &aggs(json!({"v_sum": {"column": "v", "func": "sum"}})))
            .unwrap();
        assert_eq!(out.to_records(), vec![json!({"m": "Jan", "v_sum": 300}), json!({"m": "Feb", "v_sum": 50})]);
    }

    #[test]
    fn test_global_aggregate_single_row() {
        let table = Table::from_records(&[json!({"v": 1}), json!({"v": 2}), json!({"v": 3}), json!({"v": 4})]).unwrap();
        let out = TransformEngine
            .aggregate(
                &table,
                &[],
                &aggs(json!({
                    "n": {"column": "v", "func": "count"},
                    "avg": {"column": "v", "func": "avg"},
                    "med": {"column": "v", "func": "median"},
                    "var": {"column": "v", "func": "var"},
                    "p25": {"column": "v", "func": "percentile_25"}
                })),
            )
            .unwrap();
        assert_eq!(out.columns, vec!["n", "avg", "med", "var", "p25"]);
        assert_eq!(out.rows, vec![vec![json!(4), json!(2.5), json!(2.5), json!(1.6666666666666667), json!(1.75)]]);
    }

    #[test]
    fn test_global_aggregate_over_empty_table() {
        let table = Table::new(vec!["v".into()]);
        let out = TransformEngine
            .aggregate(&table, &[], &aggs(json!({"total": {"column": "v", "func": "sum"}})))
            .unwrap();
        assert_eq!(out.rows, vec![vec![json!(0)]]);
    }

    #[test]
    fn test_text_functions_skip_nulls() {
        let cells = [json!("b"), Value::Null, json!("a"), json!("b")];
        let refs: Vec<&Value> = cells.iter().collect();
        assert_eq!(aggregate_values(AggFunc::CountUnique, &refs), json!(2));
        assert_eq!(aggregate_values(AggFunc::First, &refs), json!("b"));
        assert_eq!(aggregate_values(AggFunc::Last, &refs), json!("b"));
        assert_eq!(aggregate_values(AggFunc::Concat, &refs), json!("b, a, b"));
        assert_eq!(aggregate_values(AggFunc::Count, &refs), json!(3));
        assert_eq!(aggregate_values(AggFunc::Min, &refs), json!("a"));
    }

    #[test]
    fn test_std_needs_two_values() {
        let one = [json!(5)];
        let refs: Vec<&Value> = one.iter().collect();
        assert_eq!(aggregate_values(AggFunc::Std, &refs), Value::Null);
        assert_eq!(aggregate_values(AggFunc::Sum, &refs), json!(5));
    }

    #[test]
    fn test_pivot_fills_zero() {
        let table = Table::from_records(&[
            json!({"region": "S", "q": "Q1", "sales": 10}),
            json!({"region": "N", "q": "Q1", "sales": 5}),
            json!({"region": "N", "q": "Q2", "sales": 7}),
            json!({"region": "N", "q": "Q2", "sales": 3}),
        ])
        .unwrap();
        let out = TransformEngine.pivot(&table, "region", "q", "sales", AggFunc::Sum).unwrap();
        assert_eq!(out.columns, vec!["region", "Q1", "Q2"]);
        assert_eq!(
            out.rows,
            vec![vec![json!("N"), json!(5), json!(10)], vec![json!("S"), json!(10), json!(0)]]
        );
    }
}
