use daltek_ir::{value, FilterOp, FilterSpec, Table};
use serde_json::Value;
use std::cmp::Ordering;

use crate::{require, Result, TransformEngine, TransformError};

/// A filter with its column resolved and operand checked
struct Predicate<'a> {
    index: usize,
    op: FilterOp,
    value: &'a Value,
}

impl TransformEngine {
    /// Keep rows matching every condition (logical AND, applied in order)
    pub fn filter(&self, table: &Table, conditions: &[FilterSpec]) -> Result<Table> {
        let predicates = conditions
            .iter()
            .map(|c| compile(table, c))
            .collect::<Result<Vec<_>>>()?;

        let keep = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                predicates.iter().all(|p| {
                    let cell = row.get(p.index).unwrap_or(&Value::Null);
                    matches(p.op, cell, p.value)
                })
            })
            .map(|(i, _)| i);

        Ok(table.take_rows(keep))
    }
}

fn compile<'a>(table: &Table, spec: &'a FilterSpec) -> Result<Predicate<'a>> {
    let index = require(table, &spec.column)?;
    let op = spec.op()?;
    let two_element = matches!(&spec.value, Value::Array(items) if items.len() == 2);
    if matches!(op, FilterOp::Between | FilterOp::DateBetween) && !two_element {
        return Err(TransformError::invalid(
            "filter",
            format!("'{}' on '{}' expects a [low, high] pair", op, spec.column),
        ));
    }
    Ok(Predicate {
        index,
        op,
        value: &spec.value,
    })
}

fn matches(op: FilterOp, cell: &Value, target: &Value) -> bool {
    match op {
        FilterOp::Eq => !value::is_null(cell) && value::loose_eq(cell, target),
        FilterOp::Ne => value::is_null(cell) || !value::loose_eq(cell, target),
        FilterOp::Gt => ordering(cell, target) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(ordering(cell, target), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => ordering(cell, target) == Some(Ordering::Less),
        FilterOp::Lte => matches!(ordering(cell, target), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Between => match target {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(ordering(cell, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordering(cell, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
        FilterOp::In => members(target).any(|m| !value::is_null(cell) && value::loose_eq(cell, m)),
        FilterOp::NotIn => !members(target).any(|m| !value::is_null(cell) && value::loose_eq(cell, m)),
        FilterOp::Contains => text_match(cell, target, |s, t| s.contains(t)),
        FilterOp::NotContains => !text_match(cell, target, |s, t| s.contains(t)),
        FilterOp::StartsWith => text_match(cell, target, |s, t| s.starts_with(t)),
        FilterOp::EndsWith => text_match(cell, target, |s, t| s.ends_with(t)),
        FilterOp::IsNull => value::is_null(cell),
        FilterOp::IsNotNull => !value::is_null(cell),
        FilterOp::DateEquals => date_ordering(cell, target) == Some(Ordering::Equal),
        FilterOp::DateBefore => date_ordering(cell, target) == Some(Ordering::Less),
        FilterOp::DateAfter => date_ordering(cell, target) == Some(Ordering::Greater),
        FilterOp::DateBetween => match target {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(date_ordering(cell, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(date_ordering(cell, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}

/// Numeric cells compare against numeric-looking operands; otherwise same-kind comparison
fn ordering(cell: &Value, target: &Value) -> Option<Ordering> {
    if value::is_null(cell) || value::is_null(target) {
        return None;
    }
    match (value::as_f64(cell), value::coerce_f64(target)) {
        (Some(a), Some(b)) if cell.is_number() => a.partial_cmp(&b),
        _ => value::partial_compare(cell, target),
    }
}

/// Compare calendar dates, ignoring any time of day
fn date_ordering(cell: &Value, target: &Value) -> Option<Ordering> {
    let a = value::as_datetime(cell)?.date();
    let b = value::as_datetime(target)?.date();
    Some(a.cmp(&b))
}

fn members(target: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match target {
        Value::Array(items) => Box::new(items.iter()),
        Value::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

/// String operators only match string cells
fn text_match(cell: &Value, target: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match cell {
        Value::String(s) => f(s, &value::display(target)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Table {
        Table::from_records(&[
            json!({"name": "Ann", "age": 34, "joined": "2024-01-15 09:30:00", "city": "Lima"}),
            json!({"name": "Bob", "age": 19, "joined": "2023-06-01", "city": null}),
            json!({"name": "Cyd", "age": 52, "joined": "2024-03-02", "city": "Quito"}),
            json!({"name": "Dee", "age": null, "joined": null, "city": "Lima"}),
        ])
        .unwrap()
    }

    fn run(conditions: serde_json::Value) -> Vec<String> {
        let conditions: Vec<FilterSpec> = serde_json::from_value(conditions).unwrap();
        let out = TransformEngine.filter(&people(), &conditions).unwrap();
        out.column_values(0).map(value::display).collect()
    }

    #[test]
    fn test_comparisons_and_between() {
        assert_eq!(run(json!([{"column": "age", "operator": ">", "value": 30}])), vec!["Ann", "Cyd"]);
        assert_eq!(
            run(json!([{"column": "age", "operator": "between", "value": [19, 34]}])),
            vec!["Ann", "Bob"]
        );
        assert_eq!(run(json!([{"column": "age", "operator": "<=", "value": "19"}])), vec!["Bob"]);
    }

    #[test]
    fn test_conditions_are_anded() {
        let names = run(json!([
            {"column": "city", "operator": "=", "value": "Lima"},
            {"column": "age", "operator": "is_not_null"}
        ]));
        assert_eq!(names, vec!["Ann"]);
    }

    #[test]
    fn test_string_ops_skip_nulls() {
        assert_eq!(run(json!([{"column": "city", "operator": "contains", "value": "i"}])), vec!["Ann", "Cyd", "Dee"]);
        assert_eq!(run(json!([{"column": "city", "operator": "not_contains", "value": "Lima"}])), vec!["Bob", "Cyd"]);
        assert_eq!(run(json!([{"column": "age", "operator": "starts_with", "value": "3"}])), Vec::<String>::new());
    }

    #[test]
    fn test_membership_and_nulls() {
        assert_eq!(run(json!([{"column": "city", "operator": "in", "value": ["Quito", "Lima"]}])), vec!["Ann", "Cyd", "Dee"]);
        assert_eq!(run(json!([{"column": "city", "operator": "not_in", "value": ["Lima"]}])), vec!["Bob", "Cyd"]);
        assert_eq!(run(json!([{"column": "city", "operator": "is_null"}])), vec!["Bob"]);
        assert_eq!(run(json!([{"column": "city", "operator": "!=", "value": "Lima"}])), vec!["Bob", "Cyd"]);
    }

    #[test]
    fn test_date_operators_use_calendar_date() {
        assert_eq!(run(json!([{"column": "joined", "operator": "date_equals", "value": "2024-01-15"}])), vec!["Ann"]);
        assert_eq!(run(json!([{"column": "joined", "operator": "date_before", "value": "2024-01-01"}])), vec!["Bob"]);
        assert_eq!(
            run(json!([{"column": "joined", "operator": "date_between", "value": ["2024-01-15", "2024-03-02"]}])),
            vec!["Ann", "Cyd"]
        );
    }

    #[test]
    fn test_bad_operands() {
        let conditions: Vec<FilterSpec> =
            serde_json::from_value(json!([{"column": "age", "operator": "between", "value": 5}])).unwrap();
        assert!(matches!(
            TransformEngine.filter(&people(), &conditions),
            Err(TransformError::InvalidArgument { .. })
        ));

        let conditions: Vec<FilterSpec> =
            serde_json::from_value(json!([{"column": "zip", "operator": "=", "value": 5}])).unwrap();
        assert!(matches!(
            TransformEngine.filter(&people(), &conditions),
            Err(TransformError::UnknownColumn(c)) if c == "zip"
        ));

        let conditions: Vec<FilterSpec> =
            serde_json::from_value(json!([{"column": "name", "operator": "matches", "value": "A.*"}])).unwrap();
        assert!(matches!(
            TransformEngine.filter(&people(), &conditions),
            Err(TransformError::Unsupported(_))
        ));
    }
}
