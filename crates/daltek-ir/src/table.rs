//! In-flight tabular data
//!
//! A [`Table`] is what a row source hands to the pipeline and what every
//! transform returns. Column order is preserved end to end.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DaltekError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Build a table from flat key/value records.
    ///
    /// Columns are the union of record keys in first-seen order; a record
    /// missing a key gets null in that cell.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or_else(|| {
                DaltekError::InvalidInput(format!("Row {} is not an object", i + 1))
            })?;
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                columns
                    .iter()
                    .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Records in column order
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (name, value) in self.columns.iter().zip(row) {
                    obj.insert(name.clone(), value.clone());
                }
                Value::Object(obj)
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller depends on
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            DaltekError::Validation(format!("Column '{}' does not exist in the data", name))
        })
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(&Value::Null))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Returns a copy with `name` set to `values`, replacing an existing column of that name
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Table {
        let mut out = self.clone();
        let mut values = values.into_iter();
        match out.column_index(name) {
            Some(idx) => {
                for row in &mut out.rows {
                    row[idx] = values.next().unwrap_or(Value::Null);
                }
            }
            None => {
                out.columns.push(name.to_string());
                for row in &mut out.rows {
                    row.push(values.next().unwrap_or(Value::Null));
                }
            }
        }
        out
    }

    /// Copy of the rows at `indices`, in that order
    pub fn take_rows<I>(&self, indices: I) -> Table
    where
        I: IntoIterator<Item = usize>,
    {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .into_iter()
                .filter_map(|i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        self.take_rows(0..n.min(self.rows.len()))
    }

    /// Keep only the named columns, in the given order. Unknown names are skipped.
    pub fn project(&self, names: &[String]) -> Table {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_records_preserves_order_and_fills_gaps() {
        let table = Table::from_records(&[
            json!({"month": "Jan", "sales": 100}),
            json!({"month": "Feb", "units": 4}),
        ])
        .unwrap();

        assert_eq!(table.columns, vec!["month", "sales", "units"]);
        assert_eq!(table.rows[1], vec![json!("Feb"), Value::Null, json!(4)]);
    }

    #[test]
    fn test_records_round_trip() {
        let records = vec![json!({"b": 1, "a": "x"}), json!({"b": 2, "a": "y"})];
        let table = Table::from_records(&records).unwrap();
        assert_eq!(table.to_records(), records);
    }

    #[test]
    fn test_from_records_rejects_scalars() {
        let err = Table::from_records(&[json!(1)]).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let table = Table::with_rows(vec!["a".into()], vec![vec![json!(1)], vec![json!(2)]]);
        let added = table.with_column("b", vec![json!(10), json!(20)]);
        assert_eq!(added.columns, vec!["a", "b"]);
        let replaced = added.with_column("a", vec![json!(0), json!(0)]);
        assert_eq!(replaced.rows[1], vec![json!(0), json!(20)]);
        assert_eq!(table.width(), 1);
    }
}
