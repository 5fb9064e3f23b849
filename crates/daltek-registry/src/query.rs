//! Structural checks on saved queries

use serde::{Deserialize, Serialize};
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 1] = ["name"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBatchError {
    pub index: usize,
    pub name: Value,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBatchReport {
    pub valid: bool,
    pub errors: Vec<QueryBatchError>,
    pub valid_queries: Vec<Value>,
    pub total: usize,
    pub valid_count: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueryValidator;

impl QueryValidator {
    pub fn validate_query(&self, query: &Value) -> QueryCheck {
        let mut errors = Vec::new();

        for field in REQUIRED_FIELDS {
            let present = match query.get(field) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Null) | None => false,
                Some(_) => true,
            };
            if !present {
                errors.push(format!("Missing or empty required field: '{}'", field));
            }
        }

        if let Some(params) = query.get("params") {
            if !(params.is_null() || params.is_object() || params.is_array()) {
                errors.push("'params' must be an object or a list when provided".to_string());
            }
        }

        QueryCheck {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn validate_batch(&self, queries: &[Value]) -> QueryBatchReport {
        let mut errors = Vec::new();
        let mut valid_queries = Vec::new();

        for (index, query) in queries.iter().enumerate() {
            let check = self.validate_query(query);
            if check.valid {
                valid_queries.push(query.clone());
            } else {
                errors.push(QueryBatchError {
                    index,
                    name: query.get("name").cloned().unwrap_or(Value::Null),
                    errors: check.errors,
                });
            }
        }

        QueryBatchReport {
            valid: errors.is_empty(),
            errors,
            valid_count: valid_queries.len(),
            valid_queries,
            total: queries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_required() {
        let check = QueryValidator.validate_query(&json!({"name": "  ", "doctype": "Sales Invoice"}));
        assert!(!check.valid);
        assert!(QueryValidator.validate_query(&json!({"name": "Sales"})).valid);
    }

    #[test]
    fn test_params_shape() {
        let check = QueryValidator.validate_query(&json!({"name": "q", "params": 5}));
        assert_eq!(check.errors.len(), 1);
    }

    #[test]
    fn test_batch_counts() {
        let report = QueryValidator.validate_batch(&[json!({"name": "a"}), json!({})]);
        assert_eq!((report.total, report.valid_count), (2, 1));
        assert_eq!(report.errors[0].index, 1);
    }
}
