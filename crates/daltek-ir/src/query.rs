//! Declarative query description consumed by the SQL builder

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{DaltekError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, deserialize_with = "one_or_many")]
    pub select: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinSpec>,

    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty", deserialize_with = "object_conditions")]
    pub where_: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub group_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "object_conditions")]
    pub having: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderSpec>,

    /// Coerced to an integer at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
}

impl QuerySpec {
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            from: Some(table.into()),
            ..Default::default()
        }
    }

    /// Accepts either a structured object or a JSON-encoded string
    pub fn from_json(input: &Value) -> Result<Self> {
        let parsed = match input {
            Value::String(text) => serde_json::from_str::<QuerySpec>(text),
            other => serde_json::from_value::<QuerySpec>(other.clone()),
        };
        parsed.map_err(|_| DaltekError::InvalidInput("malformed query specification".into()))
    }

    /// Calculate fingerprint (SHA-256) of the canonical JSON form
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
}

/// WHERE/HAVING entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// `{"type": "RAW", "condition": "..."}`, inlined verbatim
    Raw {
        #[serde(rename = "type")]
        kind: RawTag,
        condition: String,
    },
    /// Entries without a field are skipped when rendering
    Field {
        #[serde(default)]
        field: Option<String>,
        #[serde(default = "default_operator")]
        operator: String,
        #[serde(default)]
        value: Value,
    },
}

impl Condition {
    pub fn raw(condition: impl Into<String>) -> Self {
        Condition::Raw {
            kind: RawTag::Raw,
            condition: condition.into(),
        }
    }

    pub fn field(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Condition::Field {
            field: Some(field.into()),
            operator: operator.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawTag {
    #[serde(rename = "RAW", alias = "raw")]
    Raw,
}

fn default_operator() -> String {
    "=".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderSpec {
    Column(String),
    Field {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<String>,
    },
}

impl OrderSpec {
    pub fn field(&self) -> &str {
        match self {
            OrderSpec::Column(name) => name,
            OrderSpec::Field { field, .. } => field,
        }
    }

    /// `ASC` unless a direction was given
    pub fn direction(&self) -> String {
        match self {
            OrderSpec::Field {
                direction: Some(d), ..
            } if !d.trim().is_empty() => d.trim().to_uppercase(),
            _ => "ASC".to_string(),
        }
    }
}

/// Accept `"a"` as shorthand for `["a"]`
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Missing(()) => Vec::new(),
    })
}

/// Condition lists keep only their object entries; bare strings and other
/// scalars are dropped like field-less conditions.
fn object_conditions<'de, D>(deserializer: D) -> std::result::Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    entries
        .into_iter()
        .filter(Value::is_object)
        .map(|entry| Condition::deserialize(entry).map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_structured_and_encoded() {
        let obj = json!({"from": "Sales", "where": [{"field": "a", "operator": ">", "value": 5}]});
        let from_obj = QuerySpec::from_json(&obj).unwrap();
        let from_text = QuerySpec::from_json(&Value::String(obj.to_string())).unwrap();
        assert_eq!(from_obj, from_text);
        assert_eq!(from_obj.where_, vec![Condition::field("a", ">", json!(5))]);
    }

    #[test]
    fn test_malformed_is_invalid_input() {
        let err = QuerySpec::from_json(&json!("{not json")).unwrap_err();
        assert_eq!(err, DaltekError::InvalidInput("malformed query specification".into()));
    }

    #[test]
    fn test_raw_condition_and_order_forms() {
        let spec: QuerySpec = serde_json::from_value(json!({
            "from": "t",
            "where": [{"type": "RAW", "condition": "a IS NOT NULL"}],
            "order_by": ["a", {"field": "b", "direction": "desc"}]
        }))
        .unwrap();
        assert_eq!(spec.where_[0], Condition::raw("a IS NOT NULL"));
        assert_eq!(spec.order_by[0].direction(), "ASC");
        assert_eq!(spec.order_by[1].direction(), "DESC");
    }

    #[test]
    fn test_non_object_conditions_are_skipped() {
        let spec: QuerySpec = serde_json::from_value(json!({
            "from": "t",
            "where": ["a>5", {"field": "b", "operator": "=", "value": 1}, 7],
            "having": [null]
        }))
        .unwrap();
        assert_eq!(spec.where_, vec![Condition::field("b", "=", json!(1))]);
        assert!(spec.having.is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let spec = QuerySpec::from_table("Sales");
        assert_eq!(spec.fingerprint(), spec.clone().fingerprint());
        assert_ne!(spec.fingerprint(), QuerySpec::from_table("Orders").fingerprint());
    }
}
