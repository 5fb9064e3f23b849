//! Column types and the function/operator vocabularies keyed on them

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::DaltekError;
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    Date,
    Boolean,
    Unknown,
}

impl ColumnType {
    /// Classify a database or frontend type name by substring.
    ///
    /// `"Currency"`, `"bigint"` and `"float64"` are numeric, `"varchar(140)"` is text, and so on.
    pub fn classify(type_name: &str) -> ColumnType {
        let lower = type_name.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if lower == "numeric" || has(&["int", "float", "currency", "number", "decimal", "double"]) {
            ColumnType::Numeric
        } else if has(&["datetime", "timestamp", "date"]) {
            ColumnType::Date
        } else if has(&["bool"]) {
            ColumnType::Boolean
        } else if has(&["text", "string", "varchar", "char"]) {
            ColumnType::Text
        } else {
            ColumnType::Unknown
        }
    }

    /// Infer a column type by sniffing its non-null values
    pub fn infer<'a, I>(values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut seen = false;
        let (mut numeric, mut boolean, mut date, mut text) = (true, true, true, true);

        for v in values.into_iter().filter(|v| !value::is_null(v)) {
            seen = true;
            numeric &= v.is_number();
            boolean &= v.is_boolean();
            date &= value::as_datetime(v).is_some();
            text &= v.is_string();
        }

        if !seen {
            ColumnType::Unknown
        } else if numeric {
            ColumnType::Numeric
        } else if boolean {
            ColumnType::Boolean
        } else if date {
            ColumnType::Date
        } else if text {
            ColumnType::Text
        } else {
            ColumnType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Unknown => "unknown",
        }
    }
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::Text
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ColumnType::classify(&name))
    }
}

/// Profile of a single column, derived from a sampled table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique_count: usize,
    #[serde(default)]
    pub sample_values: Vec<Value>,
}

/// Aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggFunc {
    Sum,
    Avg,
    Mean,
    Min,
    Max,
    Count,
    Median,
    Std,
    Var,
    Percentile(u8),
    CountUnique,
    First,
    Last,
    Concat,
}

pub const PERCENTILES: [u8; 6] = [25, 50, 75, 90, 95, 99];

impl AggFunc {
    pub fn name(&self) -> String {
        match self {
            AggFunc::Sum => "sum".into(),
            AggFunc::Avg => "avg".into(),
            AggFunc::Mean => "mean".into(),
            AggFunc::Min => "min".into(),
            AggFunc::Max => "max".into(),
            AggFunc::Count => "count".into(),
            AggFunc::Median => "median".into(),
            AggFunc::Std => "std".into(),
            AggFunc::Var => "var".into(),
            AggFunc::Percentile(p) => format!("percentile_{}", p),
            AggFunc::CountUnique => "count_unique".into(),
            AggFunc::First => "first".into(),
            AggFunc::Last => "last".into(),
            AggFunc::Concat => "concat".into(),
        }
    }
}

impl FromStr for AggFunc {
    type Err = DaltekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let func = match lower.as_str() {
            "sum" => AggFunc::Sum,
            "avg" => AggFunc::Avg,
            "mean" => AggFunc::Mean,
            "min" => AggFunc::Min,
            "max" => AggFunc::Max,
            "count" => AggFunc::Count,
            "median" => AggFunc::Median,
            "std" => AggFunc::Std,
            "var" => AggFunc::Var,
            "count_unique" | "nunique" => AggFunc::CountUnique,
            "first" => AggFunc::First,
            "last" => AggFunc::Last,
            "concat" => AggFunc::Concat,
            other => match other.strip_prefix("percentile_").map(str::parse::<u8>) {
                Some(Ok(p)) if p <= 100 => AggFunc::Percentile(p),
                _ => {
                    return Err(DaltekError::Validation(format!(
                        "Unknown aggregation function '{}'",
                        s
                    )))
                }
            },
        };
        Ok(func)
    }
}

impl TryFrom<String> for AggFunc {
    type Error = DaltekError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AggFunc> for String {
    fn from(func: AggFunc) -> Self {
        func.name()
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    DateEquals,
    DateBefore,
    DateAfter,
    DateBetween,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Between => "between",
            FilterOp::In => "in",
            FilterOp::NotIn => "not_in",
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "not_contains",
            FilterOp::StartsWith => "starts_with",
            FilterOp::EndsWith => "ends_with",
            FilterOp::IsNull => "is_null",
            FilterOp::IsNotNull => "is_not_null",
            FilterOp::DateEquals => "date_equals",
            FilterOp::DateBefore => "date_before",
            FilterOp::DateAfter => "date_after",
            FilterOp::DateBetween => "date_between",
        }
    }

    pub fn is_null_check(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }
}

impl FromStr for FilterOp {
    type Err = DaltekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_lowercase().as_str() {
            "=" | "==" => FilterOp::Eq,
            "!=" | "<>" => FilterOp::Ne,
            ">" => FilterOp::Gt,
            ">=" => FilterOp::Gte,
            "<" => FilterOp::Lt,
            "<=" => FilterOp::Lte,
            "between" => FilterOp::Between,
            "in" => FilterOp::In,
            "not_in" => FilterOp::NotIn,
            "contains" => FilterOp::Contains,
            "not_contains" => FilterOp::NotContains,
            "starts_with" => FilterOp::StartsWith,
            "ends_with" => FilterOp::EndsWith,
            "is_null" => FilterOp::IsNull,
            "is_not_null" => FilterOp::IsNotNull,
            "date_equals" => FilterOp::DateEquals,
            "date_before" => FilterOp::DateBefore,
            "date_after" => FilterOp::DateAfter,
            "date_between" => FilterOp::DateBetween,
            _ => {
                return Err(DaltekError::Validation(format!(
                    "Unknown filter operator '{}'",
                    s
                )))
            }
        };
        Ok(op)
    }
}

impl TryFrom<String> for FilterOp {
    type Error = DaltekError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterOp> for String {
    fn from(op: FilterOp) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
