//! SQL text generation from a [`QuerySpec`]

use daltek_ir::{value, Condition, JoinSpec, OrderSpec, QuerySpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::QueryError;

/// SQL text plus the values bound to its `?` placeholders, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Operators accepted by the parameterized renderer
const SAFE_OPERATORS: [&str; 14] = [
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "IN", "NOT IN", "BETWEEN", "IS", "IS NOT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inline,
    Parameterized,
}

/// Renders clause by clause, collecting bound values in parameterized mode
struct Renderer {
    mode: Mode,
    params: Vec<Value>,
}

impl Renderer {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            params: Vec::new(),
        }
    }

    fn check_fragment<'a>(&self, fragment: &'a str) -> Result<&'a str, QueryError> {
        if self.mode == Mode::Parameterized && is_unsafe_fragment(fragment) {
            return Err(QueryError::UnsafeIdentifier(fragment.to_string()));
        }
        Ok(fragment)
    }

    fn value(&mut self, value: &Value) -> String {
        match (self.mode, value) {
            (_, Value::Null) => "NULL".to_string(),
            (Mode::Inline, Value::String(s)) => format!("'{}'", s.replace('\'', "''")),
            (Mode::Inline, other) => other.to_string(),
            (Mode::Parameterized, other) => {
                self.params.push(other.clone());
                "?".to_string()
            }
        }
    }

    fn condition(&mut self, condition: &Condition) -> Result<Option<String>, QueryError> {
        let (field, operator, value) = match condition {
            Condition::Raw { condition, .. } => return Ok(Some(condition.clone())),
            Condition::Field {
                field: Some(field),
                operator,
                value,
            } if !field.trim().is_empty() => (field, operator, value),
            Condition::Field { .. } => return Ok(None),
        };

        let field = self.check_fragment(field)?;
        let op = operator.trim().to_uppercase();
        if self.mode == Mode::Parameterized && !SAFE_OPERATORS.contains(&op.as_str()) {
            return Err(QueryError::UnsupportedOperator(operator.clone()));
        }
        // Inline rendering keeps the caller's spelling
        let shown = match self.mode {
            Mode::Inline => operator.trim(),
            Mode::Parameterized => op.as_str(),
        };

        let rendered = match (op.as_str(), value) {
            ("IN" | "NOT IN", Value::Array(items)) => {
                if items.is_empty() {
                    return Err(QueryError::BadOperand {
                        operator: op.clone(),
                        expected: "a non-empty list",
                    });
                }
                let list: Vec<String> = items.iter().map(|v| self.value(v)).collect();
                format!("{} {} ({})", field, shown, list.join(", "))
            }
            ("BETWEEN", Value::Array(items)) if items.len() == 2 => {
                let low = self.value(&items[0]);
                let high = self.value(&items[1]);
                format!("{} {} {} AND {}", field, shown, low, high)
            }
            ("BETWEEN", _) => {
                return Err(QueryError::BadOperand {
                    operator: op.clone(),
                    expected: "a two-element list",
                })
            }
            _ => format!("{} {} {}", field, shown, self.value(value)),
        };
        Ok(Some(rendered))
    }

    fn conditions(&mut self, keyword: &str, conditions: &[Condition]) -> Result<Option<String>, QueryError> {
        let mut parts = Vec::new();
        for condition in conditions {
            if let Some(part) = self.condition(condition)? {
                parts.push(part);
            }
        }
        Ok((!parts.is_empty()).then(|| format!("{} {}", keyword, parts.join(" AND "))))
    }

    fn join(&self, join: &JoinSpec) -> Result<Option<String>, QueryError> {
        let (Some(table), Some(on)) = (non_empty(&join.table), non_empty(&join.on)) else {
            return Ok(None);
        };
        let join_type = non_empty(&join.join_type).unwrap_or("INNER").to_uppercase();
        let table = self.check_fragment(table)?;
        let table_expr = match non_empty(&join.alias) {
            Some(alias) => format!("{} AS {}", table, self.check_fragment(alias)?),
            None => table.to_string(),
        };
        Ok(Some(format!("{} JOIN {} ON {}", join_type, table_expr, on)))
    }

    fn order(&self, order: &OrderSpec) -> Result<Option<String>, QueryError> {
        Ok(match order {
            OrderSpec::Column(name) if !name.trim().is_empty() => Some(self.check_fragment(name)?.to_string()),
            OrderSpec::Field { field, .. } if !field.trim().is_empty() => {
                let direction = order.direction();
                if self.mode == Mode::Parameterized && direction != "ASC" && direction != "DESC" {
                    return Err(QueryError::UnsafeIdentifier(direction));
                }
                Some(format!("{} {}", self.check_fragment(field)?, direction))
            }
            _ => None,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Statement separators, quotes and comment markers have no place in an identifier
fn is_unsafe_fragment(fragment: &str) -> bool {
    fragment.contains(';')
        || fragment.contains('\'')
        || fragment.contains('"')
        || fragment.contains("--")
        || fragment.contains("/*")
}

/// Coerce LIMIT/OFFSET to a non-negative integer
fn coerce_count(clause: &'static str, raw: &Value) -> Result<u64, QueryError> {
    let parsed = match raw {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok().or_else(|| {
            value::coerce_f64(raw)
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    };
    parsed.ok_or_else(|| QueryError::InvalidNumber {
        clause,
        value: raw.to_string(),
    })
}

/// Builds SQL text from a validated query spec.
///
/// Clauses are emitted in the fixed order SELECT, FROM, JOIN, WHERE,
/// GROUP BY, HAVING, ORDER BY, LIMIT, OFFSET; empty clauses are omitted.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    spec: QuerySpec,
}

impl QueryBuilder {
    /// Fails when `from` is missing; an empty select list becomes `*`
    pub fn new(mut spec: QuerySpec) -> Result<Self, QueryError> {
        if non_empty(&spec.from).is_none() {
            return Err(QueryError::MissingFrom);
        }
        spec.select.retain(|c| !c.trim().is_empty());
        if spec.select.is_empty() {
            spec.select = vec!["*".to_string()];
        }
        Ok(Self { spec })
    }

    /// Accepts a structured object or a JSON-encoded string
    pub fn from_json(input: &Value) -> Result<Self, QueryError> {
        let spec = QuerySpec::from_json(input).map_err(|_| QueryError::Malformed)?;
        Self::new(spec)
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// SQL with values inlined: strings single-quoted, null as `NULL`.
    ///
    /// RAW conditions and identifiers are emitted verbatim. Use
    /// [`build_parameterized`](Self::build_parameterized) for untrusted input.
    pub fn build(&self) -> Result<String, QueryError> {
        let mut renderer = Renderer::new(Mode::Inline);
        self.render(&mut renderer)
    }

    /// SQL with `?` placeholders and the bound values in order
    pub fn build_parameterized(&self) -> Result<SqlStatement, QueryError> {
        let mut renderer = Renderer::new(Mode::Parameterized);
        let sql = self.render(&mut renderer)?;
        Ok(SqlStatement {
            sql,
            params: renderer.params,
        })
    }

    fn render(&self, r: &mut Renderer) -> Result<String, QueryError> {
        let spec = &self.spec;
        let mut parts: Vec<String> = Vec::new();

        let select = spec
            .select
            .iter()
            .map(|c| r.check_fragment(c))
            .collect::<Result<Vec<_>, _>>()?;
        parts.push(format!("SELECT {}", select.join(", ")));

        let from = non_empty(&spec.from).ok_or(QueryError::MissingFrom)?;
        parts.push(format!("FROM {}", r.check_fragment(from)?));

        for join in &spec.joins {
            if let Some(clause) = r.join(join)? {
                parts.push(clause);
            }
        }

        if let Some(clause) = r.conditions("WHERE", &spec.where_)? {
            parts.push(clause);
        }

        if !spec.group_by.is_empty() {
            let cols = spec
                .group_by
                .iter()
                .map(|c| r.check_fragment(c))
                .collect::<Result<Vec<_>, _>>()?;
            parts.push(format!("GROUP BY {}", cols.join(", ")));
        }

        if let Some(clause) = r.conditions("HAVING", &spec.having)? {
            parts.push(clause);
        }

        let mut order = Vec::new();
        for item in &spec.order_by {
            if let Some(rendered) = r.order(item)? {
                order.push(rendered);
            }
        }
        if !order.is_empty() {
            parts.push(format!("ORDER BY {}", order.join(", ")));
        }

        if let Some(limit) = spec.limit.as_ref().filter(|v| !v.is_null()) {
            parts.push(format!("LIMIT {}", coerce_count("limit", limit)?));
        }
        if let Some(offset) = spec.offset.as_ref().filter(|v| !v.is_null()) {
            parts.push(format!("OFFSET {}", coerce_count("offset", offset)?));
        }

        let sql = parts.join(" ");
        debug!(fingerprint = %spec.fingerprint(), params = r.params.len(), "built SQL");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(spec: Value) -> String {
        QueryBuilder::from_json(&spec).unwrap().build().unwrap()
    }

    #[test]
    fn test_from_only() {
        assert_eq!(build(json!({"from": "tabSales Invoice"})), "SELECT * FROM tabSales Invoice");
    }

    #[test]
    fn test_where_number_and_string() {
        let sql = build(json!({
            "from": "people",
            "where": [
                {"field": "a", "operator": ">", "value": 5},
                {"field": "name", "operator": "=", "value": "Ann"}
            ]
        }));
        assert!(sql.contains("WHERE a > 5 AND name = 'Ann'"), "{}", sql);
    }

    #[test]
    fn test_null_and_quote_escaping() {
        let sql = build(json!({
            "from": "people",
            "where": [
                {"field": "manager", "operator": "IS", "value": null},
                {"field": "name", "operator": "=", "value": "O'Brien"}
            ]
        }));
        assert_eq!(sql, "SELECT * FROM people WHERE manager IS NULL AND name = 'O''Brien'");
    }

    #[test]
    fn test_full_clause_order() {
        let sql = build(json!({
            "select": ["u.name", "COUNT(*) as total"],
            "from": "User u",
            "joins": [
                {"type": "left", "table": "UserRole", "alias": "p", "on": "u.name = p.user"},
                {"table": "Skipped"}
            ],
            "where": [{"type": "RAW", "condition": "u.enabled = 1"}],
            "group_by": ["u.name"],
            "having": [{"field": "COUNT(*)", "operator": ">", "value": 5}],
            "order_by": [{"field": "total", "direction": "desc"}, "u.name"],
            "limit": "10",
            "offset": 20.0
        }));
        assert_eq!(
            sql,
            "SELECT u.name, COUNT(*) as total FROM User u \
             LEFT JOIN UserRole AS p ON u.name = p.user \
             WHERE u.enabled = 1 GROUP BY u.name HAVING COUNT(*) > 5 \
             ORDER BY total DESC, u.name LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_missing_from_is_invalid_spec() {
        let err = QueryBuilder::from_json(&json!({"select": ["a"]})).unwrap_err();
        assert!(matches!(err, QueryError::MissingFrom));
        assert_eq!(daltek_ir::DaltekError::from(err).kind(), "InvalidSpec");
    }

    #[test]
    fn test_malformed_input() {
        let err = QueryBuilder::from_json(&json!("{\"from\": ")).unwrap_err();
        assert_eq!(daltek_ir::DaltekError::from(err).kind(), "InvalidInput");
    }

    #[test]
    fn test_bad_limit() {
        let builder = QueryBuilder::from_json(&json!({"from": "t", "limit": "ten"})).unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidNumber { clause: "limit", .. }));
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = QueryBuilder::from_json(&json!({"from": "t", "where": [{"field": "a", "value": 1}]})).unwrap();
        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }

    #[test]
    fn test_parameterized() {
        let builder = QueryBuilder::from_json(&json!({
            "from": "invoices",
            "where": [
                {"field": "status", "operator": "in", "value": ["Paid", "Overdue"]},
                {"field": "amount", "operator": "between", "value": [100, 500]},
                {"field": "customer", "operator": "=", "value": "x' OR '1'='1"}
            ],
            "limit": 5
        }))
        .unwrap();
        let stmt = builder.build_parameterized().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM invoices WHERE status IN (?, ?) AND amount BETWEEN ? AND ? AND customer = ? LIMIT 5"
        );
        assert_eq!(
            stmt.params,
            vec![json!("Paid"), json!("Overdue"), json!(100), json!(500), json!("x' OR '1'='1")]
        );
    }

    #[test]
    fn test_parameterized_rejects_injection_in_identifiers() {
        let builder = QueryBuilder::from_json(&json!({
            "from": "t; DROP TABLE users",
        }))
        .unwrap();
        assert!(matches!(builder.build_parameterized(), Err(QueryError::UnsafeIdentifier(_))));

        let builder = QueryBuilder::from_json(&json!({
            "from": "t",
            "where": [{"field": "a", "operator": "= 1 OR 1 =", "value": 1}]
        }))
        .unwrap();
        assert!(matches!(builder.build_parameterized(), Err(QueryError::UnsupportedOperator(_))));
    }
}
