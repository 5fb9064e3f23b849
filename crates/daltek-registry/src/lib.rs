//! Operation registry and validation rules
//!
//! Which aggregations, filter operators and calculation helpers apply to
//! which column types, plus the validators built on top of that table.

use daltek_ir::{AggFunc, ColumnType, FilterOp, PERCENTILES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod mapping;
mod query;
mod widget;

pub use mapping::{DataShape, MappingValidator};
pub use query::{QueryBatchError, QueryBatchReport, QueryCheck, QueryValidator};
pub use widget::{
    WidgetBatchError, WidgetBatchReport, WidgetCheck, WidgetValidator, SUPPORTED_WIDGET_TYPES,
};

/// Outcome of an advisory validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Everything a column of one type supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operations {
    pub aggregations: Vec<AggFunc>,
    pub operators: Vec<FilterOp>,
    pub calculations: Vec<String>,
}

const BASE_CALCULATIONS: [&str; 7] = ["add", "subtract", "multiply", "divide", "percentage", "round", "abs"];
const TEXT_CALCULATIONS: [&str; 4] = ["upper", "lower", "trim", "concat"];
const DATE_CALCULATIONS: [&str; 5] = ["date_diff", "extract_year", "extract_month", "extract_day", "format_date"];

pub struct OperationRegistry {
    operations: HashMap<ColumnType, Operations>,
    version: String,
}

impl OperationRegistry {
    pub fn new(version: impl Into<String>) -> Self {
        let mut registry = Self {
            operations: HashMap::new(),
            version: version.into(),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        use AggFunc::*;
        use FilterOp::*;

        let mut numeric_aggs = vec![Sum, Avg, Mean, Min, Max, Count, Median, Std, Var];
        numeric_aggs.extend(PERCENTILES.iter().map(|&p| Percentile(p)));

        self.register(
            ColumnType::Numeric,
            numeric_aggs,
            vec![Eq, Ne, Gt, Gte, Lt, Lte, Between],
            &[],
        );

        self.register(
            ColumnType::Text,
            vec![Count, CountUnique, First, Last, Concat],
            vec![Eq, Ne, Contains, NotContains, StartsWith, EndsWith, In, NotIn],
            &TEXT_CALCULATIONS,
        );

        self.register(
            ColumnType::Date,
            vec![Count, Min, Max, First, Last],
            vec![
                Eq,
                Ne,
                Gt,
                Gte,
                Lt,
                Lte,
                Between,
                DateEquals,
                DateBefore,
                DateAfter,
                DateBetween,
            ],
            &DATE_CALCULATIONS,
        );

        // Booleans get the same conservative set as untyped columns
        for column_type in [ColumnType::Boolean, ColumnType::Unknown] {
            self.register(column_type, vec![Count, CountUnique], vec![Eq, Ne, In, NotIn], &[]);
        }
    }

    /// Register the operations of a column type. Null checks and the base
    /// calculation helpers are added to every type.
    pub fn register(
        &mut self,
        column_type: ColumnType,
        aggregations: Vec<AggFunc>,
        mut operators: Vec<FilterOp>,
        extra_calculations: &[&str],
    ) {
        for op in [FilterOp::IsNull, FilterOp::IsNotNull] {
            if !operators.contains(&op) {
                operators.push(op);
            }
        }
        let calculations = BASE_CALCULATIONS
            .iter()
            .chain(extra_calculations)
            .map(|c| c.to_string())
            .collect();

        self.operations.insert(
            column_type,
            Operations {
                aggregations,
                operators,
                calculations,
            },
        );
    }

    pub fn lookup(&self, column_type: ColumnType) -> &Operations {
        self.operations
            .get(&column_type)
            .or_else(|| self.operations.get(&ColumnType::Unknown))
            .unwrap_or(&EMPTY)
    }

    pub fn compatible_aggregations(&self, column_type: ColumnType) -> &[AggFunc] {
        &self.lookup(column_type).aggregations
    }

    pub fn compatible_operators(&self, column_type: ColumnType) -> &[FilterOp] {
        &self.lookup(column_type).operators
    }

    pub fn supports_aggregation(&self, column_type: ColumnType, func: AggFunc) -> bool {
        self.compatible_aggregations(column_type).contains(&func)
    }

    pub fn supports_operator(&self, column_type: ColumnType, op: FilterOp) -> bool {
        self.compatible_operators(column_type).contains(&op)
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

static EMPTY: Operations = Operations {
    aggregations: Vec::new(),
    operators: Vec::new(),
    calculations: Vec::new(),
};

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new("0.1.0")
    }
}
