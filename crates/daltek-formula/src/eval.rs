//! Compiled formulas and row evaluation

use serde_json::Value;

use daltek_ir::{value, Table};

use crate::ast::{BinOp, Expr, Function};
use crate::parser::{parse, FormulaError};

/// A formula parsed once and reusable across tables
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn compile(source: &str) -> Result<Self, FormulaError> {
        Ok(Self {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn columns(&self) -> Vec<String> {
        self.expr.columns()
    }

    /// Resolve column references against a table's header
    pub fn bind(&self, table: &Table) -> Result<BoundFormula, FormulaError> {
        Ok(BoundFormula {
            expr: resolve(&self.expr, table)?,
        })
    }

    /// Evaluate over every row of `table`
    pub fn evaluate(&self, table: &Table) -> Result<Vec<Value>, FormulaError> {
        let bound = self.bind(table)?;
        Ok(table.rows.iter().map(|row| bound.eval_row(row)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Column(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

fn resolve(expr: &Expr, table: &Table) -> Result<Node, FormulaError> {
    Ok(match expr {
        Expr::Number(n) => Node::Number(*n),
        Expr::Column(name) => Node::Column(
            table
                .column_index(name)
                .ok_or_else(|| FormulaError::UnknownColumn(name.clone()))?,
        ),
        Expr::Neg(inner) => Node::Neg(Box::new(resolve(inner, table)?)),
        Expr::Binary { op, left, right } => Node::Binary(
            *op,
            Box::new(resolve(left, table)?),
            Box::new(resolve(right, table)?),
        ),
        Expr::Call { func, args } => Node::Call(
            *func,
            args.iter()
                .map(|a| resolve(a, table))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

/// A formula whose columns are resolved to row positions
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFormula {
    expr: Node,
}

impl BoundFormula {
    /// Null when any referenced cell is null or non-numeric, or the result is not finite
    pub fn eval_row(&self, row: &[Value]) -> Value {
        eval(&self.expr, row).map(value::number).unwrap_or(Value::Null)
    }
}

fn eval(node: &Node, row: &[Value]) -> Option<f64> {
    let result = match node {
        Node::Number(n) => *n,
        Node::Column(idx) => value::coerce_f64(row.get(*idx)?)?,
        Node::Neg(inner) => -eval(inner, row)?,
        Node::Binary(op, left, right) => {
            let (l, r) = (eval(left, row)?, eval(right, row)?);
            match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div if r == 0.0 => return None,
                BinOp::Div => l / r,
            }
        }
        Node::Call(func, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, row))
                .collect::<Option<Vec<f64>>>()?;
            call(*func, &args)?
        }
    };
    result.is_finite().then_some(result)
}

fn call(func: Function, args: &[f64]) -> Option<f64> {
    let first = *args.first()?;
    Some(match func {
        Function::Abs => first.abs(),
        Function::Floor => first.floor(),
        Function::Ceil => first.ceil(),
        Function::Sqrt => first.sqrt(),
        Function::Exp => first.exp(),
        Function::Round => {
            let digits = args.get(1).copied().unwrap_or(0.0) as i32;
            let factor = 10f64.powi(digits);
            (first * factor).round() / factor
        }
        Function::Log => match args.get(1) {
            Some(base) => first.log(*base),
            None => first.ln(),
        },
        Function::Pow => first.powf(*args.get(1)?),
        Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
        Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}
