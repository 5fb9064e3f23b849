//! Formula AST

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Column(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Column names referenced anywhere in the expression, first occurrence first
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_columns(out)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Allow-listed functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Function {
    Abs,
    Round,
    Floor,
    Ceil,
    Sqrt,
    Pow,
    Min,
    Max,
    Log,
    Exp,
}

impl Function {
    pub const ALL: [Function; 10] = [
        Function::Abs,
        Function::Round,
        Function::Floor,
        Function::Ceil,
        Function::Sqrt,
        Function::Pow,
        Function::Min,
        Function::Max,
        Function::Log,
        Function::Exp,
    ];

    pub fn from_name(name: &str) -> Option<Function> {
        let lower = name.to_lowercase();
        Function::ALL.into_iter().find(|f| f.name() == lower)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Sqrt => "sqrt",
            Function::Pow => "pow",
            Function::Min => "min",
            Function::Max => "max",
            Function::Log => "log",
            Function::Exp => "exp",
        }
    }

    /// Accepted argument counts, inclusive. `None` upper bound means variadic.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Abs | Function::Floor | Function::Ceil | Function::Sqrt | Function::Exp => {
                (1, Some(1))
            }
            Function::Round | Function::Log => (1, Some(2)),
            Function::Pow => (2, Some(2)),
            Function::Min | Function::Max => (1, None),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
