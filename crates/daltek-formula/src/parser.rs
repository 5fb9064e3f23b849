//! Pest-based parser for calculated-column formulas

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use daltek_ir::DaltekError;

use crate::ast::*;

#[derive(Parser)]
#[grammar = "formula.pest"]
pub struct FormulaParser;

#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Pest error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{func}' takes {expected} argument(s), got {got}")]
    Arity {
        func: Function,
        expected: String,
        got: usize,
    },

    #[error("Column '{0}' does not exist in the data")]
    UnknownColumn(String),
}

impl From<FormulaError> for DaltekError {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::UnknownColumn(_) => DaltekError::Validation(err.to_string()),
            other => DaltekError::InvalidSpec(format!("invalid formula: {}", other)),
        }
    }
}

/// Parse formula text into an expression tree
pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    let mut pairs = FormulaParser::parse(Rule::formula, source).map_err(Box::new)?;
    let formula = pairs
        .next()
        .ok_or_else(|| FormulaError::Syntax("Empty formula".to_string()))?;
    let expr = formula
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| FormulaError::Syntax("Empty formula".to_string()))?;
    build_expr(expr)
}

fn next_pair<'i>(inner: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, FormulaError> {
    inner
        .next()
        .ok_or_else(|| FormulaError::Syntax(format!("Missing {}", what)))
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, FormulaError> {
    match pair.as_rule() {
        Rule::expr | Rule::term => {
            // Flat sequence: operand (op operand)*
            let mut inner = pair.into_inner();
            let mut left = build_expr(next_pair(&mut inner, "operand")?)?;

            while let Some(op_pair) = inner.next() {
                let op = match op_pair.as_str() {
                    "+" => BinOp::Add,
                    "-" => BinOp::Sub,
                    "*" => BinOp::Mul,
                    "/" => BinOp::Div,
                    other => return Err(FormulaError::Syntax(format!("Unknown operator: {}", other))),
                };
                let right = build_expr(next_pair(&mut inner, "right operand")?)?;
                left = Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            }

            Ok(left)
        }
        Rule::unary => {
            let mut negations = 0;
            let mut operand = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::neg => negations += 1,
                    _ => operand = Some(build_expr(inner)?),
                }
            }
            let mut expr = operand.ok_or_else(|| FormulaError::Syntax("Missing operand".to_string()))?;
            for _ in 0..negations {
                expr = Expr::Neg(Box::new(expr));
            }
            Ok(expr)
        }
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| FormulaError::Syntax(format!("Invalid number: {}", pair.as_str()))),
        Rule::column => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| FormulaError::Syntax("Empty column reference".to_string()))?;
            let name = match inner.as_rule() {
                Rule::bracketed => inner.into_inner().as_str().trim().to_string(),
                _ => inner.as_str().to_string(),
            };
            Ok(Expr::Column(name))
        }
        Rule::func_call => build_call(pair),
        other => Err(FormulaError::Syntax(format!("Cannot parse expr: {:?}", other))),
    }
}

fn build_call(pair: Pair<Rule>) -> Result<Expr, FormulaError> {
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "function name")?.as_str();
    let func = Function::from_name(name).ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
    let args = inner.map(build_expr).collect::<Result<Vec<_>, _>>()?;

    let (min, max) = func.arity();
    let too_many = max.map_or(false, |m| args.len() > m);
    if args.len() < min || too_many {
        let expected = match max {
            Some(m) if m == min => min.to_string(),
            Some(m) => format!("{}-{}", min, m),
            None => format!("at least {}", min),
        };
        return Err(FormulaError::Arity {
            func,
            expected,
            got: args.len(),
        });
    }

    Ok(Expr::Call { func, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Add,
                left: col("a"),
                right: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    left: col("b"),
                    right: Box::new(Expr::Number(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse("10 - 4 - 3").unwrap();
        match expr {
            Expr::Binary { op: BinOp::Sub, left, right } => {
                assert_eq!(*right, Expr::Number(3.0));
                assert!(matches!(*left, Expr::Binary { op: BinOp::Sub, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bracketed_columns_and_functions() {
        let expr = parse("round([Grand Total] / qty, 2)").unwrap();
        assert_eq!(expr.columns(), vec!["Grand Total", "qty"]);
        assert!(matches!(expr, Expr::Call { func: Function::Round, .. }));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(parse("--x").unwrap(), Expr::Neg(Box::new(Expr::Neg(col("x")))));
    }

    #[test]
    fn test_rejects_non_arithmetic() {
        assert!(parse("__import__('os')").is_err());
        assert!(parse("a ** b").is_err());
        assert!(parse("a; b").is_err());
        assert!(matches!(parse("eval(x)"), Err(FormulaError::UnknownFunction(_))));
        assert!(matches!(parse("pow(x)"), Err(FormulaError::Arity { .. })));
    }
}
