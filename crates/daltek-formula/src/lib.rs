//! Restricted arithmetic for calculated columns
//!
//! Formulas reference columns by name (`revenue - cost`, or `[Grand Total]`
//! for names with spaces), numeric literals, `+ - * /`, parentheses, unary
//! minus and a fixed set of math functions. Nothing else parses.

pub mod ast;
mod eval;
pub mod parser;

pub use ast::*;
pub use eval::{BoundFormula, Formula};
pub use parser::{parse, FormulaError};
