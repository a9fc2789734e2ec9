//! The `filter`/`where` predicate evaluator.
//!
//! The parser captures the command tail as a raw string (§9); this is where
//! it gets re-tokenized and re-parsed through the exact same `or_expr`
//! grammar used by `eval`, then reduced to a boolean with [`super::eval_expr`].

use siftql_parser::parse_expression;

use crate::error::Error;
use crate::eval::{eval_expr, Row};

pub fn matches(raw_expression: &str, row: &Row) -> Result<bool, Error> {
    let expr = parse_expression(raw_expression)?;
    let value = eval_expr(&expr, row)?;
    Ok(value.as_bool())
}
