//! Expression evaluation shared between `eval`/`calculate`/`compute` and the
//! dedicated `filter`/`where` boolean evaluator.
//!
//! This is a small interpreter over the already-parsed [`Expr`] tree — it
//! never routes a string through a host `eval`, per the explicit warning in
//! the design notes about that being a porting hazard from the source
//! implementation's use of Python's `eval`.

pub mod filter;
pub mod functions;
pub mod time;

use std::collections::HashMap;

use siftql_ast::{BinOp, Expr, ExprKind, Literal, UnOp};

use crate::error::Error;
use crate::table::Value;

pub type Row<'a> = HashMap<&'a str, &'a Value>;

pub fn eval_expr(expr: &Expr, row: &Row) -> Result<Value, Error> {
    match &expr.kind {
        ExprKind::Literal(lit) => Ok(literal_value(lit)),
        ExprKind::Ident(name) => Ok(row.get(name.as_str()).map(|v| (*v).clone()).unwrap_or(Value::Null)),
        ExprKind::FuncCall(call) => {
            let args = call
                .args
                .iter()
                .map(|a| eval_expr(a, row))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(&call.name, &args)
        }
        ExprKind::Binary(bin) => {
            let left = eval_expr(&bin.left, row)?;
            let right = eval_expr(&bin.right, row)?;
            eval_binary(bin.op, left, right)
        }
        ExprKind::Unary(un) => {
            let inner = eval_expr(&un.expr, row)?;
            Ok(match un.op {
                UnOp::Not => Value::Bool(!inner.as_bool()),
                UnOp::Neg => match inner.as_number() {
                    Some(n) => Value::Number(-n),
                    None => Value::Null,
                },
            })
        }
        ExprKind::Subquery(_) => Err(Error::semantic("a subquery cannot appear inside an expression")),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => Value::Number(*n),
        Literal::Bool(b) => Value::Bool(*b),
    }
}

fn eval_binary(op: BinOp, left: Value, right: Value) -> Result<Value, Error> {
    use BinOp::*;
    Ok(match op {
        Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) if !left.is_null() && !right.is_null() => {
                Value::String(format!("{}{}", left.as_str_repr(), right.as_str_repr()))
            }
            _ => numeric_op(left, right, |a, b| a + b),
        },
        Sub => numeric_op(left, right, |a, b| a - b),
        Mul => numeric_op(left, right, |a, b| a * b),
        Div => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Ok(Value::Null);
            };
            if b == 0.0 {
                return Err(Error::semantic("division by zero"));
            }
            Value::Number(a / b)
        }
        Eq => Value::Bool(values_equal(&left, &right)),
        Ne => Value::Bool(!values_equal(&left, &right)),
        Gt => Value::Bool(left.compare(&right) == std::cmp::Ordering::Greater),
        Lt => Value::Bool(left.compare(&right) == std::cmp::Ordering::Less),
        Ge => Value::Bool(left.compare(&right) != std::cmp::Ordering::Less),
        Le => Value::Bool(left.compare(&right) != std::cmp::Ordering::Greater),
        And => Value::Bool(left.as_bool() && right.as_bool()),
        Or => Value::Bool(left.as_bool() || right.as_bool()),
    })
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return left.is_null() && right.is_null();
    }
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => left.as_str_repr() == right.as_str_repr(),
    }
}

fn numeric_op(left: Value, right: Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Value::Number(f(a, b)),
        _ => Value::Null,
    }
}
