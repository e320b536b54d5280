//! Scripted expression evaluation.
//!
//! The [`Evaluator`] trait is the seam between condition compilation and the
//! expression language. [`ExprEvaluator`] is the default implementation,
//! backed by [`crate::expr`].

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{Result, ScriptError};
use crate::expr::{negate, parse_expression, BinOp, Expr};

/// Binding name under which the current principal is exposed.
pub const USER_BINDING: &str = "__user__";

/// Named values visible to an expression.
pub type Bindings = Map<String, Value>;

/// Evaluates a string expression against a binding context.
///
/// Implementations must be side-effect free.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value>;
}

/// Default evaluator for the built-in expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value> {
        parse_expression(expression)?.evaluate(bindings, &[])
    }
}

impl Expr {
    /// Evaluate against `bindings`, with `params[0]` bound to `?1`.
    pub fn evaluate(&self, bindings: &Bindings, params: &[Value]) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Param(n) => n
                .checked_sub(1)
                .and_then(|i| params.get(i))
                .cloned()
                .ok_or(ScriptError::MissingParam(*n)),
            Expr::Path(segments) => resolve_path(segments, bindings),
            Expr::List(items) => items
                .iter()
                .map(|item| item.evaluate(bindings, params))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&inner.evaluate(bindings, params)?))),
            Expr::Neg(inner) => match inner.evaluate(bindings, params)? {
                Value::Null => Ok(Value::Null),
                Value::Number(n) => Ok(negate(&n)),
                other => Err(ScriptError::Type(format!("cannot negate {other}"))),
            },
            Expr::Binary { op, left, right } => match op {
                BinOp::And => {
                    if !is_truthy(&left.evaluate(bindings, params)?) {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(is_truthy(&right.evaluate(bindings, params)?)))
                }
                BinOp::Or => {
                    if is_truthy(&left.evaluate(bindings, params)?) {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(is_truthy(&right.evaluate(bindings, params)?)))
                }
                cmp => {
                    let l = left.evaluate(bindings, params)?;
                    let r = right.evaluate(bindings, params)?;
                    compare(*cmp, &l, &r).map(Value::Bool)
                }
            },
            Expr::In {
                element,
                collection,
            } => {
                let needle = element.evaluate(bindings, params)?;
                match collection.evaluate(bindings, params)? {
                    Value::Null => Ok(Value::Bool(false)),
                    Value::Array(items) => Ok(Value::Bool(
                        !needle.is_null() && items.iter().any(|item| loose_eq(&needle, item)),
                    )),
                    other => Err(ScriptError::Type(format!(
                        "`in` expects a list, got {other}"
                    ))),
                }
            }
        }
    }
}

/// Truthiness used for conditions and logical operators.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn resolve_path(segments: &[String], bindings: &Bindings) -> Result<Value> {
    let (root, rest) = segments
        .split_first()
        .ok_or_else(|| ScriptError::Type("empty path".into()))?;
    let mut current = bindings
        .get(root)
        .ok_or_else(|| ScriptError::UnknownBinding(root.clone()))?;

    for segment in rest {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Value::Null),
        }
    }

    Ok(current.clone())
}

/// Equality where numbers compare by value (`1 == 1.0`).
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Comparisons involving `null` are false, mirroring SQL.
fn compare(op: BinOp, left: &Value, right: &Value) -> Result<bool> {
    if left.is_null() || right.is_null() {
        return Ok(match op {
            BinOp::Eq => left.is_null() && right.is_null(),
            BinOp::Ne => left.is_null() != right.is_null(),
            _ => false,
        });
    }

    match op {
        BinOp::Eq => return Ok(loose_eq(left, right)),
        BinOp::Ne => return Ok(!loose_eq(left, right)),
        _ => {}
    }

    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
    .ok_or_else(|| ScriptError::Type(format!("cannot order {left} and {right}")))?;

    Ok(match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => false,
    })
}
