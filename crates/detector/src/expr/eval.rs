//! Tree-walking evaluator.
//!
//! `Unavailable` marks a value that cannot be computed: a missing attribute,
//! a division by zero, or mismatched operand types. It is absorbing, so any
//! expression that touches it is itself unavailable, and a guard only fires
//! on `Bool(true)`. This is the single place where "missing attribute means
//! the rule does not fire" is decided.

use std::collections::BTreeMap;
use std::fmt;

use tripwire_core::{AttributeSet, AttributeValue};

use super::{BinaryOp, Expr, UnaryOp};

/// Per-instance variable store.
pub type Variables = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    Unavailable,
}

impl Value {
    /// Guard semantics: only boolean `true` counts.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn number(n: f64) -> Value {
        if n.is_finite() {
            Value::Number(n)
        } else {
            Value::Unavailable
        }
    }
}

impl From<&AttributeValue> for Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Number(n) => Value::number(*n),
            AttributeValue::Text(s) => Value::Str(s.clone()),
            AttributeValue::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Unavailable => f.write_str("unavailable"),
        }
    }
}

impl Expr {
    /// Evaluate against one reading and one variable store. Never fails and
    /// never mutates its inputs; an unset variable reads as `0`.
    pub fn evaluate(&self, attributes: &AttributeSet, variables: &Variables) -> Value {
        match self {
            Expr::Number(n) => Value::number(*n),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Input { path, .. } => attributes
                .get(path)
                .map(Value::from)
                .unwrap_or(Value::Unavailable),
            Expr::Variable(name) => Value::number(variables.get(name).copied().unwrap_or(0.0)),
            Expr::Unary { op, operand } => unary(*op, operand.evaluate(attributes, variables)),
            Expr::Binary { op, left, right } => binary(
                *op,
                left.evaluate(attributes, variables),
                right.evaluate(attributes, variables),
            ),
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Value {
    match (op, value) {
        (UnaryOp::Neg, Value::Number(n)) => Value::number(-n),
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        _ => Value::Unavailable,
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    use Value::*;

    if matches!(left, Unavailable) || matches!(right, Unavailable) {
        return Unavailable;
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (Number(a), Number(b)) = (&left, &right) else {
                return Unavailable;
            };
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Add => Value::number(a + b),
                BinaryOp::Sub => Value::number(a - b),
                BinaryOp::Mul => Value::number(a * b),
                _ if b == 0.0 => Unavailable,
                _ => Value::number(a / b),
            }
        }
        BinaryOp::Greater | BinaryOp::GreaterEq | BinaryOp::Less | BinaryOp::LessEq => {
            let ordering = match (&left, &right) {
                (Number(a), Number(b)) => a.partial_cmp(b),
                (Str(a), Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Unavailable;
            };
            Bool(match op {
                BinaryOp::Greater => ordering.is_gt(),
                BinaryOp::GreaterEq => ordering.is_ge(),
                BinaryOp::Less => ordering.is_lt(),
                _ => ordering.is_le(),
            })
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equal = match (&left, &right) {
                (Number(a), Number(b)) => a == b,
                (Str(a), Str(b)) => a == b,
                (Bool(a), Bool(b)) => a == b,
                _ => return Unavailable,
            };
            Bool(if op == BinaryOp::Equal { equal } else { !equal })
        }
        BinaryOp::And => Bool(left.is_true() && right.is_true()),
        BinaryOp::Or => Bool(left.is_true() || right.is_true()),
    }
}
