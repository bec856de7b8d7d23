//! Guard and variable-update expressions.
//!
//! ```text
//! or       := and ("||" and)*
//! and      := cmp ("&&" cmp)*
//! cmp      := additive (("<" | "<=" | ">" | ">=" | "==" | "!=") additive)?
//! additive := mul (("+" | "-") mul)*
//! mul      := unary (("*" | "/") unary)*
//! unary    := ("-" | "!") unary | primary
//! primary  := number | string | true | false | $input.In.path | $variable.name | "(" or ")"
//! ```
//!
//! Expressions are parsed once when a model is validated and evaluated many
//! times against a reading's attributes and an instance's variables.

mod eval;
mod parser;
mod token;

use std::fmt;

pub use eval::{Value, Variables};

/// A malformed expression, with the character offset of the problem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (at position {position})")]
pub struct ExprError {
    pub message: String,
    pub position: usize,
}

impl ExprError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }

    fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOp::Greater | BinaryOp::GreaterEq | BinaryOp::Less | BinaryOp::LessEq
        )
    }

    fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Str(String),
    /// Attribute of the declared input, addressed by dotted path.
    Input { input: String, path: String },
    Variable(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

/// What an expression can produce, as far as is known before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Number,
    Boolean,
    Text,
    /// Depends on the reading (attribute references).
    Any,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Number => "number",
            Shape::Boolean => "boolean",
            Shape::Text => "string",
            Shape::Any => "any",
        };
        f.write_str(name)
    }
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let tokens = token::tokenize(source)?;
        parser::Parser::new(tokens).parse()
    }

    /// Every `$input.<Name>.<path>` reference, in source order.
    pub fn input_refs(&self) -> Vec<(&str, &str)> {
        let mut refs = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Input { input, path } = e {
                refs.push((input.as_str(), path.as_str()));
            }
        });
        refs
    }

    /// Every `$variable.<name>` reference, in source order.
    pub fn variable_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Variable(name) = e {
                refs.push(name.as_str());
            }
        });
        refs
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            _ => {}
        }
    }

    /// Static type check. Returns the result shape, or a description of the
    /// first operand whose shape can never fit its operator.
    pub fn shape(&self) -> Result<Shape, String> {
        match self {
            Expr::Number(_) | Expr::Variable(_) => Ok(Shape::Number),
            Expr::Bool(_) => Ok(Shape::Boolean),
            Expr::Str(_) => Ok(Shape::Text),
            Expr::Input { .. } => Ok(Shape::Any),
            Expr::Unary { op, operand } => {
                let inner = operand.shape()?;
                let (want, name) = match op {
                    UnaryOp::Neg => (Shape::Number, "-"),
                    UnaryOp::Not => (Shape::Boolean, "!"),
                };
                if inner != want && inner != Shape::Any {
                    return Err(format!("operator '{name}' expects a {want}, got a {inner}"));
                }
                Ok(want)
            }
            Expr::Binary { op, left, right } => {
                let l = left.shape()?;
                let r = right.shape()?;
                let op = *op;
                let fits = |s: Shape, want: Shape| s == want || s == Shape::Any;

                if op.is_arithmetic() {
                    for s in [l, r] {
                        if !fits(s, Shape::Number) {
                            return Err(format!(
                                "operator '{}' expects numbers, got a {s}",
                                op.symbol()
                            ));
                        }
                    }
                    Ok(Shape::Number)
                } else if op.is_ordering() {
                    for s in [l, r] {
                        if !fits(s, Shape::Number) && !fits(s, Shape::Text) {
                            return Err(format!(
                                "operator '{}' cannot compare a {s}",
                                op.symbol()
                            ));
                        }
                    }
                    if l != Shape::Any && r != Shape::Any && l != r {
                        return Err(format!(
                            "operator '{}' compares a {l} with a {r}",
                            op.symbol()
                        ));
                    }
                    Ok(Shape::Boolean)
                } else if op.is_logical() {
                    for s in [l, r] {
                        if !fits(s, Shape::Boolean) {
                            return Err(format!(
                                "operator '{}' expects booleans, got a {s}",
                                op.symbol()
                            ));
                        }
                    }
                    Ok(Shape::Boolean)
                } else {
                    if l != Shape::Any && r != Shape::Any && l != r {
                        return Err(format!(
                            "operator '{}' compares a {l} with a {r}",
                            op.symbol()
                        ));
                    }
                    Ok(Shape::Boolean)
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Expr::Input { input, path } => write!(f, "$input.{input}.{path}"),
            Expr::Variable(name) => write!(f, "$variable.{name}"),
            Expr::Unary { op: UnaryOp::Neg, operand } => write!(f, "-{operand}"),
            Expr::Unary { op: UnaryOp::Not, operand } => write!(f, "!{operand}"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}
