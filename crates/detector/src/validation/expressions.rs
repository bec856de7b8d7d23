//! Expression and payload-template checks.

use crate::expr::{Expr, Shape};
use crate::schema::InputDefinition;

use super::fuzzy::fuzzy_match;
use super::ValidationResult;

/// Parse `source` and check its `$input` references against the declared input.
fn parse(
    path: &str,
    source: &str,
    input: Option<&InputDefinition>,
    result: &mut ValidationResult,
) -> Option<Expr> {
    let expr = match Expr::parse(source) {
        Ok(expr) => expr,
        Err(e) => {
            result.error(path, format!("invalid expression '{source}': {e}"));
            return None;
        }
    };

    if let Some(input) = input {
        let declared = input.paths();
        for (name, attribute) in expr.input_refs() {
            if name != input.input_name {
                result.error_with_suggestion(
                    path,
                    format!("unknown input '{name}'"),
                    Some(input.input_name.as_str()),
                );
                continue;
            }
            if !declared.is_empty() && !declared.contains(&attribute) {
                result.error_with_suggestion(
                    path,
                    format!("attribute '{attribute}' is not declared by input '{name}'"),
                    fuzzy_match(attribute, &declared),
                );
            }
        }
    }

    match expr.shape() {
        Ok(_) => Some(expr),
        Err(msg) => {
            result.error(path, format!("type error in '{source}': {msg}"));
            None
        }
    }
}

/// A guard must be able to produce a boolean.
pub(super) fn guard(
    path: &str,
    source: &str,
    input: Option<&InputDefinition>,
    result: &mut ValidationResult,
) -> Option<Expr> {
    let expr = parse(path, source, input, result)?;
    match expr.shape() {
        Ok(shape @ (Shape::Number | Shape::Text)) => {
            result.error(
                path,
                format!("condition '{source}' always produces a {shape}, never a boolean"),
            );
            None
        }
        _ => Some(expr),
    }
}

/// A `setVariable` value must be able to produce a number.
pub(super) fn value(
    path: &str,
    source: &str,
    input: Option<&InputDefinition>,
    result: &mut ValidationResult,
) -> Option<Expr> {
    let expr = parse(path, source, input, result)?;
    match expr.shape() {
        Ok(shape @ (Shape::Boolean | Shape::Text)) => {
            result.error(
                path,
                format!("value '{source}' always produces a {shape}, but variables hold numbers"),
            );
            None
        }
        _ => Some(expr),
    }
}

/// Payload templates are minijinja; only syntax can be checked up front.
pub(super) fn payload_template(path: &str, template: &str, result: &mut ValidationResult) -> bool {
    let env = minijinja::Environment::new();
    match env.template_from_str(template) {
        Ok(_) => true,
        Err(e) => {
            result.error(path, format!("invalid payload template: {e}"));
            false
        }
    }
}
