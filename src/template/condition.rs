//! Condition expressions declared under `Conditions`

use crate::document::{KeyPath, Value};

use super::error::ResolveError;

/// Upper bound on the operands of `Fn::And` / `Fn::Or`
const MAX_OPERANDS: usize = 10;

/// A compiled condition body
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    /// `true` / `false`
    Literal(bool),
    /// `{"Fn::Equals": [a, b]}`; operands may still hold placeholders
    Equals(Value, Value),
    And(Vec<ConditionExpr>),
    Or(Vec<ConditionExpr>),
    Not(Box<ConditionExpr>),
    /// `{"Condition": name}`
    Reference(String),
}

impl ConditionExpr {
    /// Compile a condition body, rejecting anything outside the condition functions
    pub fn compile(body: &Value, path: &KeyPath) -> Result<Self, ResolveError> {
        let mapping = match body {
            Value::Bool(b) => return Ok(ConditionExpr::Literal(*b)),
            Value::Mapping(m) if m.len() == 1 => m,
            other => {
                return Err(ResolveError::malformed_condition(
                    path,
                    format!("expected a condition function, found {}", other.kind()),
                ))
            }
        };

        let Some((function, argument)) = mapping.iter().next() else {
            return Err(ResolveError::malformed_condition(path, "empty condition"));
        };
        let fn_path = path.child(function.as_str());

        match function.as_str() {
            "Fn::Equals" => {
                let operands = operands(argument, &fn_path, 2, 2)?;
                Ok(ConditionExpr::Equals(operands[0].clone(), operands[1].clone()))
            }
            "Fn::And" | "Fn::Or" => {
                let operands = operands(argument, &fn_path, 2, MAX_OPERANDS)?;
                let compiled = operands
                    .iter()
                    .enumerate()
                    .map(|(i, operand)| Self::compile(operand, &fn_path.index(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                if function == "Fn::And" {
                    Ok(ConditionExpr::And(compiled))
                } else {
                    Ok(ConditionExpr::Or(compiled))
                }
            }
            "Fn::Not" => {
                let operands = operands(argument, &fn_path, 1, 1)?;
                let inner = Self::compile(&operands[0], &fn_path.index(0))?;
                Ok(ConditionExpr::Not(Box::new(inner)))
            }
            "Condition" => match argument {
                Value::String(name) => Ok(ConditionExpr::Reference(name.clone())),
                other => Err(ResolveError::malformed_condition(
                    &fn_path,
                    format!("condition name must be a string, found {}", other.kind()),
                )),
            },
            other => Err(ResolveError::malformed_condition(
                path,
                format!("unsupported condition function '{}'", other),
            )),
        }
    }
}

fn operands<'v>(
    argument: &'v Value,
    path: &KeyPath,
    min: usize,
    max: usize,
) -> Result<&'v [Value], ResolveError> {
    let items = argument.as_sequence().ok_or_else(|| {
        ResolveError::malformed_condition(
            path,
            format!("expected a sequence of operands, found {}", argument.kind()),
        )
    })?;
    if items.len() < min || items.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(ResolveError::malformed_condition(
            path,
            format!("expected {} operands, found {}", expected, items.len()),
        ));
    }
    Ok(items)
}

/// Equality used by `Fn::Equals`: scalars compare by text form
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.scalar_text(), b.scalar_text()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
