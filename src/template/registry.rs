//! Declarations collected from a template's `Parameters` and `Conditions` sections

use std::collections::HashMap;

use crate::document::{Document, KeyPath, Value};

use super::condition::ConditionExpr;
use super::error::ResolveError;

/// A declared template parameter with its constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub param_type: Option<String>,
    pub default: Option<Value>,
    pub allowed_values: Option<Vec<Value>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl ParameterDecl {
    /// Read a declaration body such as `{"Type": "String", "AllowedValues": [...]}`
    pub fn from_value(name: &str, body: &Value, path: &KeyPath) -> Result<Self, ResolveError> {
        let invalid = |reason: String| ResolveError::InvalidDeclaration {
            path: path.clone(),
            reason,
        };
        let body = body
            .as_mapping()
            .ok_or_else(|| invalid(format!("expected a mapping, found {}", body.kind())))?;

        let param_type = match body.get("Type") {
            None => None,
            Some(Value::String(t)) => Some(t.clone()),
            Some(other) => return Err(invalid(format!("'Type' must be a string, found {}", other.kind()))),
        };

        let allowed_values = match body.get("AllowedValues") {
            None => None,
            Some(Value::Sequence(items)) => Some(items.clone()),
            Some(other) => {
                return Err(invalid(format!(
                    "'AllowedValues' must be a sequence, found {}",
                    other.kind()
                )))
            }
        };

        let number = |key: &str| -> Result<Option<f64>, ResolveError> {
            match body.get(key) {
                None => Ok(None),
                Some(v) => numeric(v)
                    .map(Some)
                    .ok_or_else(|| invalid(format!("'{}' must be a number, found {}", key, v.kind()))),
            }
        };
        let length = |key: &str| -> Result<Option<usize>, ResolveError> {
            match number(key)? {
                None => Ok(None),
                Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as usize)),
                Some(n) => Err(invalid(format!("'{}' must be a non-negative integer, found {}", key, n))),
            }
        };

        let default = body.get("Default").cloned();
        if default.as_ref().is_some_and(Value::has_placeholders) {
            return Err(invalid("'Default' must be a literal value".to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            param_type,
            default,
            allowed_values,
            min_length: length("MinLength")?,
            max_length: length("MaxLength")?,
            min_value: number("MinValue")?,
            max_value: number("MaxValue")?,
        })
    }

    /// Check a value against every declared constraint
    pub fn check(&self, value: &Value, path: &KeyPath) -> Result<(), ResolveError> {
        // List parameters are checked element by element
        if let Value::Sequence(items) = value {
            for item in items {
                self.check(item, path)?;
            }
            return Ok(());
        }

        let text = value.scalar_text().unwrap_or_else(|| value.kind().to_string());
        let violation = |constraint: String| ResolveError::ConstraintViolation {
            path: path.clone(),
            parameter: self.name.clone(),
            value: text.clone(),
            constraint,
        };

        if let Some(allowed) = &self.allowed_values {
            let found = allowed
                .iter()
                .any(|candidate| candidate.scalar_text().as_deref() == Some(text.as_str()));
            if !found {
                let listed: Vec<String> = allowed
                    .iter()
                    .map(|v| v.scalar_text().unwrap_or_else(|| v.kind().to_string()))
                    .collect();
                return Err(violation(format!("AllowedValues [{}]", listed.join(", "))));
            }
        }

        let chars = text.chars().count();
        if let Some(min) = self.min_length {
            if chars < min {
                return Err(violation(format!("MinLength {}", min)));
            }
        }
        if let Some(max) = self.max_length {
            if chars > max {
                return Err(violation(format!("MaxLength {}", max)));
            }
        }

        if self.min_value.is_some() || self.max_value.is_some() {
            let n = numeric(value).ok_or_else(|| violation("a numeric value".to_string()))?;
            if let Some(min) = self.min_value {
                if n < min {
                    return Err(violation(format!("MinValue {}", min)));
                }
            }
            if let Some(max) = self.max_value {
                if n > max {
                    return Err(violation(format!("MaxValue {}", max)));
                }
            }
        }
        Ok(())
    }
}

/// Numbers and numeric strings both count as numbers for parameter checks
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Registry of parameter declarations and compiled conditions for one document
#[derive(Debug, Default)]
pub struct Declarations {
    parameters: HashMap<String, ParameterDecl>,
    conditions: HashMap<String, ConditionExpr>,
}

impl Declarations {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every parameter and condition declared in a document
    pub fn collect(doc: &Document) -> Result<Self, ResolveError> {
        let mut declarations = Self::new();

        if let Some(params) = doc.parameters() {
            let section = KeyPath::root().child("Parameters");
            for (name, body) in params.iter() {
                let decl = ParameterDecl::from_value(name, body, &section.child(name.as_str()))?;
                declarations.parameters.insert(name.clone(), decl);
            }
        }

        if let Some(conditions) = doc.conditions() {
            let section = KeyPath::root().child("Conditions");
            for (name, body) in conditions.iter() {
                let expr = ConditionExpr::compile(body, &section.child(name.as_str()))?;
                declarations.conditions.insert(name.clone(), expr);
            }
        }

        Ok(declarations)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDecl> {
        self.parameters.get(name)
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionExpr> {
        self.conditions.get(name)
    }
}
