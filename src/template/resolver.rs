//! Reference resolution - replaces placeholders with concrete values

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::context::{ParameterContext, PseudoValue};
use crate::document::{Document, KeyPath, Mapping, Placeholder, Segment, Value, CONDITIONAL_SECTIONS};

use super::condition::{values_equal, ConditionExpr};
use super::error::ResolveError;
use super::registry::Declarations;

/// State for a single resolve call
#[derive(Debug)]
pub struct ResolutionContext<'a> {
    /// Caller-supplied values
    pub params: &'a ParameterContext,
    /// Declared parameters and conditions
    pub declarations: &'a Declarations,
    /// Conditions evaluated so far in this call
    pub condition_cache: HashMap<String, bool>,
    /// Conditions currently being evaluated (for cycle detection)
    pub resolving: Vec<String>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(params: &'a ParameterContext, declarations: &'a Declarations) -> Self {
        Self {
            params,
            declarations,
            condition_cache: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Check if a condition is currently being evaluated (cycle detection)
    pub fn is_resolving(&self, name: &str) -> bool {
        self.resolving.iter().any(|n| n == name)
    }

    /// Mark a condition as being evaluated
    pub fn start_resolving(&mut self, name: &str) {
        self.resolving.push(name.to_string());
    }

    /// Mark a condition as done
    pub fn done_resolving(&mut self, name: &str) {
        if let Some(pos) = self.resolving.iter().rposition(|n| n == name) {
            self.resolving.remove(pos);
        }
    }

    /// Resolve a value tree.
    ///
    /// Returns `None` when the value resolved to `AWS::NoValue` and should be
    /// removed from its parent.
    pub fn resolve_value(&mut self, value: &Value, path: &KeyPath) -> Result<Option<Value>, ResolveError> {
        match value {
            Value::Placeholder(placeholder) => self.resolve_placeholder(placeholder, path),
            Value::Sequence(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    if let Some(v) = self.resolve_value(item, &path.index(i))? {
                        resolved.push(v);
                    }
                }
                Ok(Some(Value::Sequence(resolved)))
            }
            Value::Mapping(mapping) => Ok(Some(Value::Mapping(self.resolve_mapping(mapping, path)?))),
            scalar => Ok(Some(scalar.clone())),
        }
    }

    fn resolve_mapping(&mut self, mapping: &Mapping, path: &KeyPath) -> Result<Mapping, ResolveError> {
        let mut resolved = Mapping::new();
        for (key, value) in mapping.iter() {
            if let Some(v) = self.resolve_value(value, &path.child(key.as_str()))? {
                resolved.insert(key.clone(), v);
            }
        }
        Ok(resolved)
    }

    /// Resolve a value that must not disappear
    fn resolve_required(&mut self, value: &Value, path: &KeyPath) -> Result<Value, ResolveError> {
        self.resolve_value(value, path)?
            .ok_or_else(|| ResolveError::type_mismatch(path, "AWS::NoValue is not allowed here"))
    }

    fn resolve_placeholder(
        &mut self,
        placeholder: &Placeholder,
        path: &KeyPath,
    ) -> Result<Option<Value>, ResolveError> {
        match placeholder {
            Placeholder::ParamRef { name } => self.lookup_parameter(name, path),
            Placeholder::AttrRef {
                resource,
                attribute,
            } => self.lookup_attribute(resource, attribute, path).map(Some),
            Placeholder::Interpolate {
                segments, parts, ..
            } => self.interpolate(segments, parts, path).map(|s| Some(Value::String(s))),
            Placeholder::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let fn_path = path.child("Fn::If");
                // Only the selected branch is resolved
                if self.evaluate_condition(condition, &fn_path.index(0))? {
                    self.resolve_value(if_true, &fn_path.index(1))
                } else {
                    self.resolve_value(if_false, &fn_path.index(2))
                }
            }
        }
    }

    /// Resolve a `Ref` name: parameter, declared default, pseudo parameter, then resource id
    fn lookup_parameter(&mut self, name: &str, path: &KeyPath) -> Result<Option<Value>, ResolveError> {
        let declared = self.declarations.parameter(name);
        let chosen = self
            .params
            .parameter(name)
            .cloned()
            .or_else(|| declared.and_then(|d| d.default.clone()));

        if let Some(value) = chosen {
            if let Some(decl) = declared {
                decl.check(&value, path)?;
            }
            return Ok(Some(value));
        }

        match self.params.pseudo().lookup(name) {
            Some(PseudoValue::Value(value)) => return Ok(Some(value)),
            Some(PseudoValue::NoValue) => return Ok(None),
            None => {}
        }

        self.params
            .physical_id(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ResolveError::unresolved(path, name))
    }

    fn lookup_attribute(&self, resource: &str, attribute: &str, path: &KeyPath) -> Result<Value, ResolveError> {
        self.params
            .attribute(resource, attribute)
            .cloned()
            .ok_or_else(|| ResolveError::unresolved(path, format!("{}.{}", resource, attribute)))
    }

    fn interpolate(&mut self, segments: &[Segment], parts: &Mapping, path: &KeyPath) -> Result<String, ResolveError> {
        let fn_path = path.child("Fn::Sub");

        let mut resolved_parts = HashMap::new();
        for (name, part) in parts.iter() {
            let value = self.resolve_required(part, &fn_path.index(1).child(name.as_str()))?;
            resolved_parts.insert(name.as_str(), value);
        }

        let mut out = String::new();
        for segment in segments {
            let name = match segment {
                Segment::Literal(text) => {
                    out.push_str(text);
                    continue;
                }
                Segment::Variable(name) => name,
            };

            let value = if let Some(part) = resolved_parts.get(name.as_str()) {
                part.clone()
            } else if let Some((resource, attribute)) = name.split_once('.') {
                self.lookup_attribute(resource, attribute, path)?
            } else {
                self.lookup_parameter(name, path)?.ok_or_else(|| {
                    ResolveError::type_mismatch(path, format!("'${{{}}}' resolved to AWS::NoValue", name))
                })?
            };

            let text = value.scalar_text().ok_or_else(|| {
                ResolveError::type_mismatch(
                    path,
                    format!("'${{{}}}' resolved to a {}, expected a scalar", name, value.kind()),
                )
            })?;
            out.push_str(&text);
        }
        Ok(out)
    }

    /// Evaluate a named condition, at most once per resolve call
    pub fn evaluate_condition(&mut self, name: &str, path: &KeyPath) -> Result<bool, ResolveError> {
        if let Some(&cached) = self.condition_cache.get(name) {
            return Ok(cached);
        }

        if self.is_resolving(name) {
            let mut chain = self.resolving.clone();
            chain.push(name.to_string());
            return Err(ResolveError::CircularReference { chain });
        }

        let declarations = self.declarations;
        let expr = declarations
            .condition(name)
            .ok_or_else(|| ResolveError::undefined_condition(path, name))?;

        self.start_resolving(name);
        let result = self.evaluate_expr(expr, &KeyPath::root().child("Conditions").child(name));
        self.done_resolving(name);
        let result = result?;

        trace!(condition = name, result, "evaluated condition");
        self.condition_cache.insert(name.to_string(), result);
        Ok(result)
    }

    fn evaluate_expr(&mut self, expr: &ConditionExpr, path: &KeyPath) -> Result<bool, ResolveError> {
        match expr {
            ConditionExpr::Literal(b) => Ok(*b),
            ConditionExpr::Equals(a, b) => {
                let fn_path = path.child("Fn::Equals");
                let a = self.resolve_required(a, &fn_path.index(0))?;
                let b = self.resolve_required(b, &fn_path.index(1))?;
                Ok(values_equal(&a, &b))
            }
            ConditionExpr::And(items) => {
                for item in items {
                    if !self.evaluate_expr(item, path)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionExpr::Or(items) => {
                for item in items {
                    if self.evaluate_expr(item, path)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionExpr::Not(inner) => Ok(!self.evaluate_expr(inner, path)?),
            ConditionExpr::Reference(name) => self.evaluate_condition(name, &path.child("Condition")),
        }
    }

    /// Resolve a `Resources` or `Outputs` section.
    ///
    /// Entries whose condition is false are dropped; surviving entries lose
    /// their `Condition` key, since it has been applied.
    pub fn resolve_conditional_section(&mut self, section: &Mapping, path: &KeyPath) -> Result<Mapping, ResolveError> {
        let mut resolved = Mapping::new();
        for (name, entry) in section.iter() {
            let entry_path = path.child(name.as_str());

            let guard = entry.as_mapping().and_then(|m| m.get("Condition"));
            if let Some(condition) = guard {
                let condition_path = entry_path.child("Condition");
                let condition = condition.as_str().ok_or_else(|| {
                    ResolveError::type_mismatch(
                        &condition_path,
                        format!("condition name must be a string, found {}", condition.kind()),
                    )
                })?;
                if !self.evaluate_condition(condition, &condition_path)? {
                    trace!(entry = %entry_path, condition, "dropped by condition");
                    continue;
                }
            }

            match self.resolve_value(entry, &entry_path)? {
                Some(Value::Mapping(mut body)) if guard.is_some() => {
                    body.remove("Condition");
                    resolved.insert(name.clone(), body);
                }
                Some(v) => {
                    resolved.insert(name.clone(), v);
                }
                None => {}
            }
        }
        Ok(resolved)
    }
}

/// Resolve every placeholder in a document.
///
/// The input document is left untouched. On success the returned document
/// holds no placeholders; on failure nothing is returned but the first error.
pub fn resolve(doc: &Document, ctx: &ParameterContext) -> Result<Document, ResolveError> {
    let declarations = Declarations::collect(doc)?;
    let mut resolution = ResolutionContext::new(ctx, &declarations);

    let mut root = Mapping::new();
    for (key, value) in doc.root().iter() {
        let path = KeyPath::root().child(key.as_str());
        let resolved = match value {
            Value::Mapping(section) if CONDITIONAL_SECTIONS.contains(&key.as_str()) => {
                Some(Value::Mapping(resolution.resolve_conditional_section(section, &path)?))
            }
            _ => resolution.resolve_value(value, &path)?,
        };
        if let Some(v) = resolved {
            root.insert(key.clone(), v);
        }
    }

    let resources = root.get("Resources").and_then(Value::as_mapping);
    if resources.map_or(true, Mapping::is_empty) {
        return Err(ResolveError::NoResources);
    }

    debug!(
        resources = resources.map_or(0, Mapping::len),
        conditions = resolution.condition_cache.len(),
        "resolved document"
    );
    Ok(Document::from_checked_root(root))
}
