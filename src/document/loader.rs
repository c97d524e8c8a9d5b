//! Template loading: bytes to a validated [`Document`]

use std::collections::HashSet;

use thiserror::Error;

use crate::error::{format_parse_errors, render_report, ParseError, Span};
use crate::parser::{self, Node, Spanned};
use crate::template::ResolveError;

use super::path::KeyPath;
use super::value::{parse_segments, Mapping, Placeholder, Value};
use super::Document;

/// Top-level sections that must be mappings when present
const MAPPING_SECTIONS: &[&str] = &["Parameters", "Conditions", "Outputs", "Mappings"];

/// Errors that can occur while loading a template
#[derive(Debug, Error)]
pub enum LoadError {
    /// Input is not well-formed JSON
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// The same key appears twice in one mapping
    #[error("duplicate key '{key}' at {path}")]
    DuplicateKey { path: KeyPath, key: String, span: Span },

    /// An intrinsic function with the wrong argument shape
    #[error("malformed {function} at {path}: {reason}")]
    MalformedIntrinsic {
        path: KeyPath,
        function: String,
        reason: String,
        span: Span,
    },

    /// Structurally valid input missing a required section
    #[error("schema error at {path}: {reason}")]
    Schema { path: KeyPath, reason: String },

    /// A parameter declaration or condition body that can never resolve
    #[error("{0}")]
    Declaration(ResolveError),
}

impl From<Vec<ParseError>> for LoadError {
    fn from(errors: Vec<ParseError>) -> Self {
        LoadError::Parse(errors)
    }
}

impl LoadError {
    fn schema(path: KeyPath, reason: impl Into<String>) -> Self {
        Self::Schema {
            path,
            reason: reason.into(),
        }
    }

    fn malformed(path: &KeyPath, function: &str, reason: impl Into<String>, span: &Span) -> Self {
        Self::MalformedIntrinsic {
            path: path.clone(),
            function: function.to_string(),
            reason: reason.into(),
            span: span.clone(),
        }
    }

    /// Get the source span if available
    pub fn span(&self) -> Option<&Span> {
        match self {
            Self::DuplicateKey { span, .. } => Some(span),
            Self::MalformedIntrinsic { span, .. } => Some(span),
            Self::Parse(errors) => errors.first().map(|e| e.span()),
            Self::Schema { .. } | Self::Declaration(_) => None,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            Self::Parse(errors) => errors
                .iter()
                .map(|e| e.format(source, filename))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::DuplicateKey { key, span, .. } => render_report(
                source,
                filename,
                span,
                &self.to_string(),
                &format!("'{}' already defined in this mapping", key),
            ),
            Self::MalformedIntrinsic { reason, span, .. } => {
                render_report(source, filename, span, &self.to_string(), reason)
            }
            Self::Schema { .. } | Self::Declaration(_) => self.to_string(),
        }
    }
}

/// Load a template from raw bytes
///
/// # Example
///
/// ```rust
/// let doc = stackscope::load(br#"{"Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}}"#).unwrap();
/// assert_eq!(doc.resources().len(), 1);
/// ```
pub fn load(raw: &[u8]) -> Result<Document, LoadError> {
    let source = std::str::from_utf8(raw).map_err(|e| {
        let at = e.valid_up_to();
        LoadError::Parse(vec![ParseError::custom(at..at + 1, "invalid UTF-8")])
    })?;
    load_str(source)
}

/// Load a template from source text
pub fn load_str(source: &str) -> Result<Document, LoadError> {
    let tree = parser::parse(source)?;
    let root_path = KeyPath::root();
    let root = match lift(tree, &root_path)? {
        Value::Mapping(m) => m,
        other => {
            return Err(LoadError::schema(
                root_path,
                format!("template must be a mapping, found {}", other.kind()),
            ))
        }
    };
    let doc = Document::from_root(root)?;

    tracing::debug!(
        resources = doc.resources().len(),
        parameters = doc.parameters().map_or(0, Mapping::len),
        conditions = doc.conditions().map_or(0, Mapping::len),
        "template loaded"
    );
    Ok(doc)
}

/// Parse JSON text into a plain value without interpreting intrinsic functions
pub fn parse_data(source: &str) -> Result<Value, LoadError> {
    let tree = parser::parse(source)?;
    plain(tree, &KeyPath::root())
}

/// Check the section layout of a template root
pub(crate) fn check_schema(root: &Mapping) -> Result<(), LoadError> {
    let resources_path = KeyPath::root().child("Resources");
    match root.get("Resources") {
        None => {
            return Err(LoadError::schema(
                resources_path,
                "missing required section 'Resources'",
            ))
        }
        Some(Value::Mapping(m)) if m.is_empty() => {
            return Err(LoadError::schema(
                resources_path,
                "'Resources' must declare at least one resource",
            ))
        }
        Some(Value::Mapping(_)) => {}
        Some(other) => {
            return Err(LoadError::schema(
                resources_path,
                format!("'Resources' must be a mapping, found {}", other.kind()),
            ))
        }
    }

    for section in MAPPING_SECTIONS {
        if let Some(value) = root.get(section) {
            if !matches!(value, Value::Mapping(_)) {
                return Err(LoadError::schema(
                    KeyPath::root().child(*section),
                    format!("'{}' must be a mapping, found {}", section, value.kind()),
                ));
            }
        }
    }
    Ok(())
}

/// Convert a syntax node into a value, lifting intrinsic functions into placeholders
fn lift(node: Spanned<Node>, path: &KeyPath) -> Result<Value, LoadError> {
    let Spanned { node, span } = node;
    match node {
        Node::Mapping(members) if members.len() == 1 && is_intrinsic(&members[0].0.node) => {
            let Some((key, argument)) = members.into_iter().next() else {
                return Ok(Value::Mapping(Mapping::new()));
            };
            lift_intrinsic(&key.node, argument, &path.child(key.node.as_str()), &span)
        }
        Node::Mapping(members) => {
            let mut mapping = Mapping::new();
            for (key, value) in unique_members(members, path)? {
                let child = path.child(key.as_str());
                let lifted = lift(value, &child)?;
                mapping.insert(key, lifted);
            }
            Ok(Value::Mapping(mapping))
        }
        Node::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| lift(item, &path.index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        other => Ok(scalar(other)),
    }
}

/// Convert a syntax node into a value, keeping intrinsic-looking mappings as data
fn plain(node: Spanned<Node>, path: &KeyPath) -> Result<Value, LoadError> {
    match node.node {
        Node::Mapping(members) => {
            let mut mapping = Mapping::new();
            for (key, value) in unique_members(members, path)? {
                let child = path.child(key.as_str());
                let converted = plain(value, &child)?;
                mapping.insert(key, converted);
            }
            Ok(Value::Mapping(mapping))
        }
        Node::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| plain(item, &path.index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        other => Ok(scalar(other)),
    }
}

fn scalar(node: Node) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(b),
        Node::Number(n) => Value::Number(n),
        Node::String(s) => Value::String(s),
        // Containers are handled by the callers
        Node::Sequence(_) | Node::Mapping(_) => Value::Null,
    }
}

/// Reject duplicate keys, returning members with plain string keys
fn unique_members(
    members: Vec<parser::Member>,
    path: &KeyPath,
) -> Result<Vec<(String, Spanned<Node>)>, LoadError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(members.len());
    for (key, value) in members {
        if !seen.insert(key.node.clone()) {
            return Err(LoadError::DuplicateKey {
                path: path.clone(),
                key: key.node,
                span: key.span,
            });
        }
        out.push((key.node, value));
    }
    Ok(out)
}

fn is_intrinsic(key: &str) -> bool {
    matches!(key, "Ref" | "Fn::GetAtt" | "Fn::Sub" | "Fn::If")
}

fn lift_intrinsic(
    function: &str,
    argument: Spanned<Node>,
    path: &KeyPath,
    span: &Span,
) -> Result<Value, LoadError> {
    let placeholder = match function {
        "Ref" => match argument.node {
            Node::String(name) if !name.is_empty() => Placeholder::ParamRef { name },
            other => {
                return Err(LoadError::malformed(
                    path,
                    function,
                    format!("expected a non-empty name, found {}", other.kind()),
                    span,
                ))
            }
        },
        "Fn::GetAtt" => lift_get_att(argument.node, path, span)?,
        "Fn::Sub" => lift_sub(argument, path, span)?,
        "Fn::If" => lift_if(argument.node, path, span)?,
        _ => {
            return Err(LoadError::malformed(
                path,
                function,
                "unknown intrinsic function",
                span,
            ))
        }
    };
    Ok(Value::Placeholder(Box::new(placeholder)))
}

fn lift_get_att(node: Node, path: &KeyPath, span: &Span) -> Result<Placeholder, LoadError> {
    let pair = match node {
        Node::String(dotted) => dotted
            .split_once('.')
            .map(|(r, a)| (r.to_string(), a.to_string())),
        Node::Sequence(items) => match items.as_slice() {
            [Spanned {
                node: Node::String(r),
                ..
            }, Spanned {
                node: Node::String(a),
                ..
            }] => Some((r.clone(), a.clone())),
            _ => None,
        },
        _ => None,
    };
    match pair {
        Some((resource, attribute)) if !resource.is_empty() && !attribute.is_empty() => {
            Ok(Placeholder::AttrRef {
                resource,
                attribute,
            })
        }
        _ => Err(LoadError::malformed(
            path,
            "Fn::GetAtt",
            "expected [resource, attribute] or \"resource.attribute\"",
            span,
        )),
    }
}

fn lift_sub(argument: Spanned<Node>, path: &KeyPath, span: &Span) -> Result<Placeholder, LoadError> {
    let (template, parts) = match argument.node {
        Node::String(template) => (template, Mapping::new()),
        Node::Sequence(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            let (Some(first), Some(second)) = (items.next(), items.next()) else {
                return Err(LoadError::malformed(path, "Fn::Sub", "expected two arguments", span));
            };
            let template = match first.node {
                Node::String(t) => t,
                other => {
                    return Err(LoadError::malformed(
                        path,
                        "Fn::Sub",
                        format!("template must be a string, found {}", other.kind()),
                        span,
                    ))
                }
            };
            let parts = match lift(second, &path.index(1))? {
                Value::Mapping(m) => m,
                other => {
                    return Err(LoadError::malformed(
                        path,
                        "Fn::Sub",
                        format!("variables must be a mapping, found {}", other.kind()),
                        span,
                    ))
                }
            };
            (template, parts)
        }
        _ => {
            return Err(LoadError::malformed(
                path,
                "Fn::Sub",
                "expected a template string or [template, variables]",
                span,
            ))
        }
    };

    let segments =
        parse_segments(&template).map_err(|reason| LoadError::malformed(path, "Fn::Sub", reason, span))?;
    Ok(Placeholder::Interpolate {
        template,
        segments,
        parts,
    })
}

fn lift_if(node: Node, path: &KeyPath, span: &Span) -> Result<Placeholder, LoadError> {
    let items = match node {
        Node::Sequence(items) if items.len() == 3 => items,
        _ => {
            return Err(LoadError::malformed(
                path,
                "Fn::If",
                "expected [condition, value_if_true, value_if_false]",
                span,
            ))
        }
    };
    let mut items = items.into_iter();
    let (Some(condition), Some(if_true), Some(if_false)) = (items.next(), items.next(), items.next()) else {
        return Err(LoadError::malformed(path, "Fn::If", "expected three arguments", span));
    };
    let condition = match condition.node {
        Node::String(name) if !name.is_empty() => name,
        other => {
            return Err(LoadError::malformed(
                path,
                "Fn::If",
                format!("condition name must be a string, found {}", other.kind()),
                span,
            ))
        }
    };
    Ok(Placeholder::Conditional {
        condition,
        if_true: lift(if_true, &path.index(1))?,
        if_false: lift(if_false, &path.index(2))?,
    })
}
