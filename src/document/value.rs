//! Value tree for loaded templates and event fields

/// A document value.
///
/// Placeholders only exist between loading and resolution; a resolved
/// document never contains one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Placeholder(Box<Placeholder>),
}

impl Value {
    /// Short type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Placeholder(_) => "placeholder",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Text form of a string, number or boolean.
    ///
    /// Template parameters travel as strings, so `8080` and `"8080"` share a
    /// text form. Returns `None` for null, containers and placeholders.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether any placeholder remains anywhere in this value
    pub fn has_placeholders(&self) -> bool {
        match self {
            Value::Placeholder(_) => true,
            Value::Sequence(items) => items.iter().any(Value::has_placeholders),
            Value::Mapping(m) => m.values().any(Value::has_placeholders),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Placeholder> for Value {
    fn from(p: Placeholder) -> Self {
        Value::Placeholder(Box::new(p))
    }
}

/// Format a number the way it appears in JSON source: integers without a fraction
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Insertion-ordered mapping with unique keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub(crate) const EMPTY: Mapping = Mapping {
        entries: Vec::new(),
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, replacing an existing entry in place so key order is kept
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove an entry, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// One piece of an interpolation template
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// `${Name}` or `${Resource.Attribute}`
    Variable(String),
}

/// Unresolved reference embedded in a document
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    /// `{"Ref": name}`
    ParamRef { name: String },
    /// `{"Fn::GetAtt": [resource, attribute]}`
    AttrRef { resource: String, attribute: String },
    /// `{"Fn::Sub": template}` or `{"Fn::Sub": [template, parts]}`
    Interpolate {
        template: String,
        segments: Vec<Segment>,
        parts: Mapping,
    },
    /// `{"Fn::If": [condition, if_true, if_false]}`
    Conditional {
        condition: String,
        if_true: Value,
        if_false: Value,
    },
}

impl Placeholder {
    /// Intrinsic function name as written in templates
    pub fn function_name(&self) -> &'static str {
        match self {
            Placeholder::ParamRef { .. } => "Ref",
            Placeholder::AttrRef { .. } => "Fn::GetAtt",
            Placeholder::Interpolate { .. } => "Fn::Sub",
            Placeholder::Conditional { .. } => "Fn::If",
        }
    }

    /// Convert back to the intrinsic mapping form it was loaded from
    pub fn to_intrinsic(&self) -> Value {
        let argument = match self {
            Placeholder::ParamRef { name } => Value::String(name.clone()),
            Placeholder::AttrRef {
                resource,
                attribute,
            } => Value::Sequence(vec![resource.as_str().into(), attribute.as_str().into()]),
            Placeholder::Interpolate {
                template, parts, ..
            } => {
                if parts.is_empty() {
                    Value::String(template.clone())
                } else {
                    Value::Sequence(vec![
                        template.as_str().into(),
                        Value::Mapping(parts.clone()),
                    ])
                }
            }
            Placeholder::Conditional {
                condition,
                if_true,
                if_false,
            } => Value::Sequence(vec![
                condition.as_str().into(),
                if_true.clone(),
                if_false.clone(),
            ]),
        };
        Value::Mapping(Mapping::new().with(self.function_name(), argument))
    }
}

/// Split an interpolation template into literal and variable segments.
///
/// `${!Name}` is an escape and produces the literal text `${Name}`.
pub fn parse_segments(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unterminated '${{' at offset {}", template.len() - rest.len() + start))?;
        let name = &after[..end];

        if let Some(escaped) = name.strip_prefix('!') {
            literal.push_str("${");
            literal.push_str(escaped);
            literal.push('}');
        } else {
            let name = name.trim();
            if name.is_empty() {
                return Err("empty variable '${}'".to_string());
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variable(name.to_string()));
        }
        rest = &after[end + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_insert_keeps_order() {
        let mut m = Mapping::new().with("b", 1i64).with("a", 2i64);
        let old = m.insert("b", 3i64);
        assert_eq!(old, Some(Value::Number(1.0)));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(m.get("b"), Some(&Value::Number(3.0)));

        assert_eq!(m.remove("b"), Some(Value::Number(3.0)));
        assert_eq!(m.remove("b"), None);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(Value::from(8080i64).scalar_text().as_deref(), Some("8080"));
        assert_eq!(Value::from(0.5).scalar_text().as_deref(), Some("0.5"));
        assert_eq!(Value::from(true).scalar_text().as_deref(), Some("true"));
        assert_eq!(Value::Null.scalar_text(), None);
    }

    #[test]
    fn test_segments_plain_variables() {
        let segments = parse_segments("my-${Env}-bucket").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("my-".to_string()),
                Segment::Variable("Env".to_string()),
                Segment::Literal("-bucket".to_string()),
            ]
        );
    }

    #[test]
    fn test_segments_escape_and_attribute() {
        let segments = parse_segments("${!Literal}/${Bucket.Arn}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("${Literal}/".to_string()),
                Segment::Variable("Bucket.Arn".to_string()),
            ]
        );
    }

    #[test]
    fn test_segments_errors() {
        assert!(parse_segments("oops-${Env").is_err());
        assert!(parse_segments("empty-${}").is_err());
    }

    #[test]
    fn test_has_placeholders_nested() {
        let value = Value::Sequence(vec![Value::Mapping(Mapping::new().with(
            "Name",
            Placeholder::ParamRef {
                name: "Env".to_string(),
            },
        ))]);
        assert!(value.has_placeholders());
        assert!(!Value::from("plain").has_placeholders());
    }

    #[test]
    fn test_to_intrinsic_attr_ref() {
        let p = Placeholder::AttrRef {
            resource: "Bucket".to_string(),
            attribute: "Arn".to_string(),
        };
        let expected = Value::Mapping(Mapping::new().with(
            "Fn::GetAtt",
            vec![Value::from("Bucket"), Value::from("Arn")],
        ));
        assert_eq!(p.to_intrinsic(), expected);
    }
}
