//! Filter patterns: syntax tree, builders and the compiled matcher

use std::fmt;

use thiserror::Error;

use crate::document::{format_number, KeyPath, PathSegment, Value};
use crate::error::{format_parse_errors, ParseError};

use super::grammar::parse_pattern;
use super::record::EventRecord;

/// Errors that can occur when parsing or compiling a pattern
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    /// Pattern text is not well formed
    #[error("invalid pattern: {}", format_parse_errors(.0))]
    Syntax(Vec<ParseError>),

    /// An ordering operator with something other than a number on its right
    #[error("operator '{operator}' on {field} needs a number, found {found}")]
    NonNumericOperand {
        field: String,
        operator: String,
        found: String,
    },
}

impl From<Vec<ParseError>> for PatternError {
    fn from(errors: Vec<ParseError>) -> Self {
        PatternError::Syntax(errors)
    }
}

impl PatternError {
    /// Format the error with the pattern text as context
    pub fn format(&self, source: &str) -> String {
        match self {
            PatternError::Syntax(errors) => errors
                .iter()
                .map(|e| e.format(source, "<pattern>"))
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    /// Whether the operator only makes sense on numbers
    pub fn is_ordering(self) -> bool {
        !matches!(self, Operator::Eq | Operator::Ne)
    }

    fn compare(self, left: f64, right: f64) -> bool {
        match self {
            Operator::Eq => left == right,
            Operator::Ne => left != right,
            Operator::Lt => left < right,
            Operator::Le => left <= right,
            Operator::Gt => left > right,
            Operator::Ge => left >= right,
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// May contain `*` wildcards
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Operand {
    fn kind(&self) -> &'static str {
        match self {
            Operand::String(_) => "string",
            Operand::Number(_) => "number",
            Operand::Bool(_) => "boolean",
            Operand::Null => "null",
        }
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::String(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::String(s)
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Number(n as f64)
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::String(s) => write!(f, "{:?}", s),
            Operand::Number(n) => write!(f, "{}", format_number(*n)),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Null => write!(f, "null"),
        }
    }
}

/// `$.field op operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: KeyPath,
    pub op: Operator,
    pub operand: Operand,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", selector(&self.field), self.op.symbol(), self.operand)
    }
}

/// Write a field path in selector form, e.g. `$.detail.items[0]`
fn selector(path: &KeyPath) -> String {
    let mut out = String::from("$");
    for segment in path.segments() {
        match segment {
            PathSegment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

/// A filter pattern: field comparisons joined by logical AND
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPattern {
    Compare(Comparison),
    /// All sub-patterns must match; an empty list matches every record
    And(Vec<QueryPattern>),
}

impl QueryPattern {
    /// Parse pattern text such as `{ $.state = "FAILED" && $.latency >= 500 }`
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let pattern = parse_pattern(text)?;
        pattern.validate()?;
        Ok(pattern)
    }

    /// The pattern that matches every record
    pub fn all() -> Self {
        QueryPattern::And(Vec::new())
    }

    /// Start a comparison on a dotted field path, e.g. `"detail.state"`
    pub fn field(path: &str) -> FieldSelector {
        let field = path
            .split('.')
            .fold(KeyPath::root(), |field, key| field.child(key));
        FieldSelector { field }
    }

    pub(crate) fn from_clauses(mut clauses: Vec<QueryPattern>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            QueryPattern::And(clauses)
        }
    }

    /// Combine with another pattern
    pub fn and(self, other: QueryPattern) -> Self {
        let mut clauses = match self {
            QueryPattern::And(items) => items,
            single => vec![single],
        };
        match other {
            QueryPattern::And(items) => clauses.extend(items),
            single => clauses.push(single),
        }
        QueryPattern::from_clauses(clauses)
    }

    fn comparisons<'p>(&'p self, out: &mut Vec<&'p Comparison>) {
        match self {
            QueryPattern::Compare(c) => out.push(c),
            QueryPattern::And(items) => {
                for item in items {
                    item.comparisons(out);
                }
            }
        }
    }

    /// Reject ordering operators with non-number operands
    pub fn validate(&self) -> Result<(), PatternError> {
        let mut comparisons = Vec::new();
        self.comparisons(&mut comparisons);
        for c in comparisons {
            if c.op.is_ordering() && !matches!(c.operand, Operand::Number(_)) {
                return Err(PatternError::NonNumericOperand {
                    field: selector(&c.field),
                    operator: c.op.symbol().to_string(),
                    found: c.operand.kind().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Compile into a flat matcher that can be applied to many records
    pub fn compile(&self) -> Result<CompiledPattern, PatternError> {
        self.validate()?;
        let mut comparisons = Vec::new();
        self.comparisons(&mut comparisons);
        let mut clauses: Vec<Clause> = comparisons.into_iter().map(Clause::compile).collect();
        // Ordering clauses run first so every non-number they meet is reported
        clauses.sort_by_key(|clause| !clause.is_ordering());
        Ok(CompiledPattern {
            clauses,
            text: self.to_string(),
        })
    }
}

impl fmt::Display for QueryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPattern::Compare(c) => write!(f, "{}", c),
            QueryPattern::And(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        QueryPattern::And(inner) if inner.len() > 1 => format!("({})", item),
                        _ => item.to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(" && "))
            }
        }
    }
}

/// Builder returned by [`QueryPattern::field`]
#[derive(Debug, Clone)]
pub struct FieldSelector {
    field: KeyPath,
}

impl FieldSelector {
    fn compare(self, op: Operator, operand: Operand) -> QueryPattern {
        QueryPattern::Compare(Comparison {
            field: self.field,
            op,
            operand,
        })
    }

    pub fn equals(self, operand: impl Into<Operand>) -> QueryPattern {
        self.compare(Operator::Eq, operand.into())
    }

    pub fn not_equals(self, operand: impl Into<Operand>) -> QueryPattern {
        self.compare(Operator::Ne, operand.into())
    }

    pub fn greater_than(self, n: f64) -> QueryPattern {
        self.compare(Operator::Gt, Operand::Number(n))
    }

    pub fn at_least(self, n: f64) -> QueryPattern {
        self.compare(Operator::Ge, Operand::Number(n))
    }

    pub fn less_than(self, n: f64) -> QueryPattern {
        self.compare(Operator::Lt, Operand::Number(n))
    }

    pub fn at_most(self, n: f64) -> QueryPattern {
        self.compare(Operator::Le, Operand::Number(n))
    }

    /// Substring match, shorthand for `= "*text*"`
    pub fn contains(self, text: &str) -> QueryPattern {
        self.compare(Operator::Eq, Operand::String(format!("*{}*", text)))
    }
}

/// A field holding a non-number where a numeric comparison needs one
#[derive(Debug, Clone, PartialEq)]
pub struct NonNumericField {
    pub field: KeyPath,
    pub found: &'static str,
}

impl NonNumericField {
    pub fn selector(&self) -> String {
        selector(&self.field)
    }
}

/// Text pattern with `*` wildcards
#[derive(Debug, Clone, PartialEq)]
enum TextPattern {
    Exact(String),
    /// Literal pieces between `*`s; the first anchors the start, the last the end
    Wildcard(Vec<String>),
}

impl TextPattern {
    fn new(text: &str) -> Self {
        if text.contains('*') {
            TextPattern::Wildcard(text.split('*').map(str::to_string).collect())
        } else {
            TextPattern::Exact(text.to_string())
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            TextPattern::Exact(expected) => text == expected,
            TextPattern::Wildcard(pieces) => wildcard_match(pieces, text),
        }
    }
}

fn wildcard_match(pieces: &[String], text: &str) -> bool {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return true;
    };
    if pieces.len() == 1 {
        return text == first;
    }
    if !text.starts_with(first.as_str()) {
        return false;
    }
    let mut rest = &text[first.len()..];
    for piece in &pieces[1..pieces.len() - 1] {
        match rest.find(piece.as_str()) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last.as_str())
}

#[derive(Debug, Clone, PartialEq)]
enum Matcher {
    /// String operand, compared against the field's text form
    Text { pattern: TextPattern, negate: bool },
    /// Number operand
    Numeric { op: Operator, value: f64 },
    /// `true`, `false` or `null`
    Literal { value: Value, negate: bool },
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: KeyPath,
    matcher: Matcher,
}

impl Clause {
    fn compile(c: &Comparison) -> Self {
        let negate = c.op == Operator::Ne;
        let matcher = match &c.operand {
            Operand::String(s) => Matcher::Text {
                pattern: TextPattern::new(s),
                negate,
            },
            Operand::Number(n) => Matcher::Numeric { op: c.op, value: *n },
            Operand::Bool(b) => Matcher::Literal {
                value: Value::Bool(*b),
                negate,
            },
            Operand::Null => Matcher::Literal {
                value: Value::Null,
                negate,
            },
        };
        Clause {
            field: c.field.clone(),
            matcher,
        }
    }

    fn is_ordering(&self) -> bool {
        matches!(self.matcher, Matcher::Numeric { op, .. } if op.is_ordering())
    }

    fn evaluate(&self, record: &EventRecord) -> Result<bool, NonNumericField> {
        // Missing fields never match, whatever the operator
        let Some(value) = record.get(&self.field) else {
            return Ok(false);
        };

        match &self.matcher {
            Matcher::Text { pattern, negate } => {
                Ok(value.scalar_text().is_some_and(|text| pattern.matches(&text) != *negate))
            }
            Matcher::Numeric { op, value: expected } => match value {
                Value::Number(n) => Ok(op.compare(*n, *expected)),
                _ if op.is_ordering() => Err(NonNumericField {
                    field: self.field.clone(),
                    found: value.kind(),
                }),
                _ => Ok(*op == Operator::Ne),
            },
            Matcher::Literal {
                value: expected,
                negate,
            } => Ok((value == expected) != *negate),
        }
    }
}

/// A pattern compiled for repeated evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    clauses: Vec<Clause>,
    text: String,
}

impl CompiledPattern {
    /// Parse and compile pattern text in one step
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        QueryPattern::parse(text)?.compile()
    }

    /// Evaluate against one record.
    ///
    /// Ordering comparisons are checked first, then the rest; evaluation stops
    /// at the first clause that does not match. `Err` means an ordering
    /// comparison met a non-number.
    pub fn matches(&self, record: &EventRecord) -> Result<bool, NonNumericField> {
        for clause in &self.clauses {
            if !clause.evaluate(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of field comparisons
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {} }}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Mapping;

    fn record(fields: Mapping) -> EventRecord {
        EventRecord::new(1, "test", fields)
    }

    #[test]
    fn test_wildcards() {
        let pieces = |p: &str| p.split('*').map(str::to_string).collect::<Vec<_>>();
        assert!(wildcard_match(&pieces("*timeout*"), "request timeout after 5s"));
        assert!(wildcard_match(&pieces("req*"), "request"));
        assert!(wildcard_match(&pieces("*5s"), "after 5s"));
        assert!(wildcard_match(&pieces("a*b*c"), "aXbYc"));
        assert!(!wildcard_match(&pieces("a*b*c"), "aXcYb"));
        assert!(!wildcard_match(&pieces("ab*ba"), "aba"));
        assert!(wildcard_match(&pieces("*"), ""));
    }

    #[test]
    fn test_builder_matches_parsed() {
        let built = QueryPattern::field("state")
            .equals("FAILED")
            .and(QueryPattern::field("latency").at_least(500.0));
        let parsed = QueryPattern::parse(r#"{ $.state = "FAILED" && $.latency >= 500 }"#).unwrap();
        assert_eq!(built, parsed);
        assert_eq!(built.to_string(), r#"$.state = "FAILED" && $.latency >= 500"#);
    }

    #[test]
    fn test_non_numeric_operand() {
        let err = QueryPattern::parse(r#"$.latency > "slow""#).unwrap_err();
        assert_eq!(
            err,
            PatternError::NonNumericOperand {
                field: "$.latency".to_string(),
                operator: ">".to_string(),
                found: "string".to_string(),
            }
        );
    }

    #[test]
    fn test_text_match() {
        let pattern = QueryPattern::field("msg").contains("timeout").compile().unwrap();
        assert_eq!(pattern.matches(&record(Mapping::new().with("msg", "a timeout!"))), Ok(true));
        assert_eq!(pattern.matches(&record(Mapping::new().with("msg", "fine"))), Ok(false));
        assert_eq!(pattern.matches(&record(Mapping::new())), Ok(false));
    }

    #[test]
    fn test_string_operand_matches_number_text() {
        let pattern = CompiledPattern::parse(r#"$.code = "200""#).unwrap();
        assert_eq!(pattern.matches(&record(Mapping::new().with("code", 200i64))), Ok(true));
    }

    #[test]
    fn test_numeric_on_string_field_is_diagnostic() {
        let pattern = CompiledPattern::parse("$.latency >= 500").unwrap();
        let result = pattern.matches(&record(Mapping::new().with("latency", "slow")));
        assert_eq!(
            result,
            Err(NonNumericField {
                field: KeyPath::root().child("latency"),
                found: "string",
            })
        );
    }

    #[test]
    fn test_diagnostic_independent_of_clause_order() {
        let rec = record(Mapping::new().with("state", "OK").with("latency", "slow"));
        let expected = Err(NonNumericField {
            field: KeyPath::root().child("latency"),
            found: "string",
        });
        let text_first = CompiledPattern::parse(r#"$.state = "FAILED" && $.latency > 5"#).unwrap();
        let numeric_first = CompiledPattern::parse(r#"$.latency > 5 && $.state = "FAILED""#).unwrap();
        assert_eq!(text_first.matches(&rec), expected);
        assert_eq!(numeric_first.matches(&rec), expected);
        assert_eq!(text_first.to_string(), r#"{ $.state = "FAILED" && $.latency > 5 }"#);
    }

    #[test]
    fn test_not_equals() {
        let pattern = CompiledPattern::parse(r#"$.state != "OK""#).unwrap();
        assert_eq!(pattern.matches(&record(Mapping::new().with("state", "FAILED"))), Ok(true));
        assert_eq!(pattern.matches(&record(Mapping::new().with("state", "OK"))), Ok(false));
        // Missing fields do not match even a negated comparison
        assert_eq!(pattern.matches(&record(Mapping::new())), Ok(false));
    }

    #[test]
    fn test_literals_and_nested_paths() {
        let fields = Mapping::new()
            .with("ok", true)
            .with("err", Value::Null)
            .with("items", vec![Value::Mapping(Mapping::new().with("id", "x"))]);
        let rec = record(fields);
        assert_eq!(CompiledPattern::parse("$.ok = true").unwrap().matches(&rec), Ok(true));
        assert_eq!(CompiledPattern::parse("$.err = null").unwrap().matches(&rec), Ok(true));
        assert_eq!(CompiledPattern::parse("$.err != null").unwrap().matches(&rec), Ok(false));
        assert_eq!(CompiledPattern::parse("$.items[0].id = x").unwrap().matches(&rec), Ok(true));
        assert_eq!(CompiledPattern::parse("$.items[1].id = x").unwrap().matches(&rec), Ok(false));
    }

    #[test]
    fn test_empty_pattern_matches_all() {
        let pattern = CompiledPattern::parse("{}").unwrap();
        assert!(pattern.is_match_all());
        assert_eq!(pattern.matches(&record(Mapping::new())), Ok(true));
    }
}
