//! Syntax tree produced by the JSON grammar
//!
//! The tree keeps every source span so later stages (intrinsic lifting,
//! duplicate-key detection) can point back at the offending text.

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Syntax node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A mapping entry as written in the source, duplicates included
pub type Member = (Spanned<String>, Spanned<Node>);

/// Untyped JSON syntax node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<Spanned<Node>>),
    Mapping(Vec<Member>),
}

impl Node {
    /// Short type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
        }
    }
}
