//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Deepest container nesting accepted, matching serde_json's recursion limit
pub const MAX_DEPTH: usize = 128;

/// Parse JSON source text into a spanned syntax tree
pub fn parse(input: &str) -> Result<Spanned<Node>, Vec<ParseError>> {
    let len = input.len();

    let tokens = crate::parser::lexer::lex(input)?;
    check_depth(&tokens)?;
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (tok, SimpleSpan::from(span)));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    document_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Reject input nested deeper than [`MAX_DEPTH`] before the recursive parser sees it
fn check_depth(tokens: &[(Token, std::ops::Range<usize>)]) -> Result<(), Vec<ParseError>> {
    let mut depth = 0usize;
    for (token, span) in tokens {
        match token {
            Token::BraceOpen | Token::BracketOpen => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(vec![ParseError::custom(span.clone(), "nesting too deep")]);
                }
            }
            Token::BraceClose | Token::BracketClose => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn document_parser<'a, I>() -> impl Parser<'a, I, Spanned<Node>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let value = recursive(|value| {
        let scalar = select! {
            Token::Null => Node::Null,
            Token::True => Node::Bool(true),
            Token::False => Node::Bool(false),
            Token::Number(n) => Node::Number(n),
            Token::String(s) => Node::String(s),
        };

        let sequence = value
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Node::Sequence);

        let key = select! {
            Token::String(s) => s,
        }
        .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

        let member = key.then_ignore(just(Token::Colon)).then(value);

        let mapping = member
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(Node::Mapping);

        choice((scalar, sequence, mapping))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
            .boxed()
    });

    // A document is exactly one value
    value.then_ignore(end())
}
