//! Pattern parser using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::document::{KeyPath, PathSegment};
use crate::error::ParseError;

use crate::parser::MAX_DEPTH;

use super::lexer::{lex, Token};
use super::pattern::{Comparison, Operand, Operator, QueryPattern};

/// Parse pattern text into a [`QueryPattern`]
pub(crate) fn parse_pattern(input: &str) -> Result<QueryPattern, Vec<ParseError>> {
    let len = input.len();

    let tokens = lex(input)?;
    check_depth(&tokens)?;
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (tok, SimpleSpan::from(span)));

    let token_stream = Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    pattern_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Parenthesized groups recurse in the parser, so their depth is bounded up front
fn check_depth(tokens: &[(Token, std::ops::Range<usize>)]) -> Result<(), Vec<ParseError>> {
    let mut depth = 0usize;
    for (token, span) in tokens {
        match token {
            Token::ParenOpen => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(vec![ParseError::custom(span.clone(), "nesting too deep")]);
                }
            }
            Token::ParenClose => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn pattern_parser<'a, I>() -> impl Parser<'a, I, QueryPattern, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let key = select! {
        Token::Ident(s) => s,
        Token::String(s) => s,
    };

    let index = select! {
        Token::Number(n) => n,
    }
    .try_map(|n, span| {
        if n >= 0.0 && n.fract() == 0.0 {
            Ok(n as usize)
        } else {
            Err(Rich::custom(span, format!("invalid index {}", n)))
        }
    })
    .delimited_by(just(Token::BracketOpen), just(Token::BracketClose));

    let segment = choice((
        just(Token::Dot).ignore_then(key).map(PathSegment::Key),
        index.map(PathSegment::Index),
    ));

    // $.a.b[0]
    let selector = just(Token::Dollar)
        .ignore_then(segment.repeated().at_least(1).collect::<Vec<_>>())
        .map(|segments| {
            segments
                .into_iter()
                .fold(KeyPath::root(), |path, segment| match segment {
                    PathSegment::Key(k) => path.child(k),
                    PathSegment::Index(i) => path.index(i),
                })
        });

    let operator = select! {
        Token::Eq => Operator::Eq,
        Token::Ne => Operator::Ne,
        Token::Lt => Operator::Lt,
        Token::Le => Operator::Le,
        Token::Gt => Operator::Gt,
        Token::Ge => Operator::Ge,
    };

    let operand = select! {
        Token::String(s) => Operand::String(s),
        Token::Ident(s) => Operand::String(s),
        Token::Number(n) => Operand::Number(n),
        Token::True => Operand::Bool(true),
        Token::False => Operand::Bool(false),
        Token::Null => Operand::Null,
    };

    let comparison = selector
        .then(operator)
        .then(operand)
        .map(|((field, op), operand)| QueryPattern::Compare(Comparison { field, op, operand }));

    let expr = recursive(|expr| {
        let term = choice((
            comparison,
            expr.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        ));

        term.separated_by(just(Token::And))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(QueryPattern::from_clauses)
            .boxed()
    });

    // An empty pattern matches everything
    let body = expr.or_not().map(|p| p.unwrap_or_else(QueryPattern::all));

    choice((
        body.clone()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
        body,
    ))
    .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(field: KeyPath, op: Operator, operand: Operand) -> QueryPattern {
        QueryPattern::Compare(Comparison { field, op, operand })
    }

    #[test]
    fn test_paren_nesting_limit() {
        let nested = |depth: usize| format!("{}$.a = 1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_pattern(&nested(8)).is_ok());

        let errors = parse_pattern(&nested(4000)).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("nesting too deep"));
    }

    #[test]
    fn test_parse_single_comparison() {
        let pattern = parse_pattern(r#"{ $.state = "FAILED" }"#).unwrap();
        assert_eq!(
            pattern,
            compare(
                KeyPath::root().child("state"),
                Operator::Eq,
                Operand::String("FAILED".to_string())
            )
        );
    }

    #[test]
    fn test_parse_without_braces() {
        let braced = parse_pattern(r#"{ $.a = 1 }"#).unwrap();
        let bare = parse_pattern(r#"$.a = 1"#).unwrap();
        assert_eq!(braced, bare);
    }

    #[test]
    fn test_parse_conjunction_and_groups() {
        let pattern = parse_pattern(r#"{ $.a >= 5 && ($.b.c[1] != null && $.d = ok) }"#).unwrap();
        assert_eq!(
            pattern,
            QueryPattern::And(vec![
                compare(KeyPath::root().child("a"), Operator::Ge, Operand::Number(5.0)),
                QueryPattern::And(vec![
                    compare(
                        KeyPath::root().child("b").child("c").index(1),
                        Operator::Ne,
                        Operand::Null
                    ),
                    compare(
                        KeyPath::root().child("d"),
                        Operator::Eq,
                        Operand::String("ok".to_string())
                    ),
                ]),
            ])
        );
    }

    #[test]
    fn test_parse_empty_pattern() {
        assert_eq!(parse_pattern("").unwrap(), QueryPattern::all());
        assert_eq!(parse_pattern("{ }").unwrap(), QueryPattern::all());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pattern("$.a =").is_err());
        assert!(parse_pattern("$ = 1").is_err());
        assert!(parse_pattern("{ $.a = 1").is_err());
        assert!(parse_pattern("$.a[1.5] = 1").is_err());
        assert!(parse_pattern("$.a = 1 &&").is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let errors = parse_pattern("$.a 1").unwrap_err();
        match &errors[0] {
            ParseError::Syntax { message, .. } => {
                assert!(message.starts_with("Unexpected"), "got {}", message);
            }
        }
    }
}
