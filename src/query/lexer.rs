//! Lexer for filter patterns using logos

use logos::Logos;

use crate::error::{ParseError, Span, TokenDescription};
use crate::parser::lexer::unescape;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    // Selectors
    #[token("$")]
    Dollar,
    #[token(".")]
    Dot,

    // Operators
    #[token("&&")]
    And,
    #[token("=")]
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // Literal keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(String),

    /// Field names and bare words
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Lex a pattern into tokens with spans
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (tok, span) in Token::lexer(input).spanned() {
        match tok {
            Ok(t) => tokens.push((t, span)),
            Err(()) => {
                let text = &input[span.clone()];
                errors.push(ParseError::invalid_token(span, text));
            }
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

impl TokenDescription for Token {
    fn describe(&self) -> String {
        match self {
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Ident(s) => format!("'{}'", s),
            Token::BraceOpen => "'{'".to_string(),
            Token::BraceClose => "'}'".to_string(),
            Token::ParenOpen => "'('".to_string(),
            Token::ParenClose => "')'".to_string(),
            Token::BracketOpen => "'['".to_string(),
            Token::BracketClose => "']'".to_string(),
            Token::Dollar => "'$'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_lex_comparison() {
        assert_eq!(
            tokens(r#"{ $.state = "FAILED" }"#),
            vec![
                Token::BraceOpen,
                Token::Dollar,
                Token::Dot,
                Token::Ident("state".to_string()),
                Token::Eq,
                Token::String("FAILED".to_string()),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            tokens("= == != < <= > >= &&"),
            vec![
                Token::Eq,
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::And,
            ]
        );
    }

    #[test]
    fn test_lex_selector_with_index() {
        assert_eq!(
            tokens("$.items[2].id"),
            vec![
                Token::Dollar,
                Token::Dot,
                Token::Ident("items".to_string()),
                Token::BracketOpen,
                Token::Number(2.0),
                Token::BracketClose,
                Token::Dot,
                Token::Ident("id".to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_keywords_and_numbers() {
        assert_eq!(
            tokens("true false null -1.5 truthy"),
            vec![
                Token::True,
                Token::False,
                Token::Null,
                Token::Number(-1.5),
                Token::Ident("truthy".to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_rejects_or() {
        let errors = lex("$.a = 1 || $.b = 2").unwrap_err();
        assert!(!errors.is_empty());
    }
}
