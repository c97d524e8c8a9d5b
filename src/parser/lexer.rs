//! Lexer for JSON template and event text using logos

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    // Literal keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(String),
}

/// Lex input into tokens with spans.
///
/// Unlike a lenient lexer, any unrecognised byte sequence is reported: a
/// template with a stray character is malformed, not something to skip over.
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

/// Decode a quoted JSON string literal, including `\uXXXX` escapes and surrogate pairs
pub(crate) fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let high = read_hex4(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }

    Some(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut value = 0;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            tokens("{ } [ ] , :"),
            vec![
                Token::BraceOpen,
                Token::BraceClose,
                Token::BracketOpen,
                Token::BracketClose,
                Token::Comma,
                Token::Colon
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("true false null"),
            vec![Token::True, Token::False, Token::Null]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("0 42 -7 3.5 1e3 -2.5E-1"),
            vec![
                Token::Number(0.0),
                Token::Number(42.0),
                Token::Number(-7.0),
                Token::Number(3.5),
                Token::Number(1000.0),
                Token::Number(-0.25)
            ]
        );
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            tokens(r#""plain" "a\"b" "tab\there" "\u00e9" "\ud83d\ude00""#),
            vec![
                Token::String("plain".to_string()),
                Token::String("a\"b".to_string()),
                Token::String("tab\there".to_string()),
                Token::String("é".to_string()),
                Token::String("😀".to_string()),
            ]
        );
    }

    #[test]
    fn test_intrinsic_key_is_plain_string() {
        assert_eq!(
            tokens(r#"{"Fn::Sub": "my-${Env}"}"#),
            vec![
                Token::BraceOpen,
                Token::String("Fn::Sub".to_string()),
                Token::Colon,
                Token::String("my-${Env}".to_string()),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn test_invalid_token_reported() {
        let errors = lex(r#"{"a": @}"#).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("@"));
    }

    #[test]
    fn test_bad_escape_rejected() {
        assert!(lex(r#""\q""#).is_err());
    }
}
