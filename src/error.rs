//! Error types for parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Error for a byte sequence the lexer does not recognise
    pub fn invalid_token(span: Span, text: &str) -> Self {
        ParseError::Syntax {
            span,
            message: format!("Invalid token '{}'", text),
            expected: vec![],
        }
    }

    /// Error with a custom message and no expectation list
    pub fn custom(span: Span, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            span,
            message: message.into(),
            expected: vec![],
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                render_report(
                    source,
                    filename,
                    span,
                    message,
                    &format!("{}{}", message, expected_str),
                )
            }
        }
    }
}

/// Join parse errors into one line for `Display`
pub(crate) fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render a single-label ariadne report to a string
pub(crate) fn render_report(
    source: &str,
    filename: &str,
    span: &Span,
    message: &str,
    label: &str,
) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = Report::build(ReportKind::Error, filename, span.start)
        .with_message(message)
        .with_label(
            Label::new((filename, span.clone()))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Human-readable names for lexer tokens in error messages
pub trait TokenDescription {
    fn describe(&self) -> String;
}

impl<'a, T: TokenDescription> From<Rich<'a, T>> for ParseError {
    fn from(err: Rich<'a, T>) -> Self {
        #[allow(unreachable_patterns)]
        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => tok.describe(),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
            _ => "Invalid syntax".to_string(),
        };

        #[allow(unreachable_patterns)]
        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(tok.describe()),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                _ => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

impl TokenDescription for crate::parser::lexer::Token {
    fn describe(&self) -> String {
        use crate::parser::lexer::Token;
        match self {
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::BraceOpen => "'{'".to_string(),
            Token::BraceClose => "'}'".to_string(),
            Token::BracketOpen => "'['".to_string(),
            Token::BracketClose => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_includes_source_line() {
        let source = r#"{"Resources": ]"#;
        let err = ParseError::Syntax {
            span: 14..15,
            message: "Unexpected ']'".to_string(),
            expected: vec!["'{'".to_string(), "'['".to_string()],
        };
        let report = err.format(source, "template.json");
        assert!(report.contains("template.json"));
        assert!(report.contains("Unexpected ']'"));
        assert!(report.contains("Expected: '{', '['"));
    }

    #[test]
    fn test_display_mentions_span() {
        let err = ParseError::invalid_token(4..5, "@");
        assert_eq!(err.to_string(), "Parse error at 4..5: Invalid token '@'");
    }
}
