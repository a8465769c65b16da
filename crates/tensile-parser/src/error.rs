//! Parse error types.

use std::fmt;
use tensile_lexer::Token;
use tensile_model::error::{CompileError, ErrorKind};
use tensile_model::foundation::Span;

/// Parse error with source location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub message: String,
}

/// Category of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A specific token was expected but a different one was found.
    ///
    /// Example: `@Epsilon 1e-8` followed by another keyword instead of `;`.
    UnexpectedToken,

    /// The input ended while a construct was incomplete (unclosed block, ...).
    UnexpectedEof,

    /// Tokens are present but violate the grammar.
    ///
    /// Example: an assignment whose target is a literal.
    InvalidSyntax,

    /// A character sequence the lexer does not recognize.
    InvalidToken,
}

impl ParseError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: Token, found: Option<Token>, span: Span) -> Self {
        let message = match &found {
            Some(token) => format!("expected '{}', found '{}'", expected, token),
            None => format!("expected '{}', found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "unexpected token" error; `context` completes the sentence.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("unexpected '{}' {}", token, context),
            None => format!("unexpected end of input {}", context),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            span,
            message: message.into(),
        }
    }

    /// Create an "invalid token" error for text the lexer rejected.
    pub fn invalid_token(text: &str, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::InvalidToken,
            span,
            message: format!("invalid token '{}'", text),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::new(ErrorKind::Syntax, err.span, err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_token_messages() {
        let span = Span::new(0, 3, 4, 1);
        let err = ParseError::expected_token(Token::Semicolon, Some(Token::Comma), span);
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.message, "expected ';', found ','");
        let eof = ParseError::expected_token(Token::RBrace, None, span);
        assert_eq!(eof.kind, ParseErrorKind::UnexpectedEof);
        assert!(eof.message.contains("end of input"));
    }

    #[test]
    fn test_conversion_to_compile_error() {
        let err = ParseError::invalid_syntax("bad target", Span::new(0, 1, 2, 1));
        let compile: CompileError = err.into();
        assert_eq!(compile.kind, ErrorKind::Syntax);
        assert_eq!(compile.message, "bad target");
    }
}
