// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Parsing support for behaviour description files.
//!
//! The file level is keyword driven and handled by the keyword dispatcher of
//! the integration crate; this crate provides what those handlers share:
//!
//! - [`TokenStream`] - cursor over lexed tokens with span tracking
//! - [`stmt::parse_block_body`] - code-block bodies into the syntax tree
//! - [`values`] - readers for keyword arguments (numbers, names, declarations)

pub mod error;
pub mod expr;
pub mod stmt;
pub mod stream;
pub mod values;

pub use error::{ParseError, ParseErrorKind};
pub use stream::TokenStream;

use logos::Logos;
use std::ops::Range;
use tensile_lexer::Token;
use tensile_model::foundation::Span;

/// Lex `source` into tokens paired with their byte ranges.
///
/// Stops at the first character sequence the lexer rejects.
pub fn tokenize(source: &str, file_id: u16) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let mut tokens = Vec::new();
    for (result, range) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, range)),
            Err(()) => {
                let text = source.get(range.clone()).unwrap_or("");
                return Err(ParseError::invalid_token(
                    text,
                    Span::from_range(file_id, &range),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_reports_invalid_token_location() {
        let err = tokenize("@Epsilon 1e-8; $", 0).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidToken);
        assert_eq!((err.span.start, err.span.end), (15, 16));
        assert!(err.message.contains('$'));
    }

    #[test]
    fn test_tokenize_keeps_ranges() {
        let tokens = tokenize("@Algorithm euler;", 0).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].1, 11..16);
    }
}
