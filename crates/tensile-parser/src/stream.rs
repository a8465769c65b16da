//! Token stream wrapper for the hand-written parsers.

use super::ParseError;
use std::ops::Range;
use tensile_lexer::Token;
use tensile_model::foundation::Span;

/// Token stream with lookahead and position tracking.
///
/// Each token is paired with its byte range in the source, so spans and raw
/// text slices (code-block bodies) can be recovered.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    file_id: u16,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream from tokens with their byte ranges.
    pub fn new(tokens: &'src [(Token, Range<usize>)], file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&'src Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token has the same kind as `expected`.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it has the same kind as `expected`.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance if it matches.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Span from the token at `start` to the last consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .or_else(|| self.tokens.last())
            .map(|(_, range)| range.start)
            .unwrap_or(0);
        let end_byte = if self.pos > start {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, range)| range.end)
                .unwrap_or(start_byte)
        } else {
            start_byte
        };
        Span::new(self.file_id, start_byte as u32, end_byte.max(start_byte) as u32, 0)
    }

    /// Span of the current token, or an empty span at EOF.
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, range)) => Span::from_range(self.file_id, range),
            None => match self.tokens.last() {
                Some((_, range)) => Span::new(self.file_id, range.end as u32, range.end as u32, 0),
                None => Span::zero(self.file_id),
            },
        }
    }

    /// Byte range covering the tokens in `start..end` (token positions).
    ///
    /// Returns an empty range at the start token when `start >= end`.
    pub fn byte_range(&self, start: usize, end: usize) -> Range<usize> {
        let start_byte = self
            .tokens
            .get(start)
            .map(|(_, range)| range.start)
            .unwrap_or_else(|| self.tokens.last().map(|(_, r)| r.end).unwrap_or(0));
        if end <= start {
            return start_byte..start_byte;
        }
        let end_byte = self
            .tokens
            .get(end - 1)
            .map(|(_, range)| range.end)
            .unwrap_or(start_byte);
        start_byte..end_byte
    }

    /// Get the file_id for this token stream.
    pub fn file_id(&self) -> u16 {
        self.file_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    #[test]
    fn test_peek_advance_expect() {
        let tokens = tokenize("@Epsilon 1e-8;", 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        assert!(matches!(stream.peek(), Some(Token::Keyword(_))));
        assert!(matches!(stream.peek_nth(1), Some(Token::Float(_))));
        stream.advance();
        assert!(stream.expect(Token::Semicolon).is_err());
        stream.advance();
        let span = stream.expect(Token::Semicolon).unwrap();
        assert_eq!((span.start, span.end), (13, 14));
        assert!(stream.at_end());
    }

    #[test]
    fn test_spans_and_ranges() {
        let source = "@Derivative { dp = 1; }";
        let tokens = tokenize(source, 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        stream.advance();
        stream.advance();
        let body_start = stream.current_pos();
        while !stream.check(&Token::RBrace) {
            stream.advance();
        }
        let range = stream.byte_range(body_start, stream.current_pos());
        assert_eq!(&source[range], "dp = 1;");
        let span = stream.span_from(0);
        assert_eq!(span.start, 0);
    }

    #[test]
    fn test_current_span_at_eof() {
        let tokens = tokenize("a", 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        stream.advance();
        let span = stream.current_span();
        assert!(span.is_empty());
        assert_eq!(span.start, 1);
    }
}
