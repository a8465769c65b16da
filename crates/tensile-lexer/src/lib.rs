// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for behaviour description files.
//!
//! Tokenization is done with logos. A behaviour file is a sequence of
//! `@Keyword` statements; code blocks use a small C-like expression syntax,
//! so the same token set serves both levels.
//!
//! # Design
//!
//! - `Token` - all token types (`@Keyword`, operators, literals, identifiers)
//! - Comments are stripped during lexing (not tokens)
//! - Token strings for fixed tokens live in `TOKEN_STRINGS` (single source of truth for Display)
//!
//! # Examples
//!
//! ```
//! # use tensile_lexer::Token;
//! # use logos::Logos;
//! let source = "@Algorithm rk54;";
//! let tokens: Vec<Result<Token, ()>> = Token::lexer(source).collect();
//! assert_eq!(tokens.len(), 3);
//! ```

use logos::Logos;
use std::rc::Rc;

/// Behaviour description token.
///
/// Fixed tokens (block-language keywords, operators, delimiters) come first so
/// that their discriminants index `TOKEN_STRINGS`. Tokens carrying data come last.
#[derive(Logos, Debug, Clone, PartialEq)]
#[repr(u16)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip // comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip /* */ comments
pub enum Token {
    // === Code block keywords ===
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `return`
    #[token("return")]
    Return,
    /// Keyword `const`
    #[token("const")]
    Const,
    /// Keyword `true`
    #[token("true")]
    True,
    /// Keyword `false`
    #[token("false")]
    False,

    // === Operators ===
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    NotEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,
    /// Operator `&&`
    #[token("&&")]
    AndAnd,
    /// Operator `||`
    #[token("||")]
    OrOr,
    /// Operator `!`
    #[token("!")]
    Bang,
    /// Operator `=`
    #[token("=")]
    Eq,
    /// Operator `+=`
    #[token("+=")]
    PlusEq,
    /// Operator `-=`
    #[token("-=")]
    MinusEq,
    /// Operator `*=`
    #[token("*=")]
    StarEq,
    /// Operator `/=`
    #[token("/=")]
    SlashEq,
    /// Operator `?`
    #[token("?")]
    Question,
    /// Operator `::`
    #[token("::")]
    ColonColon,
    /// Operator `:`
    #[token(":")]
    Colon,
    /// Operator `.`
    #[token(".")]
    Dot,
    /// Separator `,`
    #[token(",")]
    Comma,
    /// Terminator `;`
    #[token(";")]
    Semicolon,

    // === Delimiters ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `{`
    #[token("{")]
    LBrace,
    /// Delimiter `}`
    #[token("}")]
    RBrace,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,

    // === Literals ===
    /// Integer literal (e.g. 0, 3, 1000)
    ///
    /// Overflow makes the callback fail and surfaces as a generic lexer error.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    /// Float literal (e.g. 1.5, 1.e-8, .5, 2e10)
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// String literal (e.g. ".+", "Jane Doe")
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        let content = &s[1..s.len() - 1];
        unescape_string(content).map(|s| Rc::from(s.as_str()))
    })]
    String(Rc<str>),

    /// Identifier (e.g. `sig`, `StrainStensor`, `dp`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),

    /// Statement keyword `@Name`; the payload excludes the `@`.
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(&lex.slice()[1..]))]
    Keyword(Rc<str>),
}

/// Unescape a string literal content.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                // regex patterns inside hypothesis lists keep their backslashes
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Token string lookup table.
///
/// Indexed by the enum discriminant of fixed tokens. The `#[token("...")]`
/// attributes above must match these strings.
const TOKEN_STRINGS: &[&str] = &[
    "if", "else", "return", "const", "true", "false", // keywords
    "+", "-", "*", "/", // arithmetic
    "==", "!=", "<", "<=", ">", ">=", // comparison
    "&&", "||", "!", // logic
    "=", "+=", "-=", "*=", "/=", // assignment
    "?", "::", ":", ".", ",", ";", // other
    "(", ")", "{", "}", "[", "]", // delimiters
];

impl Token {
    /// Index into `TOKEN_STRINGS` for fixed tokens.
    fn token_string_index(&self) -> usize {
        // Safe: Token has #[repr(u16)] so the discriminant is the leading u16
        let discriminant = unsafe { *(self as *const Token as *const u16) };
        discriminant as usize
    }

    /// Returns the identifier text if this is an identifier token.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the keyword name (without `@`) if this is a keyword token.
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Token::Keyword(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(id) => write!(f, "{}", id),
            Token::Keyword(name) => write!(f, "@{}", name),
            _ => {
                let s = TOKEN_STRINGS
                    .get(self.token_string_index())
                    .copied()
                    .unwrap_or("<token>");
                write!(f, "{}", s)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source)
            .filter_map(|result| result.ok())
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(Rc::from(s))
    }

    fn keyword(s: &str) -> Token {
        Token::Keyword(Rc::from(s))
    }

    #[test]
    fn test_keyword_statement() {
        assert_eq!(
            lex("@Algorithm rk54;"),
            vec![keyword("Algorithm"), ident("rk54"), Token::Semicolon]
        );
    }

    #[test]
    fn test_token_accessors() {
        let tokens = lex("@Epsilon eps");
        assert_eq!(tokens[0].as_keyword(), Some("Epsilon"));
        assert_eq!(tokens[0].as_ident(), None);
        assert_eq!(tokens[1].as_ident(), Some("eps"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("42 1.5 1.e-8 .5 2e10 3."),
            vec![
                Token::Integer(42),
                Token::Float(1.5),
                Token::Float(1.0e-8),
                Token::Float(0.5),
                Token::Float(2e10),
                Token::Float(3.0),
            ]
        );
    }

    #[test]
    fn test_negative_value_is_two_tokens() {
        assert_eq!(
            lex("@Epsilon -1.0;"),
            vec![
                keyword("Epsilon"),
                Token::Minus,
                Token::Float(1.0),
                Token::Semicolon
            ]
        );
    }

    #[test]
    fn test_method_call() {
        assert_eq!(
            lex("p.setErrorNormalisationFactor(E);"),
            vec![
                ident("p"),
                Token::Dot,
                ident("setErrorNormalisationFactor"),
                Token::LParen,
                ident("E"),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("+= -= *= /= == != <= >= && || ! ? : ::"),
            vec![
                Token::PlusEq,
                Token::MinusEq,
                Token::StarEq,
                Token::SlashEq,
                Token::EqEq,
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang,
                Token::Question,
                Token::Colon,
                Token::ColonColon,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = lex("// line\n@Epsilon /* inline */ 1e-8; /* multi\nline **/");
        assert_eq!(
            tokens,
            vec![keyword("Epsilon"), Token::Float(1e-8), Token::Semicolon]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            lex(r#"@ModellingHypotheses {".+"};"#),
            vec![
                keyword("ModellingHypotheses"),
                Token::LBrace,
                Token::String(Rc::from(".+")),
                Token::RBrace,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_block_keywords() {
        assert_eq!(
            lex("if else return const true false"),
            vec![
                Token::If,
                Token::Else,
                Token::Return,
                Token::Const,
                Token::True,
                Token::False
            ]
        );
    }

    #[test]
    fn test_invalid_token() {
        let results: Vec<_> = Token::lexer("a # b").collect();
        assert!(results.iter().any(|r| r.is_err()));
    }

    #[test]
    fn test_token_string_consistency() {
        let fixed = [
            Token::If,
            Token::Plus,
            Token::EqEq,
            Token::SlashEq,
            Token::ColonColon,
            Token::Semicolon,
            Token::RBracket,
        ];
        for token in fixed {
            let text = token.to_string();
            assert_eq!(lex(&text), vec![token]);
        }
    }

    #[test]
    fn test_display_data_tokens() {
        assert_eq!(keyword("Derivative").to_string(), "@Derivative");
        assert_eq!(ident("eto").to_string(), "eto");
        assert_eq!(Token::Integer(3).to_string(), "3");
    }
}
