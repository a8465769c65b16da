//! Readers for keyword statement arguments.
//!
//! `@Keyword` handlers consume their arguments with these helpers; each one
//! stops right after what it read, leaving the terminating `;` to the caller
//! unless stated otherwise.

use super::{ParseError, TokenStream};
use tensile_lexer::Token;
use tensile_model::foundation::Span;

/// One name in a variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredName {
    pub name: String,
    pub array_size: usize,
    pub span: Span,
}

/// `Type name1, name2[n] [= value];`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// Type name; `real` when the statement omits it
    pub type_name: String,
    pub names: Vec<DeclaredName>,
    pub initial_value: Option<Vec<f64>>,
    pub span: Span,
}

/// Read a possibly signed numeric literal.
pub fn read_real(stream: &mut TokenStream) -> Result<(f64, Span), ParseError> {
    let start = stream.current_pos();
    let negative = if stream.eat(&Token::Minus) {
        true
    } else {
        stream.eat(&Token::Plus);
        false
    };
    let span = stream.current_span();
    let magnitude = match stream.peek() {
        Some(Token::Integer(value)) => *value as f64,
        Some(Token::Float(value)) => *value,
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "where a numeric value was expected",
                span,
            ))
        }
    };
    stream.advance();
    let value = if negative { -magnitude } else { magnitude };
    Ok((value, stream.span_from(start)))
}

/// Read an identifier.
pub fn read_identifier(stream: &mut TokenStream, what: &str) -> Result<(String, Span), ParseError> {
    let span = stream.current_span();
    match stream.peek() {
        Some(Token::Ident(name)) => {
            stream.advance();
            Ok((name.to_string(), span))
        }
        other => Err(ParseError::unexpected_token(
            other,
            &format!("where {} was expected", what),
            span,
        )),
    }
}

/// Read an identifier or a string literal.
pub fn read_word(stream: &mut TokenStream, what: &str) -> Result<(String, Span), ParseError> {
    let span = stream.current_span();
    match stream.peek() {
        Some(Token::Ident(text)) | Some(Token::String(text)) => {
            stream.advance();
            Ok((text.to_string(), span))
        }
        other => Err(ParseError::unexpected_token(
            other,
            &format!("where {} was expected", what),
            span,
        )),
    }
}

/// Read either a single word or a braced, comma-separated list of words.
pub fn read_word_list(stream: &mut TokenStream, what: &str) -> Result<Vec<(String, Span)>, ParseError> {
    if !stream.eat(&Token::LBrace) {
        return Ok(vec![read_word(stream, what)?]);
    }
    let mut words = Vec::new();
    if stream.eat(&Token::RBrace) {
        return Ok(words);
    }
    loop {
        words.push(read_word(stream, what)?);
        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RBrace)?;
        return Ok(words);
    }
}

/// Read every token up to (and including) the next `;`, joined by spaces.
pub fn read_text_until_semicolon(stream: &mut TokenStream) -> Result<String, ParseError> {
    let mut words = Vec::new();
    while !stream.check(&Token::Semicolon) {
        match stream.advance() {
            Some(Token::String(text)) => words.push(text.to_string()),
            Some(token) => words.push(token.to_string()),
            None => {
                return Err(ParseError::expected_token(
                    Token::Semicolon,
                    None,
                    stream.current_span(),
                ))
            }
        }
    }
    stream.expect(Token::Semicolon)?;
    Ok(words.join(" "))
}

/// Read either a single value or a braced list of values.
pub fn read_real_list(stream: &mut TokenStream) -> Result<Vec<f64>, ParseError> {
    if !stream.eat(&Token::LBrace) {
        return Ok(vec![read_real(stream)?.0]);
    }
    let mut values = Vec::new();
    loop {
        values.push(read_real(stream)?.0);
        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RBrace)?;
        return Ok(values);
    }
}

/// Read a variable declaration up to and including the `;`.
pub fn read_variable_declaration(stream: &mut TokenStream) -> Result<VariableDeclaration, ParseError> {
    let start = stream.current_pos();
    // `@Parameter A = 1;` omits the type
    let typed = matches!(
        (stream.peek(), stream.peek_nth(1)),
        (Some(Token::Ident(_)), Some(Token::Ident(_)))
    );
    let type_name = if typed {
        read_identifier(stream, "a type name")?.0
    } else {
        "real".to_string()
    };

    let mut names = Vec::new();
    loop {
        let (name, span) = read_identifier(stream, "a variable name")?;
        let array_size = if stream.eat(&Token::LBracket) {
            let size_span = stream.current_span();
            let size = match stream.advance() {
                Some(Token::Integer(size)) if *size > 0 => *size as usize,
                other => {
                    return Err(ParseError::unexpected_token(
                        other,
                        "where a positive array size was expected",
                        size_span,
                    ))
                }
            };
            stream.expect(Token::RBracket)?;
            size
        } else {
            1
        };
        names.push(DeclaredName {
            name,
            array_size,
            span,
        });
        if !stream.eat(&Token::Comma) {
            break;
        }
    }

    let initial_value = if stream.eat(&Token::Eq) {
        Some(read_real_list(stream)?)
    } else {
        None
    };
    stream.expect(Token::Semicolon)?;

    Ok(VariableDeclaration {
        type_name,
        names,
        initial_value,
        span: stream.span_from(start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    fn with_stream<T>(source: &str, f: impl FnOnce(&mut TokenStream) -> T) -> T {
        let tokens = tokenize(source, 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        f(&mut stream)
    }

    #[test]
    fn test_read_real_signs() {
        assert_eq!(with_stream("-1.0", |s| read_real(s).unwrap().0), -1.0);
        assert_eq!(with_stream("+3", |s| read_real(s).unwrap().0), 3.0);
        assert_eq!(with_stream("1.e-8", |s| read_real(s).unwrap().0), 1e-8);
        assert!(with_stream("abc", |s| read_real(s)).is_err());
        assert!(with_stream("-", |s| read_real(s)).is_err());
    }

    #[test]
    fn test_declarations() {
        let decl = with_stream("StrainStensor evp, a[3];", |s| read_variable_declaration(s)).unwrap();
        assert_eq!(decl.type_name, "StrainStensor");
        assert_eq!(decl.names.len(), 2);
        assert_eq!(decl.names[1].array_size, 3);
        assert_eq!(decl.initial_value, None);

        let param = with_stream("A = 8.e-67;", |s| read_variable_declaration(s)).unwrap();
        assert_eq!(param.type_name, "real");
        assert_eq!(param.initial_value, Some(vec![8.0e-67]));

        let list = with_stream("real c[2] = {1, -2.5};", |s| read_variable_declaration(s)).unwrap();
        assert_eq!(list.initial_value, Some(vec![1.0, -2.5]));
    }

    #[test]
    fn test_declaration_errors() {
        assert!(with_stream("real a[0];", |s| read_variable_declaration(s)).is_err());
        assert!(with_stream("real a", |s| read_variable_declaration(s)).is_err());
        assert!(with_stream("real 3;", |s| read_variable_declaration(s)).is_err());
    }

    #[test]
    fn test_word_lists() {
        let words = with_stream(r#"{PlaneStrain, "Tridimensional"}"#, |s| read_word_list(s, "a hypothesis")).unwrap();
        let names: Vec<_> = words.into_iter().map(|(w, _)| w).collect();
        assert_eq!(names, vec!["PlaneStrain", "Tridimensional"]);
        let single = with_stream(r#"".+""#, |s| read_word_list(s, "a hypothesis")).unwrap();
        assert_eq!(single[0].0, ".+");
    }

    #[test]
    fn test_text_until_semicolon() {
        let text = with_stream(r#"Jane Doe "et al";"#, |s| read_text_until_semicolon(s)).unwrap();
        assert_eq!(text, "Jane Doe et al");
        assert!(with_stream("no end", |s| read_text_until_semicolon(s)).is_err());
    }
}
