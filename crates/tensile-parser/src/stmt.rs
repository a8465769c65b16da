//! Statement parser for code-block bodies.

use super::expr::parse_expr;
use super::{ParseError, TokenStream};
use tensile_lexer::Token;
use tensile_model::block::{AssignOp, Place, Stmt};
use tensile_model::foundation::Span;

/// A parsed `{ ... }` body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    pub stmts: Vec<Stmt>,
    /// Token positions of the body, braces excluded
    pub tokens: std::ops::Range<usize>,
    /// Span of the whole block, braces included
    pub span: Span,
}

/// Parse a brace-delimited block body.
pub fn parse_block_body(stream: &mut TokenStream) -> Result<ParsedBody, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;
    let body_start = stream.current_pos();
    let stmts = parse_until_rbrace(stream)?;
    let body_end = stream.current_pos();
    stream.expect(Token::RBrace)?;
    Ok(ParsedBody {
        stmts,
        tokens: body_start..body_end,
        span: stream.span_from(start),
    })
}

fn parse_until_rbrace(stream: &mut TokenStream) -> Result<Vec<Stmt>, ParseError> {
    let mut stmts = Vec::new();
    while !stream.check(&Token::RBrace) {
        if stream.at_end() {
            return Err(ParseError::expected_token(
                Token::RBrace,
                None,
                stream.current_span(),
            ));
        }
        parse_stmt_into(stream, &mut stmts)?;
    }
    Ok(stmts)
}

/// Parse one statement; nested `{ ... }` groups are flattened into `out`.
fn parse_stmt_into(stream: &mut TokenStream, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
    match stream.peek() {
        Some(Token::LBrace) => {
            stream.advance();
            out.extend(parse_until_rbrace(stream)?);
            stream.expect(Token::RBrace)?;
            Ok(())
        }
        Some(Token::Semicolon) => {
            stream.advance();
            Ok(())
        }
        Some(Token::If) => {
            out.push(parse_if(stream)?);
            Ok(())
        }
        Some(Token::Return) => {
            out.push(parse_return(stream)?);
            Ok(())
        }
        Some(Token::Const) => {
            out.push(parse_local(stream)?);
            Ok(())
        }
        Some(Token::Ident(_)) if matches!(stream.peek_nth(1), Some(Token::Ident(_))) => {
            out.push(parse_local(stream)?);
            Ok(())
        }
        Some(Token::Ident(_)) => {
            out.push(parse_assignment(stream)?);
            Ok(())
        }
        other => Err(ParseError::unexpected_token(
            other,
            "at the start of a statement",
            stream.current_span(),
        )),
    }
}

fn parse_branch(stream: &mut TokenStream) -> Result<Vec<Stmt>, ParseError> {
    let mut stmts = Vec::new();
    parse_stmt_into(stream, &mut stmts)?;
    Ok(stmts)
}

fn parse_if(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::If)?;
    stream.expect(Token::LParen)?;
    let cond = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    let then_branch = parse_branch(stream)?;
    let else_branch = if stream.eat(&Token::Else) {
        parse_branch(stream)?
    } else {
        Vec::new()
    };
    Ok(Stmt::If {
        cond,
        then_branch,
        else_branch,
        span: stream.span_from(start),
    })
}

fn parse_return(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Return)?;
    let value = if stream.check(&Token::Semicolon) {
        None
    } else {
        Some(parse_expr(stream)?)
    };
    stream.expect(Token::Semicolon)?;
    Ok(Stmt::Return {
        value,
        span: stream.span_from(start),
    })
}

fn expect_ident(stream: &mut TokenStream, context: &str) -> Result<String, ParseError> {
    let span = stream.current_span();
    match stream.advance() {
        Some(Token::Ident(name)) => Ok(name.to_string()),
        other => Err(ParseError::unexpected_token(other, context, span)),
    }
}

fn parse_local(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    let is_const = stream.eat(&Token::Const);
    let type_name = expect_ident(stream, "where a type name was expected")?;
    let name = expect_ident(stream, "where a variable name was expected")?;
    stream.expect(Token::Eq)?;
    let value = parse_expr(stream)?;
    stream.expect(Token::Semicolon)?;
    Ok(Stmt::Local {
        name,
        type_name,
        is_const,
        value,
        span: stream.span_from(start),
    })
}

fn parse_assignment(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    let name = expect_ident(stream, "where an assignment target was expected")?;
    let index = if stream.eat(&Token::LBracket) {
        let index = parse_expr(stream)?;
        stream.expect(Token::RBracket)?;
        Some(index)
    } else {
        None
    };
    let target = Place {
        name,
        index,
        span: stream.span_from(start),
    };
    let op_span = stream.current_span();
    let op = match stream.advance() {
        Some(Token::Eq) => AssignOp::Set,
        Some(Token::PlusEq) => AssignOp::Add,
        Some(Token::MinusEq) => AssignOp::Sub,
        Some(Token::StarEq) => AssignOp::Mul,
        Some(Token::SlashEq) => AssignOp::Div,
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "where an assignment operator was expected",
                op_span,
            ))
        }
    };
    let value = parse_expr(stream)?;
    stream.expect(Token::Semicolon)?;
    Ok(Stmt::Assign {
        target,
        op,
        value,
        span: stream.span_from(start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    fn parse(source: &str) -> Result<ParsedBody, ParseError> {
        let tokens = tokenize(source, 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        parse_block_body(&mut stream)
    }

    #[test]
    fn test_norton_derivative() {
        let body = parse(
            "{
               const stress seq = sigmaeq(sig);
               const real tmp = A * pow(seq, n - 1);
               devp = 1.5 * tmp * deviator(sig);
               dp = tmp * seq;
             }",
        )
        .unwrap();
        assert_eq!(body.stmts.len(), 4);
        assert!(matches!(&body.stmts[0], Stmt::Local { is_const: true, name, .. } if name == "seq"));
        assert!(matches!(&body.stmts[2], Stmt::Assign { target, op: AssignOp::Set, .. } if target.name == "devp"));
    }

    #[test]
    fn test_if_else_and_return() {
        let body = parse("{ if (seq > 1e9) { return false; } else dp = 0; return true; }").unwrap();
        assert_eq!(body.stmts.len(), 2);
        match &body.stmts[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(matches!(then_branch[0], Stmt::Return { value: Some(_), .. }));
                assert_eq!(else_branch.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_and_indexed_assignment() {
        let body = parse("{ a[1] += 2; b *= c; { d -= 1; } }").unwrap();
        assert_eq!(body.stmts.len(), 3);
        match &body.stmts[0] {
            Stmt::Assign { target, op, .. } => {
                assert!(target.index.is_some());
                assert_eq!(*op, AssignOp::Add);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_body_token_range_excludes_braces() {
        let tokens = tokenize("{ dp = 1; }", 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        let body = parse_block_body(&mut stream).unwrap();
        assert_eq!(body.tokens, 1..5);
        assert_eq!((body.span.start, body.span.end), (0, 11));
    }

    #[test]
    fn test_errors() {
        assert!(parse("{ dp = 1 }").is_err());
        assert!(parse("{ dp = 1;").is_err());
        assert!(parse("{ 3 = dp; }").is_err());
        assert!(parse("{ dp == 1; }").is_err());
    }
}
