//! Expression parser - precedence climbing for the code-block language.

use super::{ParseError, TokenStream};
use tensile_lexer::Token;
use tensile_model::block::{BinaryOp, Expr, ExprKind, UnaryOp};

/// Binary operator metadata: (precedence, operator). Higher binds tighter;
/// every binary operator is left-associative.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    let op = match token {
        Token::OrOr => BinaryOp::Or,
        Token::AndAnd => BinaryOp::And,
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::Ne,
        Token::Lt => BinaryOp::Lt,
        Token::LtEq => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::GtEq => BinaryOp::Ge,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        _ => return None,
    };
    Some((op.precedence(), op))
}

/// Parse a full expression, including the conditional operator.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let cond = parse_pratt(stream, 0)?;
    if !stream.eat(&Token::Question) {
        return Ok(cond);
    }
    let then_expr = parse_expr(stream)?;
    stream.expect(Token::Colon)?;
    let else_expr = parse_expr(stream)?;
    Ok(Expr::new(
        ExprKind::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        },
        stream.span_from(start),
    ))
}

fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut left = parse_prefix(stream)?;

    while let Some((prec, op)) = stream.peek().and_then(binary_op_info) {
        if prec < min_prec {
            break;
        }
        stream.advance();
        let right = parse_pratt(stream, prec + 1)?;
        left = Expr::binary(op, left, right, stream.span_from(start));
    }

    Ok(left)
}

fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Bang) => UnaryOp::Not,
        // unary plus is a no-op
        Some(Token::Plus) => {
            stream.advance();
            return parse_prefix(stream);
        }
        _ => return parse_postfix(stream),
    };
    stream.advance();
    let operand = parse_prefix(stream)?;
    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        stream.span_from(start),
    ))
}

fn parse_postfix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut expr = parse_atom(stream)?;
    while stream.eat(&Token::LBracket) {
        let index = parse_expr(stream)?;
        stream.expect(Token::RBracket)?;
        expr = Expr::new(
            ExprKind::Index {
                base: Box::new(expr),
                index: Box::new(index),
            },
            stream.span_from(start),
        );
    }
    if stream.check(&Token::Dot) {
        return Err(ParseError::invalid_syntax(
            "member access is not supported in code blocks",
            stream.current_span(),
        ));
    }
    Ok(expr)
}

fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();
    match stream.advance() {
        Some(Token::Integer(value)) => Ok(Expr::number(*value as f64, span)),
        Some(Token::Float(value)) => Ok(Expr::number(*value, span)),
        Some(Token::True) => Ok(Expr::new(ExprKind::Bool(true), span)),
        Some(Token::False) => Ok(Expr::new(ExprKind::Bool(false), span)),
        Some(Token::LParen) => {
            let inner = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            Ok(inner)
        }
        Some(Token::Ident(first)) => {
            let mut path = vec![first.to_string()];
            while stream.eat(&Token::ColonColon) {
                let segment_span = stream.current_span();
                match stream.advance() {
                    Some(Token::Ident(segment)) => path.push(segment.to_string()),
                    other => {
                        return Err(ParseError::unexpected_token(
                            other,
                            "after '::'",
                            segment_span,
                        ))
                    }
                }
            }
            if stream.eat(&Token::LParen) {
                let args = parse_call_args(stream)?;
                return Ok(Expr::new(
                    ExprKind::Call { path, args },
                    stream.span_from(start),
                ));
            }
            if path.len() > 1 {
                return Err(ParseError::invalid_syntax(
                    format!("'{}' must be called", path.join("::")),
                    stream.span_from(start),
                ));
            }
            Ok(Expr::name(path.remove(0), span))
        }
        other => Err(ParseError::unexpected_token(
            other,
            "where an expression was expected",
            span,
        )),
    }
}

/// Arguments after an already consumed `(`, up to and including `)`.
fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ParseError> {
    let mut args = Vec::new();
    if stream.eat(&Token::RParen) {
        return Ok(args);
    }
    loop {
        args.push(parse_expr(stream)?);
        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RParen)?;
        return Ok(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(source, 0).unwrap();
        let mut stream = TokenStream::new(&tokens, 0);
        parse_expr(&mut stream)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("a + b * c").unwrap().to_string(), "a + b * c");
        assert_eq!(parse("(a + b) * c").unwrap().to_string(), "(a + b) * c");
        assert_eq!(parse("a - b - c").unwrap().to_string(), "a - b - c");
        assert_eq!(parse("a - (b - c)").unwrap().to_string(), "a - (b - c)");
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse("a / b / c").unwrap();
        match expr.kind {
            ExprKind::Binary { left, .. } => {
                assert_eq!(left.to_string(), "a / b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_calls_and_paths() {
        let expr = parse("A * pow(sigmaeq(sig) / K, n)").unwrap();
        assert_eq!(expr.to_string(), "A * pow(sigmaeq(sig) / K, n)");
        let id = parse("StressStensor::Id()").unwrap();
        match id.kind {
            ExprKind::Call { path, args } => {
                assert_eq!(path, vec!["StressStensor", "Id"]);
                assert!(args.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unary_index_and_conditional() {
        assert_eq!(parse("-x[2]").unwrap().to_string(), "-x[2.0]");
        assert_eq!(
            parse("seq > 0 ? seq : 0").unwrap().to_string(),
            "seq > 0.0 ? seq : 0.0"
        );
        assert_eq!(parse("!(a && b)").unwrap().to_string(), "!(a && b)");
    }

    #[test]
    fn test_errors() {
        assert!(parse("a +").is_err());
        assert!(parse("f(a, b").is_err());
        assert!(parse("sig.trace").is_err());
        assert!(parse("Stensor::Id").is_err());
    }
}
