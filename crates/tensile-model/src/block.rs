//! Code-block syntax tree.
//!
//! User code blocks (`@Derivative { ... }`, `@ComputeStress { ... }`, ...) are
//! parsed into this small statement/expression tree. The tree is walked to
//! compute the names a block references, rewritten so that integration
//! variables point at their current-value buffers, printed back as text, and
//! executed by the runtime.

use crate::foundation::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Expression with its source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Numeric literal
    Number(f64),
    /// `true` / `false`
    Bool(bool),
    /// Variable or local reference
    Name(String),
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call; `path` holds the `::`-separated segments
    Call { path: Vec<String>, args: Vec<Expr> },
    /// `cond ? then : otherwise`
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Compound assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

/// Assignment target: `name` or `name[index]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub index: Option<Expr>,
    pub span: Span,
}

/// Code-block statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `[const] Type name = value;`
    Local {
        name: String,
        type_name: String,
        is_const: bool,
        value: Expr,
        span: Span,
    },
    /// `place op value;`
    Assign {
        target: Place,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
        span: Span,
    },
    /// `return;` or `return value;`
    Return { value: Option<Expr>, span: Span },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn number(value: f64, span: Span) -> Self {
        Self::new(ExprKind::Number(value), span)
    }

    pub fn name(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Name(name.into()), span)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Local { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }

    /// `target = value;` at `span`.
    pub fn assign(target: impl Into<String>, value: Expr, span: Span) -> Self {
        Stmt::Assign {
            target: Place {
                name: target.into(),
                index: None,
                span,
            },
            op: AssignOp::Set,
            value,
            span,
        }
    }
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Set => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
        }
    }
}

/// Pre-order walk over every expression of a statement list.
pub fn walk_stmts<V>(stmts: &[Stmt], visitor: &mut V)
where
    V: FnMut(&Expr),
{
    for stmt in stmts {
        match stmt {
            Stmt::Local { value, .. } => walk_expr(value, visitor),
            Stmt::Assign { target, value, .. } => {
                visitor(&Expr::name(target.name.clone(), target.span));
                if let Some(index) = &target.index {
                    walk_expr(index, visitor);
                }
                walk_expr(value, visitor);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                walk_expr(cond, visitor);
                walk_stmts(then_branch, visitor);
                walk_stmts(else_branch, visitor);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    walk_expr(value, visitor);
                }
            }
        }
    }
}

/// Pre-order walk over an expression tree.
pub fn walk_expr<V>(expr: &Expr, visitor: &mut V)
where
    V: FnMut(&Expr),
{
    visitor(expr);
    match &expr.kind {
        ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Name(_) => {}
        ExprKind::Index { base, index } => {
            walk_expr(base, visitor);
            walk_expr(index, visitor);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, visitor),
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, visitor);
            }
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            walk_expr(cond, visitor);
            walk_expr(then_expr, visitor);
            walk_expr(else_expr, visitor);
        }
    }
}

/// Every name read or written by a statement list, locals included.
pub fn referenced_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    walk_stmts(stmts, &mut |expr| {
        if let ExprKind::Name(name) = &expr.kind {
            names.insert(name.clone());
        }
    });
    names
}

/// Renames references in place. `rename` returns the new name, or `None` to
/// keep the reference. Names bound by `Local` statements are never renamed.
pub fn rename_references<F>(stmts: &mut [Stmt], rename: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut locals = BTreeSet::new();
    rename_in_stmts(stmts, rename, &mut locals);
}

fn rename_in_stmts<F>(stmts: &mut [Stmt], rename: &F, locals: &mut BTreeSet<String>)
where
    F: Fn(&str) -> Option<String>,
{
    for stmt in stmts {
        match stmt {
            Stmt::Local { name, value, .. } => {
                rename_in_expr(value, rename, locals);
                locals.insert(name.clone());
            }
            Stmt::Assign { target, value, .. } => {
                if !locals.contains(&target.name) {
                    if let Some(new_name) = rename(&target.name) {
                        target.name = new_name;
                    }
                }
                if let Some(index) = &mut target.index {
                    rename_in_expr(index, rename, locals);
                }
                rename_in_expr(value, rename, locals);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                rename_in_expr(cond, rename, locals);
                rename_in_stmts(then_branch, rename, locals);
                rename_in_stmts(else_branch, rename, locals);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    rename_in_expr(value, rename, locals);
                }
            }
        }
    }
}

fn rename_in_expr<F>(expr: &mut Expr, rename: &F, locals: &BTreeSet<String>)
where
    F: Fn(&str) -> Option<String>,
{
    match &mut expr.kind {
        ExprKind::Name(name) => {
            if !locals.contains(name.as_str()) {
                if let Some(new_name) = rename(name) {
                    *name = new_name;
                }
            }
        }
        ExprKind::Number(_) | ExprKind::Bool(_) => {}
        ExprKind::Index { base, index } => {
            rename_in_expr(base, rename, locals);
            rename_in_expr(index, rename, locals);
        }
        ExprKind::Unary { operand, .. } => rename_in_expr(operand, rename, locals),
        ExprKind::Binary { left, right, .. } => {
            rename_in_expr(left, rename, locals);
            rename_in_expr(right, rename, locals);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                rename_in_expr(arg, rename, locals);
            }
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            rename_in_expr(cond, rename, locals);
            rename_in_expr(then_expr, rename, locals);
            rename_in_expr(else_expr, rename, locals);
        }
    }
}

// Ternary and unary slots in the precedence ladder used for printing.
const TERNARY_PRECEDENCE: u8 = 0;
const UNARY_PRECEDENCE: u8 = 7;

fn expr_precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Conditional { .. } => TERNARY_PRECEDENCE,
        ExprKind::Binary { op, .. } => op.precedence(),
        ExprKind::Unary { .. } => UNARY_PRECEDENCE,
        _ => u8::MAX,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr_precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number(value) => write!(f, "{}", format_number(*value)),
            ExprKind::Bool(value) => write!(f, "{}", value),
            ExprKind::Name(name) => f.write_str(name),
            ExprKind::Index { base, index } => {
                write_operand(f, base, u8::MAX)?;
                write!(f, "[{}]", index)
            }
            ExprKind::Unary { op, operand } => {
                f.write_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                })?;
                write_operand(f, operand, UNARY_PRECEDENCE)
            }
            ExprKind::Binary { op, left, right } => {
                let prec = op.precedence();
                write_operand(f, left, prec)?;
                write!(f, " {} ", op.symbol())?;
                // left-associative: an equal-precedence right operand needs parentheses
                write_operand(f, right, prec + 1)
            }
            ExprKind::Call { path, args } => {
                write!(f, "{}(", path.join("::"))?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                write_operand(f, cond, TERNARY_PRECEDENCE + 1)?;
                f.write_str(" ? ")?;
                write_operand(f, then_expr, TERNARY_PRECEDENCE + 1)?;
                f.write_str(" : ")?;
                write_operand(f, else_expr, TERNARY_PRECEDENCE)
            }
        }
    }
}

/// Formats a literal so that it reads back as a floating point number.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else if value.is_finite() && value.abs() >= 1e-4 && value.abs() < 1e15 {
        format!("{}", value)
    } else {
        format!("{:e}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp() -> Span {
        Span::zero(0)
    }

    fn name(n: &str) -> Expr {
        Expr::name(n, sp())
    }

    #[test]
    fn test_referenced_names_covers_targets_and_calls() {
        let stmts = vec![
            Stmt::Local {
                name: "seq".into(),
                type_name: "stress".into(),
                is_const: true,
                value: Expr::new(
                    ExprKind::Call {
                        path: vec!["sigmaeq".into()],
                        args: vec![name("sig")],
                    },
                    sp(),
                ),
                span: sp(),
            },
            Stmt::assign("dp", Expr::binary(BinaryOp::Mul, name("A"), name("seq"), sp()), sp()),
        ];
        let names = referenced_names(&stmts);
        let expected: BTreeSet<String> =
            ["A", "dp", "seq", "sig"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_rename_skips_block_locals() {
        let mut stmts = vec![
            Stmt::Local {
                name: "p".into(),
                type_name: "real".into(),
                is_const: false,
                value: name("p"),
                span: sp(),
            },
            Stmt::assign("dq", name("p"), sp()),
        ];
        rename_references(&mut stmts, &|n| (n == "p").then(|| "p_".to_string()));
        match &stmts[0] {
            Stmt::Local { value, .. } => assert_eq!(value.to_string(), "p_"),
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Stmt::Assign { value, .. } => assert_eq!(value.to_string(), "p"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display_respects_precedence() {
        let sum = Expr::binary(BinaryOp::Add, name("a"), name("b"), sp());
        let product = Expr::binary(BinaryOp::Mul, sum.clone(), name("c"), sp());
        assert_eq!(product.to_string(), "(a + b) * c");
        let diff = Expr::binary(BinaryOp::Sub, name("a"), sum, sp());
        assert_eq!(diff.to_string(), "a - (a + b)");
        let neg = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::binary(BinaryOp::Mul, name("x"), name("y"), sp())),
            },
            sp(),
        );
        assert_eq!(neg.to_string(), "-(x * y)");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1.0");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(1e-8), "1e-8");
        assert_eq!(format_number(-3.0), "-3.0");
    }
}
