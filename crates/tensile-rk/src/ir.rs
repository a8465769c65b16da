//! Integration routine IR.
//!
//! Generated routines are trees of [`Stmt`] and [`Expr`]. User code blocks
//! are embedded as functions in their own syntax tree
//! ([`tensile_model::block`]); the routine body calls them through
//! [`Expr::Invoke`]. The printer renders the IR as text and the runtime
//! executes it directly, so both always agree on what was generated.

use crate::algorithm::{Algorithm, Rational};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Not, Sub};
use tensile_model::block::{self, BinaryOp, UnaryOp};
use tensile_model::{CodeBlockId, Evolution, ModellingHypothesis, VariableCategory, VariableType};

/// Names of the locals every generated routine declares.
pub mod names {
    /// Elapsed time inside the step
    pub const TIME: &str = "t";
    /// Time step given by the caller
    pub const TIME_INCREMENT: &str = "dt";
    /// Current sub-step
    pub const SUBSTEP: &str = "dt_";
    /// Smallest admissible sub-step
    pub const PRECISION: &str = "dtprec";
    pub const EPSILON: &str = "epsilon";
    pub const ERROR: &str = "error";
    pub const CORRECTOR: &str = "corrector";
    pub const CONVERGED: &str = "converged";
    pub const FAILED: &str = "failed";
    /// Isotropic elastic stiffness built by `@ComputeStiffnessTensor`
    pub const STIFFNESS: &str = "D";

    /// Names user declarations may not take.
    pub const RESERVED: [&str; 10] = [
        TIME,
        TIME_INCREMENT,
        SUBSTEP,
        PRECISION,
        EPSILON,
        ERROR,
        CORRECTOR,
        CONVERGED,
        FAILED,
        STIFFNESS,
    ];
}

/// Runtime functions available to generated routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Abs,
    Sqrt,
    Pow,
    Min,
    Max,
    /// True when every component of the argument is finite
    IsFinite,
    /// True when every component of every argument is finite
    AllFinite,
    /// Sum of absolute values of all components
    SumAbs,
    /// Largest absolute component, non-finite values winning
    MaxAbs,
    /// Running maximum that never lets a non-finite value be replaced
    AccumulateMax,
    /// Von Mises equivalent of a symmetric tensor
    SigmaEq,
    /// Isotropic stiffness from Young's modulus and Poisson's ratio
    IsotropicStiffness,
}

impl Builtin {
    /// Name used when printing.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "std::abs",
            Builtin::Sqrt => "std::sqrt",
            Builtin::Pow => "std::pow",
            Builtin::Min => "std::min",
            Builtin::Max => "std::max",
            Builtin::IsFinite => "tensile::is_finite",
            Builtin::AllFinite => "tensile::all_finite",
            Builtin::SumAbs => "tensile::sum_abs",
            Builtin::MaxAbs => "tensile::max_abs",
            Builtin::AccumulateMax => "tensile::accumulate_max",
            Builtin::SigmaEq => "sigmaeq",
            Builtin::IsotropicStiffness => "tensile::isotropic_stiffness",
        }
    }
}

/// Machine constants, resolved by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineConstant {
    /// `f64::EPSILON`
    Epsilon,
    /// `f64::MIN_POSITIVE`
    MinPositive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    /// Exact scheme coefficient
    Ratio(Rational),
    Bool(bool),
    Var(String),
    Constant(MachineConstant),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        builtin: Builtin,
        args: Vec<Expr>,
    },
    /// Value of a driving variable at `fraction` of the time step
    Interpolate {
        evolution: Evolution,
        begin: String,
        second: String,
        fraction: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Select {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Calls a code block; evaluates to its success flag
    Invoke(CodeBlockId),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn ratio(value: Rational) -> Self {
        Expr::Ratio(value)
    }

    pub fn call(builtin: Builtin, args: Vec<Expr>) -> Self {
        Expr::Call { builtin, args }
    }

    pub fn invoke(id: CodeBlockId) -> Self {
        Expr::Invoke(id)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `coefficient * self`, dropping a unit coefficient.
    pub fn scaled(self, coefficient: Rational) -> Self {
        if coefficient.is_one() {
            self
        } else {
            Expr::Ratio(coefficient) * self
        }
    }

    pub fn select(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Select {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Le, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Or, self, rhs)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

/// Type of a routine-level local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalType {
    Real,
    Bool,
}

/// How a routine gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The sub-step controller cannot make progress
    Divergence,
    /// A code block reported failure
    Integration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Comment(String),
    Declare {
        name: String,
        ty: LocalType,
        constant: bool,
        init: Expr,
    },
    Assign {
        target: String,
        value: Expr,
    },
    /// `target op= value`
    Update {
        target: String,
        op: BinaryOp,
        value: Expr,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Fail {
        kind: FailureKind,
        message: String,
    },
}

impl Stmt {
    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::Comment(text.into())
    }

    pub fn declare(name: &str, ty: LocalType, init: Expr) -> Self {
        Stmt::Declare {
            name: name.to_string(),
            ty,
            constant: false,
            init,
        }
    }

    pub fn constant(name: &str, init: Expr) -> Self {
        Stmt::Declare {
            name: name.to_string(),
            ty: LocalType::Real,
            constant: true,
            init,
        }
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: target.into(),
            value,
        }
    }

    pub fn update(target: impl Into<String>, op: BinaryOp, value: Expr) -> Self {
        Stmt::Update {
            target: target.into(),
            op,
            value,
        }
    }

    pub fn when(cond: Expr, then_block: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then_block,
            else_block: Vec::new(),
        }
    }

    pub fn fail(kind: FailureKind, message: impl Into<String>) -> Self {
        Stmt::Fail {
            kind,
            message: message.into(),
        }
    }
}

/// Where a storage slot's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotRole {
    /// Provided by the caller, read-only (gradients, external variables,
    /// material properties, `dt`)
    Input,
    /// Provided by the caller and updated (state and auxiliary variables)
    State,
    /// Computed by the routine (thermodynamic forces)
    Output,
    /// Fixed value (parameters, static variables)
    Constant,
    /// Scratch storage of the routine
    Local,
}

/// Storage of one variable, or of one begin/increment/end value of a
/// driving variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub type_name: String,
    pub var_type: VariableType,
    pub role: SlotRole,
    pub category: Option<VariableCategory>,
    pub array_size: usize,
    /// Scalar components of one array element
    pub element_size: usize,
    pub default_value: Option<Vec<f64>>,
}

impl Slot {
    /// Total scalar components.
    pub fn len(&self) -> usize {
        self.array_size * self.element_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A user or generated code block, as embedded in a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFunction {
    pub id: CodeBlockId,
    pub stmts: Vec<block::Stmt>,
}

/// Complete integration routine of one behaviour for one hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRoutine {
    pub behaviour: String,
    pub hypothesis: ModellingHypothesis,
    pub algorithm: Algorithm,
    pub slots: Vec<Slot>,
    pub functions: Vec<BlockFunction>,
    pub body: Vec<Stmt>,
}

impl IntegrationRoutine {
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn function(&self, id: CodeBlockId) -> Option<&BlockFunction> {
        self.functions.iter().find(|function| function.id == id)
    }
}

/// Walks every statement of a body, nested ones included.
pub fn walk_stmts<V>(stmts: &[Stmt], visitor: &mut V)
where
    V: FnMut(&Stmt),
{
    for stmt in stmts {
        visitor(stmt);
        match stmt {
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                walk_stmts(then_block, visitor);
                walk_stmts(else_block, visitor);
            }
            Stmt::While { body, .. } => walk_stmts(body, visitor),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_coefficient_is_dropped() {
        let k = Expr::var("dp_K1");
        assert_eq!(k.clone().scaled(Rational::ONE), k);
        assert_eq!(
            k.clone().scaled(Rational::new(1, 2)),
            Expr::binary(BinaryOp::Mul, Expr::Ratio(Rational::new(1, 2)), k)
        );
    }

    #[test]
    fn test_walk_reaches_nested_statements() {
        let body = vec![Stmt::While {
            cond: !Expr::var(names::CONVERGED),
            body: vec![Stmt::when(
                Expr::var(names::FAILED),
                vec![Stmt::fail(FailureKind::Divergence, "no progress")],
            )],
        }];
        let mut failures = 0;
        walk_stmts(&body, &mut |stmt| {
            if matches!(stmt, Stmt::Fail { .. }) {
                failures += 1;
            }
        });
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_routine_serializes() {
        let routine = IntegrationRoutine {
            behaviour: "Norton".into(),
            hypothesis: ModellingHypothesis::Tridimensional,
            algorithm: Algorithm::Euler,
            slots: vec![],
            functions: vec![],
            body: vec![Stmt::constant(names::EPSILON, Expr::number(1e-8))],
        };
        let json = serde_json::to_string(&routine).unwrap();
        assert!(json.contains("\"Euler\""));
        let back: IntegrationRoutine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, routine);
    }
}
