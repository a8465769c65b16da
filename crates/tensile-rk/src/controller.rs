//! Adaptive sub-step controller.
//!
//! The pure functions here define the controller; the `*_stmts` builders emit
//! the same logic as routine IR from the same constants.

use crate::algorithm::{ErrorEstimate, Rational};
use crate::ir::{names, Builtin, Expr, FailureKind, LocalType, MachineConstant, Stmt};
use tensile_model::block::BinaryOp;

/// Sub-step reduction after a failed stage.
pub const FAILURE_REDUCTION: f64 = 0.1;
pub const CORRECTOR_MIN: f64 = 0.1;
pub const CORRECTOR_MAX: f64 = 10.0;
pub const SAFETY_FACTOR: f64 = 0.8;
/// Errors below this many `f64::MIN_POSITIVE` are negligible.
pub const NEGLIGIBLE_ERROR_FACTOR: f64 = 100.0;
/// Default precision threshold, in `dt · f64::EPSILON`.
pub const PRECISION_FACTOR: f64 = 100.0;

pub const CASTEM_RATIO_MAX: f64 = 8.0;
pub const CASTEM_RATIO_MIN: f64 = 0.4;
pub const CASTEM_SHRINK: f64 = 0.1;
pub const CASTEM_GROWTH: f64 = 2.0;

/// Step size law of an embedded scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectorLaw {
    /// `0.8 (ε / error)^exponent`
    Power { exponent: Rational },
    /// Piecewise law on `sqrt(error / ε)`
    Castem,
}

impl CorrectorLaw {
    pub fn for_estimate(estimate: &ErrorEstimate) -> Option<Self> {
        match estimate {
            ErrorEstimate::None => None,
            ErrorEstimate::StateVector { exponent, .. } => Some(CorrectorLaw::Power {
                exponent: *exponent,
            }),
            ErrorEstimate::ThermodynamicForces => Some(CorrectorLaw::Castem),
        }
    }
}

/// Smallest admissible sub-step.
pub fn precision_threshold(dt: f64, minimal_time_step: Option<f64>) -> f64 {
    minimal_time_step.unwrap_or(PRECISION_FACTOR * dt * f64::EPSILON)
}

pub fn is_negligible(error: f64) -> bool {
    error < NEGLIGIBLE_ERROR_FACTOR * f64::MIN_POSITIVE
}

pub fn clamp_corrector(corrector: f64) -> f64 {
    if corrector < CORRECTOR_MIN {
        CORRECTOR_MIN
    } else if corrector > CORRECTOR_MAX {
        CORRECTOR_MAX
    } else {
        corrector
    }
}

fn castem_corrector(error: f64, epsilon: f64) -> f64 {
    let ratio = (error / epsilon).sqrt();
    if ratio > CASTEM_RATIO_MAX {
        CASTEM_SHRINK
    } else if ratio < CASTEM_RATIO_MIN {
        CASTEM_GROWTH
    } else {
        SAFETY_FACTOR / ratio
    }
}

/// Factor applied to the sub-step after an attempt with a finite error.
pub fn corrector(law: CorrectorLaw, error: f64, epsilon: f64) -> f64 {
    if is_negligible(error) {
        return CORRECTOR_MAX;
    }
    let raw = match law {
        CorrectorLaw::Power { exponent } => SAFETY_FACTOR * (epsilon / error).powf(exponent.value()),
        CorrectorLaw::Castem => castem_corrector(error, epsilon),
    };
    clamp_corrector(raw)
}

/// Lands the next sub-step exactly on the end of the time step when it
/// would overshoot it or stop just short of it.
pub fn snap_substep(dt: f64, t: f64, substep: f64, precision: f64) -> f64 {
    if (dt - t - substep).abs() < 2.0 * precision || t + substep > dt {
        dt - t
    } else {
        substep
    }
}

/// True once `t` reached the end of the step. A zero step converges at once.
pub fn has_converged(dt: f64, t: f64, precision: f64) -> bool {
    (dt - t).abs() <= precision
}

/// True when a sub-step is too small to make progress.
pub fn is_underflow(substep: f64, precision: f64) -> bool {
    substep < precision || substep == 0.0
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn abs(expr: Expr) -> Expr {
    Expr::call(Builtin::Abs, vec![expr])
}

/// Initializer of the `dtprec` local.
pub fn precision_init(minimal_time_step: Option<f64>) -> Expr {
    match minimal_time_step {
        Some(value) => Expr::number(value),
        None => {
            Expr::number(PRECISION_FACTOR)
                * var(names::TIME_INCREMENT)
                * Expr::Constant(MachineConstant::Epsilon)
        }
    }
}

/// Controller locals: `error`, `corrector`, `converged`, `failed`.
pub fn controller_locals() -> Vec<Stmt> {
    vec![
        Stmt::declare(names::ERROR, LocalType::Real, Expr::number(0.0)),
        Stmt::declare(names::CORRECTOR, LocalType::Real, Expr::number(1.0)),
        Stmt::declare(names::CONVERGED, LocalType::Bool, Expr::Bool(false)),
        Stmt::declare(names::FAILED, LocalType::Bool, Expr::Bool(false)),
    ]
}

/// Fails with a divergence when the sub-step fell below `dtprec`.
pub fn underflow_check() -> Stmt {
    Stmt::when(
        var(names::SUBSTEP)
            .lt(var(names::PRECISION))
            .or(var(names::SUBSTEP).equals(Expr::number(0.0))),
        vec![Stmt::fail(
            FailureKind::Divergence,
            "sub-step fell below the minimal time step",
        )],
    )
}

/// Reaction to a failed stage.
pub fn stage_failure_stmts() -> Vec<Stmt> {
    vec![
        Stmt::update(names::SUBSTEP, BinaryOp::Mul, Expr::number(FAILURE_REDUCTION)),
        underflow_check(),
    ]
}

fn clamp_stmts() -> Vec<Stmt> {
    vec![Stmt::If {
        cond: var(names::CORRECTOR).lt(Expr::number(CORRECTOR_MIN)),
        then_block: vec![Stmt::assign(names::CORRECTOR, Expr::number(CORRECTOR_MIN))],
        else_block: vec![Stmt::when(
            var(names::CORRECTOR).gt(Expr::number(CORRECTOR_MAX)),
            vec![Stmt::assign(names::CORRECTOR, Expr::number(CORRECTOR_MAX))],
        )],
    }]
}

/// Computes `corrector` from `error` and `epsilon`.
pub fn corrector_stmts(law: CorrectorLaw) -> Vec<Stmt> {
    let mut law_stmts = match law {
        CorrectorLaw::Power { exponent } => vec![Stmt::assign(
            names::CORRECTOR,
            Expr::number(SAFETY_FACTOR)
                * Expr::call(
                    Builtin::Pow,
                    vec![
                        var(names::EPSILON) / var(names::ERROR),
                        Expr::ratio(exponent),
                    ],
                ),
        )],
        CorrectorLaw::Castem => vec![
            Stmt::assign(
                names::CORRECTOR,
                Expr::call(Builtin::Sqrt, vec![var(names::ERROR) / var(names::EPSILON)]),
            ),
            Stmt::If {
                cond: var(names::CORRECTOR).gt(Expr::number(CASTEM_RATIO_MAX)),
                then_block: vec![Stmt::assign(names::CORRECTOR, Expr::number(CASTEM_SHRINK))],
                else_block: vec![Stmt::If {
                    cond: var(names::CORRECTOR).lt(Expr::number(CASTEM_RATIO_MIN)),
                    then_block: vec![Stmt::assign(
                        names::CORRECTOR,
                        Expr::number(CASTEM_GROWTH),
                    )],
                    else_block: vec![Stmt::assign(
                        names::CORRECTOR,
                        Expr::number(SAFETY_FACTOR) / var(names::CORRECTOR),
                    )],
                }],
            },
        ],
    };
    law_stmts.extend(clamp_stmts());
    vec![Stmt::If {
        cond: var(names::ERROR).lt(
            Expr::number(NEGLIGIBLE_ERROR_FACTOR) * Expr::Constant(MachineConstant::MinPositive),
        ),
        then_block: vec![Stmt::assign(names::CORRECTOR, Expr::number(CORRECTOR_MAX))],
        else_block: law_stmts,
    }]
}

/// Rescales the sub-step for the next attempt.
pub fn rescale_stmts(law: CorrectorLaw) -> Vec<Stmt> {
    let mut stmts = corrector_stmts(law);
    stmts.push(Stmt::update(
        names::SUBSTEP,
        BinaryOp::Mul,
        var(names::CORRECTOR),
    ));
    stmts.push(underflow_check());
    stmts.push(snap_stmt());
    stmts
}

pub fn snap_stmt() -> Stmt {
    let remaining = var(names::TIME_INCREMENT) - var(names::TIME);
    Stmt::when(
        abs(remaining.clone() - var(names::SUBSTEP))
            .lt(Expr::number(2.0) * var(names::PRECISION))
            .or((var(names::TIME) + var(names::SUBSTEP)).gt(var(names::TIME_INCREMENT))),
        vec![Stmt::assign(names::SUBSTEP, remaining)],
    )
}

/// `t += dt_`, then flags convergence at the end of the step.
pub fn advance_stmts() -> Vec<Stmt> {
    vec![
        Stmt::update(names::TIME, BinaryOp::Add, var(names::SUBSTEP)),
        Stmt::when(
            abs(var(names::TIME_INCREMENT) - var(names::TIME)).le(var(names::PRECISION)),
            vec![Stmt::assign(names::CONVERGED, Expr::Bool(true))],
        ),
    ]
}
