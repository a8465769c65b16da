//! Error evaluation for embedded schemes.
//!
//! Each state variable contributes `Σ e_i K_i` divided by its normalization
//! factor. Small state vectors sum the absolute contributions and divide by
//! the total dimension; large ones (20 components and more) keep the largest
//! absolute component. In both cases a non-finite contribution makes the
//! whole error non-finite, which the controller reports as a divergence.

use crate::ir::{names, Builtin, Expr, Stmt};
use tensile_model::block::BinaryOp;

/// State dimension from which the maximum norm is used.
pub const MAXIMUM_NORM_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEvaluationStrategy {
    /// Mean absolute contribution
    Summation,
    /// Largest absolute contribution
    MaximumNorm,
}

impl ErrorEvaluationStrategy {
    pub fn for_dimension(state_dimension: usize) -> Self {
        if state_dimension >= MAXIMUM_NORM_THRESHOLD {
            ErrorEvaluationStrategy::MaximumNorm
        } else {
            ErrorEvaluationStrategy::Summation
        }
    }
}

/// Running maximum in which non-finite values always win and are never
/// replaced by anything smaller.
pub fn accumulate_max(running: f64, candidate: f64) -> f64 {
    if running.is_finite() {
        if !candidate.is_finite() || candidate > running {
            candidate
        } else {
            running
        }
    } else if !candidate.is_finite() && candidate > running {
        candidate
    } else {
        running
    }
}

/// Largest absolute component under [`accumulate_max`].
pub fn max_abs(values: &[f64]) -> f64 {
    values
        .iter()
        .fold(0.0, |running, value| accumulate_max(running, value.abs()))
}

pub fn sum_abs(values: &[f64]) -> f64 {
    values.iter().map(|value| value.abs()).sum()
}

/// One state variable's share of the error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContribution {
    /// `Σ e_i K_i`
    pub combination: Expr,
    pub normalization: Option<Expr>,
}

impl ErrorContribution {
    fn term(&self, builtin: Builtin) -> Expr {
        let reduced = Expr::call(builtin, vec![self.combination.clone()]);
        match &self.normalization {
            Some(factor) => reduced / factor.clone(),
            None => reduced,
        }
    }
}

/// Statements leaving the error in `error`.
pub fn error_stmts(
    strategy: ErrorEvaluationStrategy,
    contributions: &[ErrorContribution],
    state_dimension: usize,
) -> Vec<Stmt> {
    let mut stmts = vec![Stmt::assign(names::ERROR, Expr::number(0.0))];
    if contributions.is_empty() || state_dimension == 0 {
        return stmts;
    }
    match strategy {
        ErrorEvaluationStrategy::Summation => {
            for contribution in contributions {
                stmts.push(Stmt::update(
                    names::ERROR,
                    BinaryOp::Add,
                    contribution.term(Builtin::SumAbs),
                ));
            }
            stmts.push(Stmt::update(
                names::ERROR,
                BinaryOp::Div,
                Expr::number(state_dimension as f64),
            ));
        }
        ErrorEvaluationStrategy::MaximumNorm => {
            for contribution in contributions {
                stmts.push(Stmt::assign(
                    names::ERROR,
                    Expr::call(
                        Builtin::AccumulateMax,
                        vec![Expr::var(names::ERROR), contribution.term(Builtin::MaxAbs)],
                    ),
                ));
            }
        }
    }
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_threshold() {
        assert_eq!(
            ErrorEvaluationStrategy::for_dimension(19),
            ErrorEvaluationStrategy::Summation
        );
        assert_eq!(
            ErrorEvaluationStrategy::for_dimension(20),
            ErrorEvaluationStrategy::MaximumNorm
        );
    }

    #[test]
    fn test_non_finite_values_win() {
        assert_eq!(accumulate_max(1.0, 2.0), 2.0);
        assert_eq!(accumulate_max(2.0, 1.0), 2.0);
        assert!(accumulate_max(1.0, f64::NAN).is_nan());
        assert!(accumulate_max(f64::NAN, 1.0e300).is_nan());
        assert_eq!(accumulate_max(1.0, f64::INFINITY), f64::INFINITY);
        assert_eq!(accumulate_max(f64::INFINITY, 5.0), f64::INFINITY);
        // a NaN never displaces an infinity, nor the reverse
        assert_eq!(accumulate_max(f64::INFINITY, f64::NAN), f64::INFINITY);
        assert!(accumulate_max(f64::NAN, f64::INFINITY).is_nan());
    }

    #[test]
    fn test_reductions() {
        assert_eq!(max_abs(&[1.0, -3.0, 2.0]), 3.0);
        assert!(max_abs(&[1.0, f64::NAN, 4.0]).is_nan());
        assert_eq!(max_abs(&[]), 0.0);
        assert_eq!(sum_abs(&[1.0, -3.0, 2.0]), 6.0);
    }

    #[test]
    fn test_summation_divides_by_dimension() {
        let contributions = vec![
            ErrorContribution {
                combination: Expr::var("dp_K1"),
                normalization: None,
            },
            ErrorContribution {
                combination: Expr::var("devp_K1"),
                normalization: Some(Expr::var("E")),
            },
        ];
        let stmts = error_stmts(ErrorEvaluationStrategy::Summation, &contributions, 7);
        assert_eq!(stmts.len(), 4);
        assert_eq!(
            stmts[3],
            Stmt::update(names::ERROR, BinaryOp::Div, Expr::number(7.0))
        );
    }

    #[test]
    fn test_maximum_norm_accumulates() {
        let contributions = vec![ErrorContribution {
            combination: Expr::var("dp_K1"),
            normalization: None,
        }];
        let stmts = error_stmts(ErrorEvaluationStrategy::MaximumNorm, &contributions, 24);
        assert_eq!(stmts.len(), 2);
        assert!(matches!(
            &stmts[1],
            Stmt::Assign { value: Expr::Call { builtin: Builtin::AccumulateMax, .. }, .. }
        ));
    }

    #[test]
    fn test_empty_state_has_zero_error() {
        let stmts = error_stmts(ErrorEvaluationStrategy::Summation, &[], 0);
        assert_eq!(stmts, vec![Stmt::assign(names::ERROR, Expr::number(0.0))]);
    }
}
