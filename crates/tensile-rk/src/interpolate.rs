//! Driving-variable interpolation.
//!
//! Gradients and external state variables are known at the beginning and at
//! the end of the time step. At a stage evaluated at time `t + c·dt_` their
//! current-value buffers receive the linear interpolation at
//! `p = (t + c·dt_) / dt`. The end points are exact: `p == 0` yields the
//! begin value and `p == 1` the end value, without rounding. A zero time
//! step evaluates every stage at `p = 0`.

use crate::algorithm::Rational;
use crate::ir::{self, names, Builtin, Expr};
use tensile_model::variable::{current_value_name, increment_name};
use tensile_model::{Evolution, Variable, VariableCategory};

/// Value of a driving variable at fraction `p` of the time step.
///
/// `second` is the increment for [`Evolution::IncrementKnown`] and the end
/// value for [`Evolution::BeginEnd`].
pub fn interpolate(evolution: Evolution, p: f64, begin: f64, second: f64) -> f64 {
    if p == 0.0 {
        return begin;
    }
    match evolution {
        Evolution::IncrementKnown if p == 1.0 => begin + second,
        Evolution::IncrementKnown => begin + p * second,
        Evolution::BeginEnd if p == 1.0 => second,
        Evolution::BeginEnd => begin + p * (second - begin),
    }
}

/// Interpolation rule of a driving variable. External state variables always
/// come with a known increment.
pub fn rule_for(variable: &Variable) -> Evolution {
    match variable.category {
        VariableCategory::ExternalStateVariable => Evolution::IncrementKnown,
        _ => variable.evolution,
    }
}

fn offset(c: Rational) -> Expr {
    if c.is_zero() {
        Expr::var(names::TIME)
    } else {
        Expr::var(names::TIME) + Expr::var(names::SUBSTEP).scaled(c)
    }
}

/// `(t + c·dt_) / dt`: the step fraction of a stage evaluated at sub-step
/// fraction `c`, or `0` for a zero time step.
pub fn stage_fraction(c: Rational) -> Expr {
    Expr::select(
        Expr::var(names::TIME_INCREMENT).equals(Expr::number(0.0)),
        Expr::number(0.0),
        offset(c) / Expr::var(names::TIME_INCREMENT),
    )
}

/// Step fraction at the end of the current sub-step. Exactly `1` once the
/// sub-step reaches the end of the time step, so the last accepted sub-step
/// sees the same end values as the final forces.
pub fn substep_end_fraction() -> Expr {
    let remaining = Expr::var(names::TIME_INCREMENT)
        - Expr::var(names::TIME)
        - Expr::var(names::SUBSTEP);
    Expr::select(
        Expr::call(Builtin::Abs, vec![remaining]).le(Expr::var(names::PRECISION)),
        end_of_step(),
        offset(Rational::ONE) / Expr::var(names::TIME_INCREMENT),
    )
}

/// Fraction denoting the end of the time step.
pub fn end_of_step() -> Expr {
    Expr::ratio(Rational::ONE)
}

/// Storage of the begin value and of the increment or end value, under the
/// variable's interpolation rule.
pub fn storage_names(variable: &Variable) -> (String, String) {
    match rule_for(variable) {
        Evolution::IncrementKnown => (variable.name.clone(), increment_name(&variable.name)),
        Evolution::BeginEnd => (variable.begin_name(), variable.second_name()),
    }
}

/// `v_ = interpolate(v, p)` for one driving variable.
pub fn interpolation_stmt(variable: &Variable, fraction: Expr) -> ir::Stmt {
    let evolution = rule_for(variable);
    let (begin, second) = storage_names(variable);
    ir::Stmt::assign(
        current_value_name(&variable.name),
        Expr::Interpolate {
            evolution,
            begin,
            second,
            fraction: Box::new(fraction),
        },
    )
}

/// Interpolation statements for every listed driving variable.
pub fn interpolation_stmts(variables: &[&Variable], fraction: &Expr) -> Vec<ir::Stmt> {
    variables
        .iter()
        .map(|variable| interpolation_stmt(variable, fraction.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use tensile_model::{Span, VariableType};

    #[test]
    fn test_end_points_are_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..1000 {
            let begin: f64 = rng.random_range(-1.0e6..1.0e6);
            let second: f64 = rng.random_range(-1.0e6..1.0e6);
            assert_eq!(interpolate(Evolution::IncrementKnown, 0.0, begin, second), begin);
            assert_eq!(
                interpolate(Evolution::IncrementKnown, 1.0, begin, second),
                begin + second
            );
            assert_eq!(interpolate(Evolution::BeginEnd, 0.0, begin, second), begin);
            assert_eq!(interpolate(Evolution::BeginEnd, 1.0, begin, second), second);
        }
    }

    #[test]
    fn test_interior_points_are_linear() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            let begin: f64 = rng.random_range(-10.0..10.0);
            let end: f64 = rng.random_range(-10.0..10.0);
            let p: f64 = rng.random_range(0.0..1.0);
            let known = interpolate(Evolution::IncrementKnown, p, begin, end - begin);
            let both = interpolate(Evolution::BeginEnd, p, begin, end);
            assert!((known - both).abs() < 1e-12);
            assert!(both >= begin.min(end) - 1e-12 && both <= begin.max(end) + 1e-12);
        }
    }

    #[test]
    fn test_substep_end_snaps_to_end_of_step() {
        assert_eq!(
            substep_end_fraction().to_string(),
            "std::abs(dt - t - dt_) <= dtprec ? real(1)/real(1) : (t + dt_) / dt"
        );
        assert_eq!(
            stage_fraction(Rational::ZERO).to_string(),
            "dt == 0.0 ? 0.0 : t / dt"
        );
    }

    #[test]
    fn test_external_variables_use_increments() {
        let temperature = Variable::new(
            "T",
            "temperature",
            VariableType::Scalar,
            VariableCategory::ExternalStateVariable,
            Span::zero(0),
        )
        .with_evolution(Evolution::BeginEnd);
        assert_eq!(rule_for(&temperature), Evolution::IncrementKnown);
        match interpolation_stmt(&temperature, end_of_step()) {
            ir::Stmt::Assign { target, value } => {
                assert_eq!(target, "T_");
                assert!(matches!(
                    value,
                    Expr::Interpolate { ref begin, ref second, .. } if begin == "T" && second == "dT"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_begin_end_gradient_storage() {
        let f = Variable::new(
            "F",
            "DeformationGradientTensor",
            VariableType::Tensor,
            VariableCategory::Gradient,
            Span::zero(0),
        )
        .with_evolution(Evolution::BeginEnd);
        match interpolation_stmt(&f, stage_fraction(Rational::new(1, 2))) {
            ir::Stmt::Assign { target, value } => {
                assert_eq!(target, "F_");
                assert!(matches!(
                    value,
                    Expr::Interpolate { ref begin, ref second, .. } if begin == "F0" && second == "F1"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
