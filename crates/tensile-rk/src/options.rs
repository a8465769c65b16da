//! Compiler options.
//!
//! Options are built once per compilation run and passed by reference to the
//! keyword dispatcher and to the code generator.

use crate::algorithm::Algorithm;
use tensile_model::ModellingHypothesis;

/// Convergence tolerance used when `@Epsilon` is absent.
pub const DEFAULT_EPSILON: f64 = 1.0e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// Scheme used when a behaviour has no `@Algorithm`
    pub default_algorithm: Algorithm,
    /// Tolerance used when a behaviour has no `@Epsilon`
    pub default_epsilon: f64,
    /// Restricts generation to these hypotheses; `None` generates all of
    /// the behaviour's hypotheses
    pub hypotheses: Option<Vec<ModellingHypothesis>>,
    /// Emit explanatory comments in generated routines
    pub emit_comments: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            default_algorithm: Algorithm::RungeKutta54,
            default_epsilon: DEFAULT_EPSILON,
            hypotheses: None,
            emit_comments: true,
        }
    }
}

impl CompilerOptions {
    pub fn with_default_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.default_algorithm = algorithm;
        self
    }

    pub fn with_hypotheses(mut self, hypotheses: Vec<ModellingHypothesis>) -> Self {
        self.hypotheses = Some(hypotheses);
        self
    }

    pub fn with_comments(mut self, emit_comments: bool) -> Self {
        self.emit_comments = emit_comments;
        self
    }

    /// True when routines should be generated for `hypothesis`.
    pub fn selects(&self, hypothesis: ModellingHypothesis) -> bool {
        self.hypotheses
            .as_ref()
            .map_or(true, |selected| selected.contains(&hypothesis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.default_algorithm, Algorithm::RungeKutta54);
        assert_eq!(options.default_epsilon, 1.0e-8);
        assert!(options.selects(ModellingHypothesis::PlaneStrain));
    }

    #[test]
    fn test_hypothesis_filter() {
        let options =
            CompilerOptions::default().with_hypotheses(vec![ModellingHypothesis::Tridimensional]);
        assert!(options.selects(ModellingHypothesis::Tridimensional));
        assert!(!options.selects(ModellingHypothesis::PlaneStrain));
    }
}
