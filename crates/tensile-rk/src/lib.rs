// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Explicit Runge-Kutta integration for behaviour descriptions.
//!
//! Reading and generation run in two phases:
//!
//! 1. [`read_behaviour`] dispatches every `@Keyword` through the
//!    [`KeywordTable`], validates the behaviour as a whole and completes
//!    the declarations of each modelling hypothesis with the buffers the
//!    chosen scheme needs.
//! 2. [`generate_routine`] builds the [`IntegrationRoutine`] of one
//!    hypothesis: fixed-step schemes integrate the time step at once,
//!    embedded ones run an adaptive sub-step controller driven by their
//!    error estimate.
//!
//! The routine IR is rendered as text by [`printer`] and executed directly
//! by the `tensile-vm` interpreter.

pub mod algorithm;
pub mod context;
pub mod controller;
pub mod dsl;
pub mod emitter;
pub mod error_norm;
pub mod finalize;
pub mod interpolate;
pub mod ir;
pub mod keywords;
pub mod options;
pub mod printer;

pub use algorithm::{Algorithm, AlgorithmDescriptor, ErrorEstimate, Rational, ALGORITHMS};
pub use context::IntegrationContext;
pub use dsl::BehaviourReader;
pub use emitter::{generate, generate_source};
pub use error_norm::ErrorEvaluationStrategy;
pub use finalize::{complete_declarations, selected_hypotheses};
pub use ir::{IntegrationRoutine, Slot, SlotRole};
pub use keywords::{KeywordHandler, KeywordTable};
pub use options::CompilerOptions;
pub use printer::render;

use tensile_model::{BehaviourModel, CompileResult, ModellingHypothesis};
use tracing::debug;

/// Reads a behaviour description and completes its declarations for every
/// hypothesis `options` selects.
pub fn read_behaviour(
    source: &str,
    file_id: u16,
    options: &CompilerOptions,
    table: &KeywordTable,
) -> CompileResult<BehaviourModel> {
    let tokens = tensile_parser::tokenize(source, file_id)?;
    debug!(file_id, tokens = tokens.len(), "behaviour lexed");
    let mut model = BehaviourReader::new(options, table, source, file_id)?.read(&tokens)?;
    complete_declarations(&mut model, options)?;
    Ok(model)
}

/// Integration routine of `model` for `hypothesis`.
pub fn generate_routine(
    model: &BehaviourModel,
    hypothesis: ModellingHypothesis,
    options: &CompilerOptions,
) -> CompileResult<IntegrationRoutine> {
    let ctx = IntegrationContext::new(model, hypothesis, options)?;
    generate(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensile_model::ErrorKind;

    const NORTON: &str = "@DSL RungeKutta;\n\
        @Behaviour Norton;\n\
        @Algorithm rk54;\n\
        @ModellingHypotheses {Tridimensional, Axisymmetrical};\n\
        @MaterialProperty stress young;\n\
        @MaterialProperty real nu;\n\
        @StateVariable strain p;\n\
        @StateVariable StrainStensor evp;\n\
        @ComputeStiffnessTensor {young, nu};\n\
        @ComputeStress { sig = D * (eto - evp); }\n\
        @Derivative {\n\
            const real seq = sigmaeq(sig);\n\
            dp = 1.e-8 * pow(seq, 3);\n\
            devp = 1.5 * dp * deviator(sig) / max(seq, 1.e-12);\n\
        }\n";

    #[test]
    fn test_read_and_generate_every_hypothesis() {
        let options = CompilerOptions::default();
        let table = KeywordTable::new();
        let model = read_behaviour(NORTON, 0, &options, &table).unwrap();
        assert_eq!(model.class_name(), "Norton");
        for hypothesis in selected_hypotheses(&model, &options) {
            let routine = generate_routine(&model, hypothesis, &options).unwrap();
            assert_eq!(routine.algorithm, Algorithm::RungeKutta54);
            assert_eq!(routine.hypothesis, hypothesis);
            assert_eq!(
                routine.slot("evp").unwrap().len(),
                hypothesis.stensor_size()
            );
        }
    }

    #[test]
    fn test_selection_restricts_generation() {
        let options =
            CompilerOptions::default().with_hypotheses(vec![ModellingHypothesis::Axisymmetrical]);
        let table = KeywordTable::new();
        let model = read_behaviour(NORTON, 0, &options, &table).unwrap();
        assert!(model.is_specialised(ModellingHypothesis::Axisymmetrical));
        let err = generate_routine(&model, ModellingHypothesis::Tridimensional, &options)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_lexer_errors_are_syntax_errors() {
        let options = CompilerOptions::default();
        let table = KeywordTable::new();
        let err = read_behaviour("@Epsilon 1e-8; $", 0, &options, &table).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
