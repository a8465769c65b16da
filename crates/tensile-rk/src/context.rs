//! Generation context of one (behaviour, hypothesis) pair.

use crate::algorithm::{Algorithm, AlgorithmDescriptor};
use crate::error_norm::ErrorEvaluationStrategy;
use crate::finalize::{castem_force_name, resolved_algorithm};
use crate::ir::{names, Builtin, Expr, Stmt};
use crate::options::CompilerOptions;
use tensile_model::variable::current_value_name;
use tensile_model::{
    BehaviourData, BehaviourModel, CompileError, CompileResult, ModellingHypothesis,
    NormalizationFactor, Span, Variable, VariableCategory,
};

/// Read-only view the emitter works from. Created per generation call.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationContext<'m> {
    pub model: &'m BehaviourModel,
    pub hypothesis: ModellingHypothesis,
    /// Specialised data of `hypothesis`
    pub data: &'m BehaviourData,
    pub descriptor: &'static AlgorithmDescriptor,
    pub strategy: ErrorEvaluationStrategy,
    /// The stiffness tensor depends on an external state variable and is
    /// refreshed at every stage
    pub uses_stiffness_update: bool,
    pub options: &'m CompilerOptions,
}

impl<'m> IntegrationContext<'m> {
    pub fn new(
        model: &'m BehaviourModel,
        hypothesis: ModellingHypothesis,
        options: &'m CompilerOptions,
    ) -> CompileResult<Self> {
        let span = Span::zero(0);
        if !model.is_specialised(hypothesis) {
            return Err(CompileError::internal(
                span,
                format!("declarations were not completed for {}", hypothesis),
            ));
        }
        let data = model.data_for(hypothesis);
        let algorithm = resolved_algorithm(model, span)?;
        let uses_stiffness_update = model.stiffness.as_ref().is_some_and(|stiffness| {
            [&stiffness.young_modulus, &stiffness.poisson_ratio]
                .into_iter()
                .any(|name| {
                    data.variable(name).is_some_and(|v| {
                        v.category == VariableCategory::ExternalStateVariable
                    })
                })
        });
        Ok(Self {
            model,
            hypothesis,
            data,
            descriptor: algorithm.descriptor(),
            strategy: ErrorEvaluationStrategy::for_dimension(data.state_dimension(hypothesis)),
            uses_stiffness_update,
            options,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.descriptor.algorithm
    }

    pub fn epsilon(&self) -> f64 {
        self.model
            .attributes
            .epsilon()
            .unwrap_or(self.options.default_epsilon)
    }

    pub fn minimal_time_step(&self) -> Option<f64> {
        self.model.attributes.minimal_time_step()
    }

    pub fn state_variables(&self) -> Vec<&'m Variable> {
        self.data.integration_variables().collect()
    }

    pub fn state_dimension(&self) -> usize {
        self.data.state_dimension(self.hypothesis)
    }

    /// Driving variables with a current-value buffer.
    pub fn interpolated_variables(&self) -> Vec<&'m Variable> {
        let data = self.data;
        data.variables()
            .filter(|v| v.category.is_driving() && data.has_variable(&current_value_name(&v.name)))
            .collect()
    }

    /// Thermodynamic force whose residual rkCastem measures, with its saved copy.
    pub fn castem_force(&self) -> Option<(&'m Variable, String)> {
        if self.algorithm() != Algorithm::RungeKuttaCastem {
            return None;
        }
        self.data
            .thermodynamic_forces()
            .next()
            .map(|force| (force, castem_force_name(&force.name)))
    }

    /// Current value of `name`: its buffer when it is interpolated.
    fn current(&self, name: &str) -> Expr {
        let buffer = current_value_name(name);
        let interpolated = self
            .data
            .variable(name)
            .is_some_and(|v| v.category.is_driving())
            && self.data.has_variable(&buffer);
        if interpolated {
            Expr::var(buffer)
        } else {
            Expr::var(name)
        }
    }

    /// Scale of the rkCastem stress residual: the explicit factor, or the
    /// Young modulus of the stiffness definition.
    pub fn stress_normalization(&self) -> Option<Expr> {
        match self.model.attributes.stress_error_normalization_factor() {
            Some(factor) => Some(normalization_expr(factor)),
            None => self
                .model
                .stiffness
                .as_ref()
                .map(|stiffness| self.current(&stiffness.young_modulus)),
        }
    }

    /// `D = isotropic_stiffness(E, nu)` at the current values.
    pub fn stiffness_update(&self) -> Option<Stmt> {
        self.model.stiffness.as_ref().map(|stiffness| {
            Stmt::assign(
                names::STIFFNESS,
                Expr::call(
                    Builtin::IsotropicStiffness,
                    vec![
                        self.current(&stiffness.young_modulus),
                        self.current(&stiffness.poisson_ratio),
                    ],
                ),
            )
        })
    }

    /// Stiffness refresh during the step, when the stiffness can change.
    pub fn stiffness_refresh(&self) -> Option<Stmt> {
        if self.uses_stiffness_update {
            self.stiffness_update()
        } else {
            None
        }
    }
}

pub fn normalization_expr(factor: &NormalizationFactor) -> Expr {
    match factor {
        NormalizationFactor::Literal(value) => Expr::number(*value),
        NormalizationFactor::Variable(name) => Expr::var(name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::BehaviourReader;
    use crate::finalize::complete_declarations;
    use crate::keywords::KeywordTable;
    use tensile_parser::tokenize;

    fn model(source: &str, options: &CompilerOptions) -> BehaviourModel {
        let table = KeywordTable::new();
        let tokens = tokenize(source, 0).unwrap();
        let mut model = BehaviourReader::new(options, &table, source, 0)
            .unwrap()
            .read(&tokens)
            .unwrap();
        complete_declarations(&mut model, options).unwrap();
        model
    }

    const THERMAL: &str = "@Algorithm rkCastem;\n\
        @ModellingHypothesis Tridimensional;\n\
        @ExternalStateVariable real young;\n\
        @MaterialProperty real nu;\n\
        @StateVariable StrainStensor evp;\n\
        @ComputeStiffnessTensor {young, nu};\n\
        @ComputeStress { sig = D * (eto - evp); }\n\
        @Derivative { devp = 1.e-3 * deviator(sig); }\n";

    #[test]
    fn test_stiffness_follows_external_variables() {
        let options = CompilerOptions::default();
        let model = model(THERMAL, &options);
        let ctx = IntegrationContext::new(&model, ModellingHypothesis::Tridimensional, &options)
            .unwrap();
        assert!(ctx.uses_stiffness_update);
        assert_eq!(
            ctx.stiffness_refresh(),
            Some(Stmt::assign(
                "D",
                Expr::call(
                    Builtin::IsotropicStiffness,
                    vec![Expr::var("young_"), Expr::var("nu")]
                )
            ))
        );
        assert_eq!(ctx.stress_normalization(), Some(Expr::var("young_")));
        let (force, saved) = ctx.castem_force().unwrap();
        assert_eq!(force.name, "sig");
        assert_eq!(saved, "sig_rk");
        let drivers: Vec<_> = ctx.interpolated_variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(drivers, vec!["eto", "young"]);
    }

    #[test]
    fn test_defaults_and_strategy() {
        let options = CompilerOptions::default();
        let model = model("@StateVariable real p;\n@Derivative { dp = 1; }", &options);
        let ctx = IntegrationContext::new(&model, ModellingHypothesis::PlaneStrain, &options)
            .unwrap();
        assert_eq!(ctx.epsilon(), 1e-8);
        assert_eq!(ctx.algorithm(), Algorithm::RungeKutta54);
        assert_eq!(ctx.strategy, ErrorEvaluationStrategy::Summation);
        assert!(!ctx.uses_stiffness_update);
        assert_eq!(ctx.stiffness_refresh(), None);
        assert!(ctx.castem_force().is_none());
    }

    #[test]
    fn test_requires_completed_declarations() {
        let options = CompilerOptions::default();
        let unfinished = tensile_model::BehaviourModel::new(tensile_model::BehaviourType::General);
        let err = IntegrationContext::new(&unfinished, ModellingHypothesis::Tridimensional, &options)
            .unwrap_err();
        assert_eq!(err.kind, tensile_model::ErrorKind::Internal);
    }
}
