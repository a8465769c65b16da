//! Behaviour model.
//!
//! The model owns every variable and code block of one behaviour. Front-end
//! keyword handlers fill the hypothesis-independent data; once reading is
//! complete, a specialised copy is created for each modelling hypothesis and
//! receives the generated local variables and code blocks. Generation only
//! reads the specialised data.

use crate::code_block::{CodeBlock, CodeBlockId};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::Span;
use crate::hypothesis::ModellingHypothesis;
use crate::variable::{NormalizationFactor, Variable, VariableCategory};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Kinematic family of a behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviourType {
    /// Driven by the linearised strain, returns the Cauchy stress
    StrainBased,
    /// Driven by the deformation gradient
    FiniteStrain,
    /// User-declared gradients and thermodynamic forces
    General,
}

impl BehaviourType {
    pub fn description(self) -> &'static str {
        match self {
            Self::StrainBased => "strain-based",
            Self::FiniteStrain => "finite-strain",
            Self::General => "general",
        }
    }
}

/// Isotropic elastic stiffness built from two scalar variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StiffnessDefinition {
    pub young_modulus: String,
    pub poisson_ratio: String,
    pub span: Span,
}

/// Integration settings selected by keywords.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationAttributes {
    algorithm: Option<String>,
    epsilon: Option<f64>,
    minimal_time_step: Option<f64>,
    stress_error_normalization_factor: Option<NormalizationFactor>,
}

impl IntegrationAttributes {
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    pub fn epsilon(&self) -> Option<f64> {
        self.epsilon
    }

    pub fn minimal_time_step(&self) -> Option<f64> {
        self.minimal_time_step
    }

    pub fn stress_error_normalization_factor(&self) -> Option<&NormalizationFactor> {
        self.stress_error_normalization_factor.as_ref()
    }

    /// Records the algorithm name. Returns `false` when one was already set.
    pub fn set_algorithm(&mut self, name: impl Into<String>) -> bool {
        set_once(&mut self.algorithm, name.into())
    }

    /// Records the convergence tolerance. Returns `false` when already set.
    pub fn set_epsilon(&mut self, value: f64) -> bool {
        set_once(&mut self.epsilon, value)
    }

    /// Records the minimal sub-step. Returns `false` when already set.
    pub fn set_minimal_time_step(&mut self, value: f64) -> bool {
        set_once(&mut self.minimal_time_step, value)
    }

    /// Records the stress error scale. Returns `false` when already set.
    pub fn set_stress_error_normalization_factor(&mut self, value: NormalizationFactor) -> bool {
        set_once(&mut self.stress_error_normalization_factor, value)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Variables and code blocks, for one hypothesis or for all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviourData {
    variables: IndexMap<String, Variable>,
    code_blocks: IndexMap<CodeBlockId, CodeBlock>,
}

impl BehaviourData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable; names are unique across all categories.
    pub fn add_variable(&mut self, variable: Variable) -> CompileResult<()> {
        if let Some(existing) = self.variables.get(&variable.name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                variable.span,
                format!(
                    "'{}' is already declared as a {}",
                    variable.name,
                    existing.category.description()
                ),
            )
            .with_label(existing.span, "first declared here"));
        }
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Variables of one category in declaration order.
    pub fn variables_of(&self, category: VariableCategory) -> impl Iterator<Item = &Variable> {
        self.variables
            .values()
            .filter(move |v| v.category == category)
    }

    pub fn integration_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables_of(VariableCategory::IntegrationVariable)
    }

    pub fn gradients(&self) -> impl Iterator<Item = &Variable> {
        self.variables_of(VariableCategory::Gradient)
    }

    pub fn thermodynamic_forces(&self) -> impl Iterator<Item = &Variable> {
        self.variables_of(VariableCategory::ThermodynamicForce)
    }

    pub fn external_state_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables_of(VariableCategory::ExternalStateVariable)
    }

    /// Total number of scalar components of the integration variables.
    pub fn state_dimension(&self, hypothesis: ModellingHypothesis) -> usize {
        self.integration_variables()
            .map(|v| v.scalar_size(hypothesis))
            .sum()
    }

    /// Registers a code block; each slot may be filled once.
    pub fn add_code_block(&mut self, block: CodeBlock) -> CompileResult<()> {
        if let Some(existing) = self.code_blocks.get(&block.id) {
            return Err(CompileError::new(
                ErrorKind::DuplicateCodeBlock,
                block.span,
                format!("code block {} is already defined", block.id),
            )
            .with_label(existing.span, "first defined here"));
        }
        self.code_blocks.insert(block.id, block);
        Ok(())
    }

    pub fn code_block(&self, id: CodeBlockId) -> Option<&CodeBlock> {
        self.code_blocks.get(&id)
    }

    pub fn code_block_mut(&mut self, id: CodeBlockId) -> Option<&mut CodeBlock> {
        self.code_blocks.get_mut(&id)
    }

    pub fn has_code_block(&self, id: CodeBlockId) -> bool {
        self.code_blocks.contains_key(&id)
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.code_blocks.values()
    }
}

/// A behaviour under construction or ready for generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviourModel {
    pub name: Option<String>,
    pub material: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub behaviour_type: BehaviourType,
    pub attributes: IntegrationAttributes,
    pub stiffness: Option<StiffnessDefinition>,
    requested_hypotheses: IndexSet<ModellingHypothesis>,
    unspecialised: BehaviourData,
    specialised: IndexMap<ModellingHypothesis, BehaviourData>,
}

impl BehaviourModel {
    pub fn new(behaviour_type: BehaviourType) -> Self {
        Self {
            name: None,
            material: None,
            author: None,
            date: None,
            description: None,
            behaviour_type,
            attributes: IntegrationAttributes::default(),
            stiffness: None,
            requested_hypotheses: IndexSet::new(),
            unspecialised: BehaviourData::new(),
            specialised: IndexMap::new(),
        }
    }

    /// Class-like name used in generated code.
    pub fn class_name(&self) -> String {
        match (&self.material, &self.name) {
            (Some(material), Some(name)) => format!("{}_{}", material, name),
            (None, Some(name)) => name.clone(),
            _ => "Behaviour".to_string(),
        }
    }

    /// Adds a requested hypothesis. Returns `false` if it was already requested.
    pub fn request_hypothesis(&mut self, hypothesis: ModellingHypothesis) -> bool {
        self.requested_hypotheses.insert(hypothesis)
    }

    pub fn has_requested_hypotheses(&self) -> bool {
        !self.requested_hypotheses.is_empty()
    }

    /// Hypotheses the behaviour is generated for: the requested ones, or
    /// every supported hypothesis when none was requested.
    pub fn hypotheses(&self) -> Vec<ModellingHypothesis> {
        if self.requested_hypotheses.is_empty() {
            ModellingHypothesis::SUPPORTED.to_vec()
        } else {
            self.requested_hypotheses.iter().copied().collect()
        }
    }

    /// Hypothesis-independent data, filled while reading.
    pub fn data(&self) -> &BehaviourData {
        &self.unspecialised
    }

    pub fn data_mut(&mut self) -> &mut BehaviourData {
        &mut self.unspecialised
    }

    /// Data for one hypothesis; falls back to the shared data before
    /// specialisation.
    pub fn data_for(&self, hypothesis: ModellingHypothesis) -> &BehaviourData {
        self.specialised
            .get(&hypothesis)
            .unwrap_or(&self.unspecialised)
    }

    /// Stores the specialised data of a hypothesis.
    pub fn specialise(&mut self, hypothesis: ModellingHypothesis, data: BehaviourData) {
        self.specialised.insert(hypothesis, data);
    }

    pub fn is_specialised(&self, hypothesis: ModellingHypothesis) -> bool {
        self.specialised.contains_key(&hypothesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableType;

    fn scalar(name: &str, category: VariableCategory) -> Variable {
        Variable::new(name, "real", VariableType::Scalar, category, Span::zero(0))
    }

    #[test]
    fn test_attributes_set_once() {
        let mut attributes = IntegrationAttributes::default();
        assert!(attributes.set_epsilon(1e-8));
        assert!(!attributes.set_epsilon(1e-6));
        assert_eq!(attributes.epsilon(), Some(1e-8));
        assert!(attributes.set_algorithm("rk54"));
        assert!(!attributes.set_algorithm("euler"));
        assert_eq!(attributes.algorithm(), Some("rk54"));
        assert_eq!(attributes.minimal_time_step(), None);
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut data = BehaviourData::new();
        data.add_variable(scalar("p", VariableCategory::IntegrationVariable))
            .unwrap();
        let err = data
            .add_variable(scalar("p", VariableCategory::MaterialProperty))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName);
        assert!(err.message.contains("state variable"));
        assert_eq!(err.labels.len(), 1);
    }

    #[test]
    fn test_state_dimension() {
        let mut data = BehaviourData::new();
        data.add_variable(scalar("p", VariableCategory::IntegrationVariable))
            .unwrap();
        data.add_variable(
            Variable::new(
                "evp",
                "StrainStensor",
                VariableType::Stensor,
                VariableCategory::IntegrationVariable,
                Span::zero(0),
            )
            .with_array_size(3),
        )
        .unwrap();
        data.add_variable(scalar("E", VariableCategory::MaterialProperty))
            .unwrap();
        assert_eq!(data.state_dimension(ModellingHypothesis::Tridimensional), 19);
        assert_eq!(data.state_dimension(ModellingHypothesis::PlaneStrain), 13);
    }

    #[test]
    fn test_duplicate_code_block_rejected() {
        let mut data = BehaviourData::new();
        let block = CodeBlock::new(CodeBlockId::ComputeDerivative, "", vec![], Span::zero(0));
        data.add_code_block(block.clone()).unwrap();
        let err = data.add_code_block(block).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateCodeBlock);
    }

    #[test]
    fn test_default_hypotheses_and_specialisation() {
        let mut model = BehaviourModel::new(BehaviourType::StrainBased);
        assert_eq!(model.hypotheses(), ModellingHypothesis::SUPPORTED.to_vec());
        assert!(model.request_hypothesis(ModellingHypothesis::PlaneStrain));
        assert!(!model.request_hypothesis(ModellingHypothesis::PlaneStrain));
        assert_eq!(model.hypotheses(), vec![ModellingHypothesis::PlaneStrain]);

        model
            .data_mut()
            .add_variable(scalar("p", VariableCategory::IntegrationVariable))
            .unwrap();
        let mut specialised = model.data().clone();
        specialised
            .add_variable(scalar("dp", VariableCategory::LocalVariable))
            .unwrap();
        model.specialise(ModellingHypothesis::PlaneStrain, specialised);
        assert!(model.data_for(ModellingHypothesis::PlaneStrain).has_variable("dp"));
        assert!(!model.data().has_variable("dp"));
    }

    #[test]
    fn test_class_name() {
        let mut model = BehaviourModel::new(BehaviourType::General);
        assert_eq!(model.class_name(), "Behaviour");
        model.name = Some("Norton".into());
        model.material = Some("Steel".into());
        assert_eq!(model.class_name(), "Steel_Norton");
    }
}
