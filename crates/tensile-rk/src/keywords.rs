//! Keyword table.
//!
//! Maps every `@Keyword` (stored without the `@`) to what reading it means.
//! The table is built once and only looked up afterwards.

use crate::dsl::{self, BehaviourReader};
use indexmap::IndexMap;
use std::fmt;
use tensile_model::foundation::Span;
use tensile_model::{CodeBlockId, CompileResult, VariableCategory};
use tensile_parser::TokenStream;

/// Reads the arguments of a keyword; the keyword itself is already consumed
/// and `Span` locates it.
pub type StatementHandler =
    fn(&mut BehaviourReader<'_>, &mut TokenStream<'_>, Span) -> CompileResult<()>;

#[derive(Clone, Copy)]
pub enum KeywordHandler {
    /// Keyword-specific statement
    Statement(StatementHandler),
    /// Variable declaration into a category
    Declaration(VariableCategory),
    /// `@Keyword { ... }` code block
    CodeBlock(CodeBlockId),
    /// Recognised but meaningless for explicit schemes
    Disabled(&'static str),
}

impl fmt::Debug for KeywordHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordHandler::Statement(_) => f.write_str("Statement"),
            KeywordHandler::Declaration(category) => write!(f, "Declaration({:?})", category),
            KeywordHandler::CodeBlock(id) => write!(f, "CodeBlock({:?})", id),
            KeywordHandler::Disabled(reason) => write!(f, "Disabled({:?})", reason),
        }
    }
}

const NOT_EXPLICIT: &str = "only meaningful for implicit integration schemes";

#[derive(Debug, Clone)]
pub struct KeywordTable {
    handlers: IndexMap<&'static str, KeywordHandler>,
}

impl KeywordTable {
    pub fn new() -> Self {
        use KeywordHandler::*;

        let entries: [(&'static str, KeywordHandler); 39] = [
            ("DSL", Statement(dsl::read_dsl)),
            ("Behaviour", Statement(dsl::read_behaviour_name)),
            ("Material", Statement(dsl::read_material)),
            ("Author", Statement(dsl::read_author)),
            ("Date", Statement(dsl::read_date)),
            ("Description", Statement(dsl::read_description)),
            ("ModellingHypothesis", Statement(dsl::read_hypothesis)),
            ("ModellingHypotheses", Statement(dsl::read_hypotheses)),
            ("Algorithm", Statement(dsl::read_algorithm)),
            ("Epsilon", Statement(dsl::read_epsilon)),
            ("MinimalTimeStep", Statement(dsl::read_minimal_time_step)),
            (
                "StressErrorNormalizationFactor",
                Statement(dsl::read_stress_normalization),
            ),
            (
                "StressErrorNormalisationFactor",
                Statement(dsl::read_stress_normalization),
            ),
            ("ComputeStiffnessTensor", Statement(dsl::read_stiffness_tensor)),
            ("MaterialProperty", Declaration(VariableCategory::MaterialProperty)),
            ("Coef", Declaration(VariableCategory::MaterialProperty)),
            ("Parameter", Declaration(VariableCategory::Parameter)),
            ("StateVariable", Declaration(VariableCategory::IntegrationVariable)),
            ("StateVar", Declaration(VariableCategory::IntegrationVariable)),
            (
                "AuxiliaryStateVariable",
                Declaration(VariableCategory::AuxiliaryStateVariable),
            ),
            (
                "AuxiliaryStateVar",
                Declaration(VariableCategory::AuxiliaryStateVariable),
            ),
            (
                "ExternalStateVariable",
                Declaration(VariableCategory::ExternalStateVariable),
            ),
            (
                "ExternalStateVar",
                Declaration(VariableCategory::ExternalStateVariable),
            ),
            ("LocalVariable", Declaration(VariableCategory::LocalVariable)),
            ("StaticVariable", Declaration(VariableCategory::StaticVariable)),
            ("Gradient", Declaration(VariableCategory::Gradient)),
            ("ThermodynamicForce", Declaration(VariableCategory::ThermodynamicForce)),
            ("Flux", Declaration(VariableCategory::ThermodynamicForce)),
            ("Derivative", CodeBlock(CodeBlockId::ComputeDerivative)),
            (
                "ComputeThermodynamicForces",
                CodeBlock(CodeBlockId::ComputeThermodynamicForces),
            ),
            ("ComputeStress", CodeBlock(CodeBlockId::ComputeThermodynamicForces)),
            (
                "ComputeFinalThermodynamicForces",
                CodeBlock(CodeBlockId::ComputeFinalThermodynamicForces),
            ),
            (
                "ComputeFinalStress",
                CodeBlock(CodeBlockId::ComputeFinalThermodynamicForces),
            ),
            (
                "UpdateAuxiliaryStateVariables",
                CodeBlock(CodeBlockId::UpdateAuxiliaryStateVariables),
            ),
            (
                "UpdateAuxiliaryStateVars",
                CodeBlock(CodeBlockId::UpdateAuxiliaryStateVariables),
            ),
            (
                "InitLocalVariables",
                CodeBlock(CodeBlockId::AfterInitializeLocalVariables),
            ),
            (
                "InitializeLocalVariables",
                CodeBlock(CodeBlockId::AfterInitializeLocalVariables),
            ),
            ("Integrator", Disabled(NOT_EXPLICIT)),
            ("UsableInPurelyImplicitResolution", Disabled(NOT_EXPLICIT)),
        ];

        Self {
            handlers: entries.into_iter().collect(),
        }
    }

    /// Handler of `keyword`, given without its `@`.
    pub fn get(&self, keyword: &str) -> Option<KeywordHandler> {
        self.handlers.get(keyword).copied()
    }

    /// Registered keywords in registration order.
    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_handlers() {
        let table = KeywordTable::new();
        assert!(matches!(
            table.get("ComputeStress"),
            Some(KeywordHandler::CodeBlock(CodeBlockId::ComputeThermodynamicForces))
        ));
        assert!(matches!(
            table.get("Coef"),
            Some(KeywordHandler::Declaration(VariableCategory::MaterialProperty))
        ));
        assert!(matches!(
            table.get("InitLocalVariables"),
            Some(KeywordHandler::CodeBlock(CodeBlockId::AfterInitializeLocalVariables))
        ));
    }

    #[test]
    fn test_disabled_keywords() {
        let table = KeywordTable::new();
        for keyword in ["Integrator", "UsableInPurelyImplicitResolution"] {
            assert!(matches!(table.get(keyword), Some(KeywordHandler::Disabled(_))));
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = KeywordTable::new();
        assert!(table.get("Algorithm").is_some());
        assert!(table.get("@Algorithm").is_none());
        assert!(table.get("algorithm").is_none());
        assert_eq!(table.len(), 39);
        assert_eq!(table.keywords().next(), Some("DSL"));
    }
}
