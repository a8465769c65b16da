//! Behaviour variables.

use crate::foundation::Span;
use crate::hypothesis::ModellingHypothesis;
use crate::types::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a variable in the behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableCategory {
    /// Driving variable (strain, deformation gradient, ...)
    Gradient,
    /// Conjugate of a gradient (stress, ...)
    ThermodynamicForce,
    /// State variable integrated over the time step
    IntegrationVariable,
    /// State variable updated explicitly after each accepted sub-step
    AuxiliaryStateVariable,
    /// Variable whose evolution is imposed by the caller (temperature, ...)
    ExternalStateVariable,
    MaterialProperty,
    Parameter,
    StaticVariable,
    LocalVariable,
}

impl VariableCategory {
    /// Description used in diagnostics.
    pub fn description(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::ThermodynamicForce => "thermodynamic force",
            Self::IntegrationVariable => "state variable",
            Self::AuxiliaryStateVariable => "auxiliary state variable",
            Self::ExternalStateVariable => "external state variable",
            Self::MaterialProperty => "material property",
            Self::Parameter => "parameter",
            Self::StaticVariable => "static variable",
            Self::LocalVariable => "local variable",
        }
    }

    /// True for variables whose value is known over the whole step and is
    /// interpolated at intermediate stages.
    pub fn is_driving(self) -> bool {
        matches!(self, Self::Gradient | Self::ExternalStateVariable)
    }
}

/// How the end-of-step value of a driving variable is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Evolution {
    /// Begin value `x` and increment `dx` are known.
    IncrementKnown,
    /// Begin value `x0` and end value `x1` are known.
    BeginEnd,
}

/// Scale dividing a state variable's error estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormalizationFactor {
    /// Non-negative literal
    Literal(f64),
    /// Name of a scalar variable (material property, parameter, ...)
    Variable(String),
}

impl fmt::Display for NormalizationFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::Variable(name) => f.write_str(name),
        }
    }
}

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Type name as written in the source
    pub type_name: String,
    pub var_type: VariableType,
    /// Number of array elements, at least 1
    pub array_size: usize,
    pub category: VariableCategory,
    /// Only meaningful for gradients and external state variables
    pub evolution: Evolution,
    pub error_normalization_factor: Option<NormalizationFactor>,
    /// Default values of parameters and static variables, one per component
    pub default_value: Option<Vec<f64>>,
    pub span: Span,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        var_type: VariableType,
        category: VariableCategory,
        span: Span,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            var_type,
            array_size: 1,
            category,
            evolution: Evolution::IncrementKnown,
            error_normalization_factor: None,
            default_value: None,
            span,
        }
    }

    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size.max(1);
        self
    }

    pub fn with_evolution(mut self, evolution: Evolution) -> Self {
        self.evolution = evolution;
        self
    }

    pub fn with_default(mut self, values: Vec<f64>) -> Self {
        self.default_value = Some(values);
        self
    }

    /// Scalar components of one array element.
    pub fn element_size(&self, hypothesis: ModellingHypothesis) -> usize {
        self.var_type.component_count(hypothesis)
    }

    /// Total scalar components (array size × element size).
    pub fn scalar_size(&self, hypothesis: ModellingHypothesis) -> usize {
        self.array_size * self.element_size(hypothesis)
    }

    /// True for a single real number.
    pub fn is_scalar(&self) -> bool {
        self.array_size == 1 && self.var_type.is_scalar()
    }

    /// Storage holding the begin-of-step value.
    pub fn begin_name(&self) -> String {
        match self.evolution {
            Evolution::IncrementKnown => self.name.clone(),
            Evolution::BeginEnd => format!("{}0", self.name),
        }
    }

    /// Storage holding the increment (`dx`) or the end value (`x1`).
    pub fn second_name(&self) -> String {
        match self.evolution {
            Evolution::IncrementKnown => increment_name(&self.name),
            Evolution::BeginEnd => format!("{}1", self.name),
        }
    }
}

/// Name of the increment of `name` over the time step (also the derivative
/// of a state variable).
pub fn increment_name(name: &str) -> String {
    format!("d{}", name)
}

/// Name of the current-value buffer of `name` during integration.
pub fn current_value_name(name: &str) -> String {
    format!("{}_", name)
}

/// Name of the stored `stage`-th (1-based) scaled derivative of `name`.
pub fn stage_buffer_name(name: &str, stage: usize) -> String {
    format!("d{}_K{}", name, stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strain() -> Variable {
        Variable::new(
            "eto",
            "StrainStensor",
            VariableType::Stensor,
            VariableCategory::Gradient,
            Span::zero(0),
        )
    }

    #[test]
    fn test_storage_names() {
        let eto = strain();
        assert_eq!(eto.begin_name(), "eto");
        assert_eq!(eto.second_name(), "deto");
        let f = Variable::new(
            "F",
            "DeformationGradientTensor",
            VariableType::Tensor,
            VariableCategory::Gradient,
            Span::zero(0),
        )
        .with_evolution(Evolution::BeginEnd);
        assert_eq!(f.begin_name(), "F0");
        assert_eq!(f.second_name(), "F1");
    }

    #[test]
    fn test_sizes() {
        let v = strain().with_array_size(2);
        assert_eq!(v.scalar_size(ModellingHypothesis::Tridimensional), 12);
        assert!(!v.is_scalar());
        assert_eq!(strain().with_array_size(0).array_size, 1);
    }

    #[test]
    fn test_generated_names() {
        assert_eq!(increment_name("p"), "dp");
        assert_eq!(current_value_name("p"), "p_");
        assert_eq!(stage_buffer_name("p", 3), "dp_K3");
    }
}
