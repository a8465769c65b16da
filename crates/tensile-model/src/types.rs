//! Variable types.
//!
//! Behaviour files name types the way the target library does (`stress`,
//! `StrainStensor`, ...). For integration purposes only the tensorial order
//! matters, captured by [`VariableType`].

use crate::hypothesis::ModellingHypothesis;
use serde::{Deserialize, Serialize};

/// Tensorial nature of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// Real number
    Scalar,
    /// Vector of the space dimension
    Vector,
    /// Symmetric second-order tensor
    Stensor,
    /// Non-symmetric second-order tensor
    Tensor,
    /// Fourth-order tensor mapping symmetric tensors to symmetric tensors
    StiffnessTensor,
}

const SCALAR_TYPES: &[&str] = &[
    "real",
    "stress",
    "strain",
    "strainrate",
    "temperature",
    "time",
    "frequency",
    "length",
    "energy",
    "energy_density",
    "massdensity",
    "thermalexpansion",
    "youngmodulus",
    "shearmodulus",
    "bulkmodulus",
    "pressure",
];

const STENSOR_TYPES: &[&str] = &[
    "Stensor",
    "StressStensor",
    "StrainStensor",
    "StrainRateStensor",
    "FrequencyStensor",
];

const TENSOR_TYPES: &[&str] = &["Tensor", "DeformationGradientTensor"];

impl VariableType {
    /// Resolves a type name as written in a behaviour file.
    pub fn from_type_name(name: &str) -> Option<Self> {
        if SCALAR_TYPES.contains(&name) {
            Some(Self::Scalar)
        } else if STENSOR_TYPES.contains(&name) {
            Some(Self::Stensor)
        } else if TENSOR_TYPES.contains(&name) {
            Some(Self::Tensor)
        } else if name == "TVector" {
            Some(Self::Vector)
        } else if name == "StiffnessTensor" {
            Some(Self::StiffnessTensor)
        } else {
            None
        }
    }

    /// Number of scalar components under a hypothesis.
    pub fn component_count(self, hypothesis: ModellingHypothesis) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector => hypothesis.space_dimension(),
            Self::Stensor => hypothesis.stensor_size(),
            Self::Tensor => hypothesis.tensor_size(),
            Self::StiffnessTensor => hypothesis.stensor_size() * hypothesis.stensor_size(),
        }
    }

    pub fn is_scalar(self) -> bool {
        self == Self::Scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(VariableType::from_type_name("stress"), Some(VariableType::Scalar));
        assert_eq!(
            VariableType::from_type_name("StrainStensor"),
            Some(VariableType::Stensor)
        );
        assert_eq!(
            VariableType::from_type_name("DeformationGradientTensor"),
            Some(VariableType::Tensor)
        );
        assert_eq!(VariableType::from_type_name("float"), None);
    }

    #[test]
    fn test_component_counts() {
        let h = ModellingHypothesis::PlaneStrain;
        assert_eq!(VariableType::Scalar.component_count(h), 1);
        assert_eq!(VariableType::Vector.component_count(h), 2);
        assert_eq!(VariableType::Stensor.component_count(h), 4);
        assert_eq!(VariableType::Tensor.component_count(h), 5);
        assert_eq!(VariableType::StiffnessTensor.component_count(h), 16);
    }
}
