//! Modelling hypotheses.
//!
//! A behaviour is instantiated once per modelling hypothesis; the hypothesis
//! fixes the space dimension and therefore the number of components of every
//! tensorial variable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geometric/kinematic setting under which a behaviour is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModellingHypothesis {
    AxisymmetricalGeneralisedPlaneStrain,
    AxisymmetricalGeneralisedPlaneStress,
    Axisymmetrical,
    PlaneStress,
    PlaneStrain,
    GeneralisedPlaneStrain,
    Tridimensional,
}

impl ModellingHypothesis {
    /// Every hypothesis, in canonical order.
    pub const ALL: [ModellingHypothesis; 7] = [
        Self::AxisymmetricalGeneralisedPlaneStrain,
        Self::AxisymmetricalGeneralisedPlaneStress,
        Self::Axisymmetrical,
        Self::PlaneStress,
        Self::PlaneStrain,
        Self::GeneralisedPlaneStrain,
        Self::Tridimensional,
    ];

    /// Hypotheses for which explicit integration routines can be generated.
    ///
    /// Plane stress variants need the axial strain as an extra unknown, which
    /// explicit schemes do not provide.
    pub const SUPPORTED: [ModellingHypothesis; 5] = [
        Self::AxisymmetricalGeneralisedPlaneStrain,
        Self::Axisymmetrical,
        Self::PlaneStrain,
        Self::GeneralisedPlaneStrain,
        Self::Tridimensional,
    ];

    /// Name as written in behaviour files.
    pub fn name(self) -> &'static str {
        match self {
            Self::AxisymmetricalGeneralisedPlaneStrain => "AxisymmetricalGeneralisedPlaneStrain",
            Self::AxisymmetricalGeneralisedPlaneStress => "AxisymmetricalGeneralisedPlaneStress",
            Self::Axisymmetrical => "Axisymmetrical",
            Self::PlaneStress => "PlaneStress",
            Self::PlaneStrain => "PlaneStrain",
            Self::GeneralisedPlaneStrain => "GeneralisedPlaneStrain",
            Self::Tridimensional => "Tridimensional",
        }
    }

    /// Space dimension (1, 2 or 3).
    pub fn space_dimension(self) -> usize {
        match self {
            Self::AxisymmetricalGeneralisedPlaneStrain
            | Self::AxisymmetricalGeneralisedPlaneStress => 1,
            Self::Axisymmetrical
            | Self::PlaneStress
            | Self::PlaneStrain
            | Self::GeneralisedPlaneStrain => 2,
            Self::Tridimensional => 3,
        }
    }

    /// Number of components of a symmetric second-order tensor.
    pub fn stensor_size(self) -> usize {
        match self.space_dimension() {
            1 => 3,
            2 => 4,
            _ => 6,
        }
    }

    /// Number of components of a non-symmetric second-order tensor.
    pub fn tensor_size(self) -> usize {
        match self.space_dimension() {
            1 => 3,
            2 => 5,
            _ => 9,
        }
    }

    /// True when explicit integration routines can be generated.
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

impl fmt::Display for ModellingHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModellingHypothesis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| format!("unknown modelling hypothesis '{}'", s))
    }
}
