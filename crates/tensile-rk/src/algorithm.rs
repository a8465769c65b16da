//! Catalogue of explicit Runge-Kutta schemes.
//!
//! Every scheme is described by exact rational coefficients:
//!
//! | scheme     | stored derivatives | error estimate                  |
//! |------------|--------------------|---------------------------------|
//! | `euler`    | 0                  | none                            |
//! | `rk2`      | 1                  | none                            |
//! | `rk4`      | 4                  | none                            |
//! | `rk42`     | 4                  | third order, exponent 1/3       |
//! | `rk54`     | 6                  | Fehlberg 5(4), exponent 1/5     |
//! | `rkCastem` | 5                  | thermodynamic force residual    |
//!
//! Stage `i` (0-based) is evaluated at `t + c_i dt_` from the state estimate
//! `y + Σ_j a_ij K_j`, where `K_j = dt_ · dy` is the scaled derivative of stage
//! `j`. Schemes storing fewer derivatives than they evaluate use the last
//! stage's derivative directly in the final combination.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Exact rational coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational::new(0, 1);
    pub const ONE: Rational = Rational::new(1, 1);

    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    pub fn value(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    pub fn is_one(self) -> bool {
        self.num == self.den
    }

    fn reduced(num: i128, den: i128) -> Self {
        let divisor = gcd(num.abs(), den.abs()).max(1);
        let sign = if den < 0 { -1 } else { 1 };
        Self::new(
            (sign * num / divisor) as i64,
            (sign * den / divisor) as i64,
        )
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, other: Rational) -> Rational {
        Rational::reduced(
            self.num as i128 * other.den as i128 + other.num as i128 * self.den as i128,
            self.den as i128 * other.den as i128,
        )
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, other: Rational) -> Rational {
        self + Rational::new(-other.num, other.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

const fn r(num: i64, den: i64) -> Rational {
    Rational::new(num, den)
}

/// One derivative evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    /// Fraction `c` of the sub-step at which the stage is evaluated
    pub fraction: Rational,
    /// Weights `a_ij` of the previous stages in the state estimate
    pub weights: &'static [Rational],
}

/// How an embedded scheme estimates its local error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorEstimate {
    /// Fixed-step scheme
    None,
    /// `Σ e_i K_i` per state variable, corrector `(ε/error)^exponent`
    StateVector {
        weights: &'static [Rational],
        exponent: Rational,
    },
    /// Equivalent stress of the difference between the thermodynamic forces
    /// computed at the last stage and at the final combination
    ThermodynamicForces,
}

/// Scheme selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Euler,
    RungeKutta2,
    RungeKutta4,
    RungeKutta42,
    RungeKutta54,
    RungeKuttaCastem,
}

/// Immutable catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmDescriptor {
    pub algorithm: Algorithm,
    /// Name used by `@Algorithm`
    pub name: &'static str,
    pub title: &'static str,
    /// Number of stored scaled derivatives `K_i`
    pub derivative_buffers: usize,
    pub stages: &'static [Stage],
    /// Weights `b_i` of the final combination
    pub final_weights: &'static [Rational],
    pub error: ErrorEstimate,
}

impl AlgorithmDescriptor {
    /// True for schemes with an error estimate and an adaptive sub-step loop.
    pub fn is_embedded(&self) -> bool {
        !matches!(self.error, ErrorEstimate::None)
    }

    /// True when stage `index` stores its scaled derivative.
    pub fn stores_stage(&self, index: usize) -> bool {
        index < self.derivative_buffers
    }
}

const EULER_STAGES: &[Stage] = &[Stage {
    fraction: Rational::ZERO,
    weights: &[],
}];

const RK2_STAGES: &[Stage] = &[
    Stage {
        fraction: Rational::ZERO,
        weights: &[],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[r(1, 2)],
    },
];

// Classical fourth order scheme, shared by rk4 and rk42.
const RK4_STAGES: &[Stage] = &[
    Stage {
        fraction: Rational::ZERO,
        weights: &[],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[r(1, 2)],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[Rational::ZERO, r(1, 2)],
    },
    Stage {
        fraction: Rational::ONE,
        weights: &[Rational::ZERO, Rational::ZERO, Rational::ONE],
    },
];

const RK4_WEIGHTS: &[Rational] = &[r(1, 6), r(1, 3), r(1, 3), r(1, 6)];

// Fehlberg 4(5) tableau, advancing with the fifth order solution.
const RK54_STAGES: &[Stage] = &[
    Stage {
        fraction: Rational::ZERO,
        weights: &[],
    },
    Stage {
        fraction: r(1, 4),
        weights: &[r(1, 4)],
    },
    Stage {
        fraction: r(3, 8),
        weights: &[r(3, 32), r(9, 32)],
    },
    Stage {
        fraction: r(12, 13),
        weights: &[r(1932, 2197), r(-7200, 2197), r(7296, 2197)],
    },
    Stage {
        fraction: Rational::ONE,
        weights: &[r(439, 216), r(-8, 1), r(3680, 513), r(-845, 4104)],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[r(-8, 27), r(2, 1), r(-3544, 2565), r(1859, 4104), r(-11, 40)],
    },
];

const RK54_WEIGHTS: &[Rational] = &[
    r(16, 135),
    Rational::ZERO,
    r(6656, 12825),
    r(28561, 56430),
    r(-9, 50),
    r(2, 55),
];

// Fifth order weights minus fourth order weights.
const RK54_ERROR_WEIGHTS: &[Rational] = &[
    r(1, 360),
    Rational::ZERO,
    r(-128, 4275),
    r(-2197, 75240),
    r(1, 50),
    r(2, 55),
];

const RK42_ERROR_WEIGHTS: &[Rational] = &[r(1, 6), r(-1, 6), r(-1, 6), r(1, 6)];

// Stage 5 is the third order estimate A, the final combination estimate B.
const CASTEM_STAGES: &[Stage] = &[
    Stage {
        fraction: Rational::ZERO,
        weights: &[],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[r(1, 2)],
    },
    Stage {
        fraction: r(1, 2),
        weights: &[r(1, 4), r(1, 4)],
    },
    Stage {
        fraction: Rational::ONE,
        weights: &[Rational::ZERO, r(-1, 1), r(2, 1)],
    },
    Stage {
        fraction: Rational::ONE,
        weights: &[r(1, 6), Rational::ZERO, r(2, 3), r(1, 6)],
    },
];

const CASTEM_WEIGHTS: &[Rational] = &[r(1, 6), Rational::ZERO, r(2, 3), Rational::ZERO, r(1, 6)];

/// The catalogue, in `@Algorithm` listing order.
pub const ALGORITHMS: [AlgorithmDescriptor; 6] = [
    AlgorithmDescriptor {
        algorithm: Algorithm::Euler,
        name: "euler",
        title: "forward Euler",
        derivative_buffers: 0,
        stages: EULER_STAGES,
        final_weights: &[Rational::ONE],
        error: ErrorEstimate::None,
    },
    AlgorithmDescriptor {
        algorithm: Algorithm::RungeKutta2,
        name: "rk2",
        title: "Runge-Kutta 2 (midpoint)",
        derivative_buffers: 1,
        stages: RK2_STAGES,
        final_weights: &[Rational::ZERO, Rational::ONE],
        error: ErrorEstimate::None,
    },
    AlgorithmDescriptor {
        algorithm: Algorithm::RungeKutta4,
        name: "rk4",
        title: "classical Runge-Kutta 4",
        derivative_buffers: 4,
        stages: RK4_STAGES,
        final_weights: RK4_WEIGHTS,
        error: ErrorEstimate::None,
    },
    AlgorithmDescriptor {
        algorithm: Algorithm::RungeKutta42,
        name: "rk42",
        title: "embedded Runge-Kutta 4/2",
        derivative_buffers: 4,
        stages: RK4_STAGES,
        final_weights: RK4_WEIGHTS,
        error: ErrorEstimate::StateVector {
            weights: RK42_ERROR_WEIGHTS,
            exponent: r(1, 3),
        },
    },
    AlgorithmDescriptor {
        algorithm: Algorithm::RungeKutta54,
        name: "rk54",
        title: "embedded Runge-Kutta 5/4 (Fehlberg)",
        derivative_buffers: 6,
        stages: RK54_STAGES,
        final_weights: RK54_WEIGHTS,
        error: ErrorEstimate::StateVector {
            weights: RK54_ERROR_WEIGHTS,
            exponent: r(1, 5),
        },
    },
    AlgorithmDescriptor {
        algorithm: Algorithm::RungeKuttaCastem,
        name: "rkCastem",
        title: "Cast3M embedded Runge-Kutta",
        derivative_buffers: 5,
        stages: CASTEM_STAGES,
        final_weights: CASTEM_WEIGHTS,
        error: ErrorEstimate::ThermodynamicForces,
    },
];

/// Names accepted by `@Algorithm`.
pub const VALID_ALGORITHMS: [&str; 6] = ["euler", "rk2", "rk4", "rk42", "rk54", "rkCastem"];

impl Algorithm {
    /// Looks up an `@Algorithm` name.
    pub fn from_name(name: &str) -> Option<Algorithm> {
        ALGORITHMS
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.algorithm)
    }

    pub fn descriptor(self) -> &'static AlgorithmDescriptor {
        match self {
            Algorithm::Euler => &ALGORITHMS[0],
            Algorithm::RungeKutta2 => &ALGORITHMS[1],
            Algorithm::RungeKutta4 => &ALGORITHMS[2],
            Algorithm::RungeKutta42 => &ALGORITHMS[3],
            Algorithm::RungeKutta54 => &ALGORITHMS[4],
            Algorithm::RungeKuttaCastem => &ALGORITHMS[5],
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(weights: &[Rational]) -> Rational {
        weights.iter().fold(Rational::ZERO, |acc, w| acc + *w)
    }

    #[test]
    fn test_final_weights_sum_to_one() {
        for descriptor in &ALGORITHMS {
            assert_eq!(
                sum(descriptor.final_weights),
                Rational::ONE,
                "{} is not consistent",
                descriptor.name
            );
        }
    }

    #[test]
    fn test_stage_rows_sum_to_fraction() {
        for descriptor in &ALGORITHMS {
            for (index, stage) in descriptor.stages.iter().enumerate() {
                assert_eq!(stage.weights.len(), index, "{} stage {}", descriptor.name, index);
                assert_eq!(
                    sum(stage.weights),
                    sum(&[stage.fraction]),
                    "{} stage {}",
                    descriptor.name,
                    index
                );
            }
        }
    }

    #[test]
    fn test_error_weights_sum_to_zero() {
        for descriptor in &ALGORITHMS {
            if let ErrorEstimate::StateVector { weights, .. } = descriptor.error {
                assert_eq!(weights.len(), descriptor.stages.len());
                assert!(sum(weights).is_zero(), "{}", descriptor.name);
            }
        }
    }

    #[test]
    fn test_buffer_counts() {
        let counts: Vec<usize> = ALGORITHMS.iter().map(|d| d.derivative_buffers).collect();
        assert_eq!(counts, vec![0, 1, 4, 4, 6, 5]);
        for descriptor in &ALGORITHMS {
            assert_eq!(descriptor.final_weights.len(), descriptor.stages.len());
            // only the last stage may go unstored
            assert!(descriptor.stages.len() - descriptor.derivative_buffers <= 1);
        }
    }

    #[test]
    fn test_lookup() {
        for name in VALID_ALGORITHMS {
            let algorithm = Algorithm::from_name(name).unwrap();
            assert_eq!(algorithm.name(), name);
            assert_eq!(algorithm.descriptor().algorithm, algorithm);
        }
        assert_eq!(Algorithm::from_name("rk45"), None);
        assert_eq!(Algorithm::from_name("RK54"), None);
    }

    #[test]
    fn test_embedded_flags() {
        assert!(!Algorithm::Euler.descriptor().is_embedded());
        assert!(!Algorithm::RungeKutta4.descriptor().is_embedded());
        assert!(Algorithm::RungeKutta42.descriptor().is_embedded());
        assert!(Algorithm::RungeKuttaCastem.descriptor().is_embedded());
    }

    #[test]
    fn test_rational_arithmetic() {
        assert_eq!(r(1, 6) + r(1, 3), r(1, 2));
        assert_eq!(r(1, 2) - r(1, 2), Rational::ZERO);
        assert_eq!(r(2, -4) + Rational::ZERO, r(-1, 2));
        assert_eq!(r(1, 4).value(), 0.25);
        assert_eq!(r(3, 8).to_string(), "3/8");
    }
}
