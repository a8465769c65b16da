//! Runtime values and their arithmetic.
//!
//! Symmetric tensors are stored as `(xx, yy, zz, √2·xy, √2·xz, √2·yz)`,
//! truncated to the hypothesis' size, so that the contracted product of two
//! of them is the plain dot product of their components.

use crate::error::{Result, VmError};
use std::fmt;
use tensile_model::block::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Scalar(f64),
    /// Vector, symmetric or general tensor, or array of scalars
    Vector(Vec<f64>),
    /// Square matrix acting on vectors of `size` components, row major
    Matrix { size: usize, data: Vec<f64> },
}

impl Value {
    /// Zero value of `len` components; `matrix` makes it a square matrix.
    pub fn zeros(len: usize, matrix: bool) -> Value {
        if matrix {
            let size = (len as f64).sqrt().round() as usize;
            Value::Matrix {
                size,
                data: vec![0.0; len],
            }
        } else if len == 1 {
            Value::Scalar(0.0)
        } else {
            Value::Vector(vec![0.0; len])
        }
    }

    /// Numeric components; empty for booleans.
    pub fn components(&self) -> &[f64] {
        match self {
            Value::Bool(_) => &[],
            Value::Scalar(value) => std::slice::from_ref(value),
            Value::Vector(data) | Value::Matrix { data, .. } => data,
        }
    }

    pub fn components_mut(&mut self) -> &mut [f64] {
        match self {
            Value::Bool(_) => &mut [],
            Value::Scalar(value) => std::slice::from_mut(value),
            Value::Vector(data) | Value::Matrix { data, .. } => data,
        }
    }

    pub fn as_scalar(&self) -> Result<f64> {
        match self {
            Value::Scalar(value) => Ok(*value),
            other => Err(VmError::TypeMismatch {
                expected: "scalar",
                actual: other.kind(),
            }),
        }
    }

    /// Truth value of a condition; scalars are true when non-zero.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            Value::Scalar(value) => Ok(*value != 0.0),
            other => Err(VmError::TypeMismatch {
                expected: "condition",
                actual: other.kind(),
            }),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|value| value.is_finite())
    }

    /// Short description for diagnostics.
    pub fn kind(&self) -> String {
        match self {
            Value::Bool(_) => "bool".to_string(),
            Value::Scalar(_) => "scalar".to_string(),
            Value::Vector(data) => format!("vector of {}", data.len()),
            Value::Matrix { size, .. } => format!("{}x{} matrix", size, size),
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(value) => Value::Scalar(f(value)),
            Value::Vector(data) => Value::Vector(data.into_iter().map(f).collect()),
            Value::Matrix { size, data } => Value::Matrix {
                size,
                data: data.into_iter().map(f).collect(),
            },
            Value::Bool(value) => Value::Bool(value),
        }
    }

    /// Applies `f` to every component; booleans are rejected.
    pub fn elementwise(self, function: &str, f: impl Fn(f64) -> f64) -> Result<Value> {
        if let Value::Bool(_) = self {
            return Err(VmError::BadCall {
                function: function.to_string(),
                message: "expected a number".to_string(),
            });
        }
        Ok(self.map(f))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{}", value),
            Value::Scalar(value) => write!(f, "{}", value),
            Value::Vector(data) | Value::Matrix { data, .. } => {
                f.write_str("[")?;
                for (idx, value) in data.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            }
        }
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> VmError {
    VmError::ShapeMismatch {
        operation: op.symbol().to_string(),
        left: left.kind(),
        right: right.kind(),
    }
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => a / b,
    }
}

fn zip(op: BinaryOp, left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter()
        .zip(right)
        .map(|(a, b)| arithmetic(op, *a, *b))
        .collect()
}

fn matrix_vector(size: usize, matrix: &[f64], vector: &[f64]) -> Vec<f64> {
    matrix
        .chunks(size)
        .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
        .collect()
}

fn compare(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

/// Evaluates `left op right`.
///
/// Sums need equal shapes, products and quotients accept a scalar on
/// either side (quotients only on the right), and a matrix times a vector
/// is the contracted product.
pub fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    use Value::*;

    match op {
        BinaryOp::And | BinaryOp::Or => {
            let (a, b) = (left.as_bool()?, right.as_bool()?);
            Ok(Bool(if op == BinaryOp::And { a && b } else { a || b }))
        }
        BinaryOp::Eq | BinaryOp::Ne => match (&left, &right) {
            (Bool(a), Bool(b)) => Ok(Bool((a == b) == (op == BinaryOp::Eq))),
            (Scalar(a), Scalar(b)) => Ok(Bool(compare(op, *a, *b))),
            _ => Err(mismatch(op, &left, &right)),
        },
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match (&left, &right) {
            (Scalar(a), Scalar(b)) => Ok(Bool(compare(op, *a, *b))),
            _ => Err(mismatch(op, &left, &right)),
        },
        BinaryOp::Add | BinaryOp::Sub => match (&left, &right) {
            (Scalar(a), Scalar(b)) => Ok(Scalar(arithmetic(op, *a, *b))),
            (Vector(a), Vector(b)) if a.len() == b.len() => Ok(Vector(zip(op, a, b))),
            (Matrix { size, data: a }, Matrix { size: other, data: b }) if size == other => {
                Ok(Matrix {
                    size: *size,
                    data: zip(op, a, b),
                })
            }
            _ => Err(mismatch(op, &left, &right)),
        },
        BinaryOp::Mul => match (&left, &right) {
            (Scalar(a), _) if !matches!(right, Bool(_)) => Ok(right.clone().map(|b| a * b)),
            (_, Scalar(b)) if !matches!(left, Bool(_)) => Ok(left.clone().map(|a| a * b)),
            (Matrix { size, data }, Vector(vector)) if vector.len() == *size => {
                Ok(Vector(matrix_vector(*size, data, vector)))
            }
            _ => Err(mismatch(op, &left, &right)),
        },
        BinaryOp::Div => match (&left, &right) {
            (Bool(_), _) => Err(mismatch(op, &left, &right)),
            (_, Scalar(b)) => Ok(left.clone().map(|a| a / b)),
            _ => Err(mismatch(op, &left, &right)),
        },
    }
}

pub fn unary(op: UnaryOp, operand: Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.as_bool()?)),
        UnaryOp::Neg => operand.elementwise("-", |value| -value),
    }
}

/// Sum of the diagonal components.
pub fn trace(value: &Value) -> f64 {
    match value {
        Value::Matrix { size, data } => (0..*size).map(|i| data[i * size + i]).sum(),
        other => other.components().iter().take(3).sum(),
    }
}

/// Deviatoric part of a symmetric tensor.
pub fn deviator(value: Value) -> Result<Value> {
    match value {
        Value::Vector(mut data) => {
            let mean = data.iter().take(3).sum::<f64>() / 3.0;
            for component in data.iter_mut().take(3) {
                *component -= mean;
            }
            Ok(Value::Vector(data))
        }
        other => Err(VmError::BadCall {
            function: "deviator".to_string(),
            message: format!("expected a symmetric tensor, got {}", other.kind()),
        }),
    }
}

/// Von Mises equivalent stress: `sqrt(3/2 s:s)` of the deviator `s`.
pub fn sigmaeq(value: &Value) -> Result<f64> {
    match value {
        Value::Scalar(value) => Ok(value.abs()),
        Value::Vector(_) => {
            let deviatoric = deviator(value.clone())?;
            let squares: f64 = deviatoric.components().iter().map(|v| v * v).sum();
            Ok((1.5 * squares).sqrt())
        }
        other => Err(VmError::BadCall {
            function: "sigmaeq".to_string(),
            message: format!("expected a symmetric tensor, got {}", other.kind()),
        }),
    }
}

/// Euclidean norm of the components.
pub fn norm(value: &Value) -> f64 {
    value
        .components()
        .iter()
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

/// Identity symmetric tensor of `size` components.
pub fn identity(size: usize) -> Value {
    Value::Vector((0..size).map(|i| if i < 3 { 1.0 } else { 0.0 }).collect())
}

/// Isotropic elastic stiffness `λ I⊗I + 2μ I` acting on symmetric tensors
/// of `size` components.
pub fn isotropic_stiffness(size: usize, young: f64, nu: f64) -> Value {
    let lambda = young * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let mu = young / (2.0 * (1.0 + nu));
    let mut data = vec![0.0; size * size];
    for i in 0..size {
        for j in 0..size {
            if i < 3 && j < 3 {
                data[i * size + j] = lambda;
            }
        }
        data[i * size + i] += 2.0 * mu;
    }
    Value::Matrix { size, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stiffness_times_strain() {
        let young = 200.0e3;
        let nu = 0.3;
        let d = isotropic_stiffness(6, young, nu);
        let strain = Value::Vector(vec![1.0e-3, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let stress = binary(BinaryOp::Mul, d, strain).unwrap();
        let components = stress.components();
        let lambda = young * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = young / (2.0 * (1.0 + nu));
        assert!((components[0] - (lambda + 2.0 * mu) * 1.0e-3).abs() < 1e-9);
        assert!((components[1] - lambda * 1.0e-3).abs() < 1e-9);
        assert_eq!(components[3], 0.0);
    }

    #[test]
    fn test_uniaxial_equivalent_stress() {
        let stress = Value::Vector(vec![150.0, 0.0, 0.0, 0.0]);
        assert!((sigmaeq(&stress).unwrap() - 150.0).abs() < 1e-12);
        // pure shear in the √2 storage
        let shear = Value::Vector(vec![0.0, 0.0, 0.0, 2.0_f64.sqrt() * 10.0]);
        assert!((sigmaeq(&shear).unwrap() - 3.0_f64.sqrt() * 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_deviator_is_traceless() {
        let dev = deviator(Value::Vector(vec![3.0, 1.0, 2.0, 5.0, 0.0, 0.0])).unwrap();
        assert!(trace(&dev).abs() < 1e-15);
        assert_eq!(dev.components()[3], 5.0);
    }

    #[test]
    fn test_shape_rules() {
        let v = Value::Vector(vec![1.0, 2.0]);
        assert_eq!(
            binary(BinaryOp::Mul, Value::Scalar(2.0), v.clone()).unwrap(),
            Value::Vector(vec![2.0, 4.0])
        );
        assert_eq!(
            binary(BinaryOp::Div, v.clone(), Value::Scalar(2.0)).unwrap(),
            Value::Vector(vec![0.5, 1.0])
        );
        assert!(matches!(
            binary(BinaryOp::Add, v.clone(), Value::Scalar(1.0)),
            Err(VmError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            binary(BinaryOp::Add, v, Value::Vector(vec![1.0])),
            Err(VmError::ShapeMismatch { .. })
        ));
        assert_eq!(
            binary(BinaryOp::Lt, Value::Scalar(1.0), Value::Scalar(2.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOp::Or, Value::Bool(false), Value::Scalar(1.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_zeros() {
        assert_eq!(Value::zeros(1, false), Value::Scalar(0.0));
        assert_eq!(Value::zeros(3, false), Value::Vector(vec![0.0; 3]));
        assert!(matches!(Value::zeros(16, true), Value::Matrix { size: 4, .. }));
    }
}
