//! Runtime errors

use thiserror::Error;

/// Interpreter result type
pub type Result<T> = std::result::Result<T, VmError>;

/// Errors of the interpreter itself: the routine asked for something the
/// frame cannot provide.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("shape mismatch in {operation}: {left} and {right}")]
    ShapeMismatch {
        operation: String,
        left: String,
        right: String,
    },

    #[error("{name} has {expected} components, got {actual}")]
    WrongLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("bad call to {function}: {message}")]
    BadCall { function: String, message: String },

    #[error("expected a {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("index {index} out of range for {name}")]
    IndexOutOfRange { name: String, index: usize },

    #[error("code block {0} is not part of the routine")]
    MissingBlock(&'static str),

    #[error("controller loop exceeded {0} iterations")]
    IterationLimit(usize),
}

/// Outcome of a failed integration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// The sub-step controller could not make progress
    #[error("integration diverged: {0}")]
    Divergence(String),

    /// A code block reported failure
    #[error("integration failed: {0}")]
    Failure(String),

    #[error(transparent)]
    Vm(#[from] VmError),
}

impl IntegrationError {
    pub fn is_divergence(&self) -> bool {
        matches!(self, IntegrationError::Divergence(_))
    }
}
