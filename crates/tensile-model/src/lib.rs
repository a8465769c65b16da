// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Behaviour model for the tensile compiler.
//!
//! This crate holds the data every stage shares:
//!
//! - [`foundation`] - spans and the source map
//! - [`error`] - compile diagnostics and their formatter
//! - [`hypothesis`], [`types`], [`variable`] - what a variable is
//! - [`block`], [`code_block`] - user code blocks and their syntax tree
//! - [`behaviour`] - the behaviour model itself

pub mod behaviour;
pub mod block;
pub mod code_block;
pub mod error;
pub mod foundation;
pub mod hypothesis;
pub mod types;
pub mod variable;

pub use behaviour::{
    BehaviourData, BehaviourModel, BehaviourType, IntegrationAttributes, StiffnessDefinition,
};
pub use code_block::{CodeBlock, CodeBlockId};
pub use error::{CompileError, CompileResult, DiagnosticFormatter, ErrorKind, Severity};
pub use foundation::{SourceMap, Span};
pub use hypothesis::ModellingHypothesis;
pub use types::VariableType;
pub use variable::{Evolution, NormalizationFactor, Variable, VariableCategory};
