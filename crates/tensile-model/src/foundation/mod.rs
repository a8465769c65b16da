//! Foundation types shared by every compiler stage.

pub mod span;

pub use span::{SourceFile, SourceMap, Span};
