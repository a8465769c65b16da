// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! # Tensile
//!
//! Compiler for behaviour descriptions integrated with explicit Runge-Kutta
//! schemes.
//!
//! This crate is a facade that re-exports functionality from:
//! - `tensile-model` - behaviour model, diagnostics and source map
//! - `tensile-lexer` - tokenization
//! - `tensile-parser` - token stream, code-block parser and value readers
//! - `tensile-rk` - keyword dispatch, scheme catalogue and routine generation
//! - `tensile-vm` - interpreter for generated routines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tensile::{compile, format_errors, CompilerOptions, SourceMap};
//!
//! let mut sources = SourceMap::new();
//! sources.add_file("norton.mfront".into(), source_code);
//!
//! match compile(&sources, &CompilerOptions::default()) {
//!     Ok(behaviours) => { /* ... */ }
//!     Err(errors) => eprintln!("{}", format_errors(&errors, &sources)),
//! }
//! ```

pub use tensile_lexer as lexer;
pub use tensile_model as model;
pub use tensile_parser as parser;
pub use tensile_rk as rk;
pub use tensile_vm as vm;

pub use tensile_model::{CompileError, ErrorKind, ModellingHypothesis, SourceMap};
pub use tensile_rk::{Algorithm, CompilerOptions, IntegrationRoutine};
pub use tensile_vm::{integrate, Frame, IntegrationError};

pub mod compile;

pub use compile::{compile, compile_source, format_errors, CompiledBehaviour};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
