// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Tensile VM - interpreter for generated integration routines
//!
//! Executes an [`IntegrationRoutine`](tensile_rk::IntegrationRoutine) over a
//! [`Frame`] holding every slot of the routine. The caller fills the inputs
//! and the begin-of-step state, calls [`integrate`], and reads the
//! end-of-step state and thermodynamic forces back from the frame.

pub mod error;
pub mod exec;
pub mod frame;
pub mod value;

pub use error::{IntegrationError, VmError};
pub use exec::{integrate, MAX_ITERATIONS};
pub use frame::Frame;
pub use value::Value;
