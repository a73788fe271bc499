//! Statistics extraction and adjoint differentiation for qubit devices
//!
//! This crate turns a simulated statevector into measurement results. A
//! [`QubitDevice`] executes a tape over a [`StateBackend`], rotates into
//! the measurement basis, optionally draws computational-basis samples,
//! and computes expectation values, variances, samples, probabilities,
//! reduced states, and entropies. The adjoint differentiation walk
//! computes exact gradients of expectation values in a single backward
//! pass over the circuit.
//!
//! [`StateBackend`]: qsim_state::StateBackend

pub mod adjoint;
pub mod basis;
pub mod device;
pub mod error;
pub mod result;
pub mod sampling;
pub mod shots;

pub use adjoint::Jacobian;
pub use device::{DeviceConfig, QubitDevice};
pub use error::{DeviceError, Result};
pub use result::{ExecutionResult, MeasurementValue, ProbResult};
pub use sampling::SampleBuffer;
pub use shots::{ShotBatch, Shots};
