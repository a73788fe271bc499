//! Dense quantum state storage and evolution kernels
//!
//! This crate owns the statevector representation and everything that
//! touches raw amplitudes: the gate-application kernels behind the
//! [`StateBackend`] trait, and reduced-density-matrix / entropy routines.
//! All statistics and differentiation logic lives in the device crate.

pub mod apply;
pub mod density_matrix;
pub mod error;
pub mod state_vector;

pub use apply::{DenseBackend, StateBackend};
pub use density_matrix::{mutual_info, reduced_density_matrix, vn_entropy};
pub use error::{Result, StateError};
pub use state_vector::StateVector;
