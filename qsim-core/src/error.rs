//! Error types for core circuit structures

use thiserror::Error;

/// Errors that can occur while constructing or querying circuit structures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A wire label appears more than once in a wire set
    #[error("Duplicate wire label '{label}' in wire set")]
    DuplicateWire { label: String },

    /// A wire label was not found in the reference wire set
    #[error("Wire label '{label}' not found on the device")]
    WireNotFound { label: String },

    /// The observable does not define eigenvalues
    #[error("Eigenvalues are undefined for observable '{observable}'")]
    EigenvaluesUndefined { observable: String },

    /// The observable does not define diagonalizing gates
    #[error("Diagonalizing gates are undefined for observable '{observable}'")]
    DiagonalizingGatesUndefined { observable: String },

    /// A matrix has the wrong shape for the wires it acts on
    #[error("Matrix of {elements} elements does not match {wires} wire(s)")]
    InvalidMatrix { elements: usize, wires: usize },

    /// An operation has no parameter derivative
    #[error("Operation '{operation}' has no parameter derivative")]
    DerivativeUndefined { operation: String },

    /// Eigendecomposition did not converge
    #[error("Jacobi eigendecomposition did not converge after {sweeps} sweeps")]
    EigendecompositionFailed { sweeps: usize },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
