//! Error types for state vector operations

use thiserror::Error;

/// Errors that can occur during state vector operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Invalid qubit index
    #[error("Invalid qubit index {index} for {num_qubits}-qubit state")]
    InvalidQubitIndex { index: usize, num_qubits: usize },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid basis state index
    #[error("Basis state {index} out of range for dimension {dimension}")]
    InvalidBasisState { index: usize, dimension: usize },

    /// Matrix shape does not match the wires it acts on
    #[error("Matrix of {elements} elements cannot act on {wires} wire(s)")]
    InvalidMatrix { elements: usize, wires: usize },

    /// Operation without a matrix representation reached a kernel
    #[error("Operation '{name}' has no matrix representation")]
    NonUnitaryOperation { name: String },

    /// Amplitude data does not describe a normalized state
    #[error("Sum of amplitudes-squared does not equal one (norm {norm})")]
    NotNormalized { norm: f64 },
}

/// Result type for state vector operations
pub type Result<T> = std::result::Result<T, StateError>;
