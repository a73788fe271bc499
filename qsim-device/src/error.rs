//! Error types for device statistics and differentiation

use qsim_core::error::CoreError;
use qsim_state::error::StateError;
use thiserror::Error;

/// Errors that can occur while computing statistics or gradients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// A shot-based statistic was requested without configured shots
    #[error(
        "The number of shots has to be explicitly set on the device \
         when using sample-based measurements"
    )]
    ShotsRequired,

    /// The observable lacks the eigenvalues needed for this statistic
    #[error("Cannot compute {statistic} of {observable}: eigenvalues are undefined")]
    EigenvaluesUndefined {
        statistic: &'static str,
        observable: String,
    },

    /// The measurement kind is not recognized by the dispatcher
    #[error("Unsupported measurement type specified for observable {observable}")]
    UnsupportedMeasurement { observable: String },

    /// Adjoint differentiation only supports expectation values
    #[error("Adjoint differentiation method does not support measurement {kind}")]
    UnsupportedGradientMeasurement { kind: String },

    /// Adjoint differentiation does not support composite observables
    #[error("Adjoint differentiation method does not support {observable} observables")]
    UnsupportedObservable { observable: String },

    /// A multi-parameter operation without a decomposition hit the adjoint walk
    #[error("The {operation} operation is not supported using the adjoint differentiation method")]
    UnsupportedAdjointOperation { operation: String },

    /// The state (or density matrix) cannot be returned
    #[error("State access failed: {reason}")]
    StateAccess { reason: String },

    /// Requested wires are not on the device
    #[error("Invalid wires: {reason}")]
    InvalidWires { reason: String },

    /// A state preparation appeared after gates already ran
    #[error("Operation {operation} cannot be used after other operations have already been applied")]
    LateStatePreparation { operation: String },

    /// A bin size of zero cannot partition the shot window
    #[error("The specified number of shots per bin has to be at least one")]
    InvalidBinSize,

    /// Basis enumeration capacity exceeded
    #[error("Basis-state indexing supports at most {max} wires, got {requested}")]
    CapacityExceeded { requested: usize, max: usize },

    /// Error from the core circuit structures
    #[error("Circuit error: {0}")]
    Core(#[from] CoreError),

    /// Error from the state kernels
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;
