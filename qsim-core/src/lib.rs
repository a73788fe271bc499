//! Core circuit structures for the qsim quantum device
//!
//! This crate defines the vocabulary the device and state crates share:
//! wire labelling, operations (gates, state preparations), observables
//! with their spectra, measurement requests, and executable tapes, plus
//! the small Hermitian linear algebra used for observable eigenvalues.

pub mod error;
pub mod linalg;
pub mod measurement;
pub mod observable;
pub mod operation;
pub mod wires;

pub use error::{CoreError, Result};
pub use measurement::{Measurement, MeasurementKind, Tape};
pub use observable::Observable;
pub use operation::Operation;
pub use wires::{WireLabel, Wires};
