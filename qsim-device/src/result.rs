//! Measurement and execution results
//!
//! Measurement values are heterogeneous: expectation values are scalars,
//! samples are vectors or bit matrices, probabilities are distributions,
//! and state access returns the raw amplitudes or a reduced density
//! matrix. Shot vectors additionally batch results row by row.

use num_complex::Complex64;

/// Probability output, flat or split into shot bins
#[derive(Debug, Clone, PartialEq)]
pub enum ProbResult {
    Vector(Vec<f64>),
    Binned(Vec<Vec<f64>>),
}

impl ProbResult {
    /// The flat distribution, or `None` when the result is binned
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            ProbResult::Vector(probs) => Some(probs),
            ProbResult::Binned(_) => None,
        }
    }
}

/// The value produced by a single measurement
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValue {
    /// Expectation value, variance, entropy, or mutual information
    Scalar(f64),
    /// Eigenvalue samples, or per-bin scalars under a shot vector
    Vector(Vec<f64>),
    /// Raw bit samples (one row per shot) or binned sample rows
    Matrix(Vec<Vec<f64>>),
    /// Probability distribution
    Probabilities(ProbResult),
    /// The full state vector
    State(Vec<Complex64>),
    /// Reduced density matrix over a wire subset, row-major
    DensityMatrix {
        matrix: Vec<Complex64>,
        dim: usize,
    },
}

impl MeasurementValue {
    /// The scalar payload, or `None` for non-scalar values
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MeasurementValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The probability payload, or `None` for other values
    pub fn as_probabilities(&self) -> Option<&ProbResult> {
        match self {
            MeasurementValue::Probabilities(probs) => Some(probs),
            _ => None,
        }
    }
}

/// The result of executing a tape
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// One value per measurement
    Single(Vec<MeasurementValue>),
    /// One row of values per shot-vector copy
    Batched(Vec<Vec<MeasurementValue>>),
}

impl ExecutionResult {
    pub fn as_single(&self) -> Option<&[MeasurementValue]> {
        match self {
            ExecutionResult::Single(values) => Some(values),
            ExecutionResult::Batched(_) => None,
        }
    }

    pub fn as_batched(&self) -> Option<&[Vec<MeasurementValue>]> {
        match self {
            ExecutionResult::Batched(rows) => Some(rows),
            ExecutionResult::Single(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessor() {
        assert_eq!(MeasurementValue::Scalar(0.5).as_scalar(), Some(0.5));
        assert_eq!(MeasurementValue::Vector(vec![1.0]).as_scalar(), None);
    }

    #[test]
    fn test_probability_accessors() {
        let value =
            MeasurementValue::Probabilities(ProbResult::Vector(vec![0.5, 0.5]));
        let probs = value.as_probabilities().unwrap();
        assert_eq!(probs.as_vector(), Some(&[0.5, 0.5][..]));

        let binned = ProbResult::Binned(vec![vec![1.0, 0.0]]);
        assert_eq!(binned.as_vector(), None);
    }
}
