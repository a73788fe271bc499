//! Dense statevector storage
//!
//! Amplitudes are stored flat, indexed by computational basis state with
//! the first wire as the most significant bit: for three wires, index 4 is
//! `|100>`, i.e. wire 0 in state 1.

use crate::error::{Result, StateError};
use num_complex::Complex64;
use std::fmt;

/// A dense complex statevector over `num_qubits` wires
#[derive(Clone, PartialEq)]
pub struct StateVector {
    amplitudes: Vec<Complex64>,
    num_qubits: usize,
}

impl StateVector {
    /// Create the |0...0> state
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Create a computational basis state from its index
    pub fn basis_state(num_qubits: usize, index: usize) -> Result<Self> {
        let dimension = 1usize << num_qubits;
        if index >= dimension {
            return Err(StateError::InvalidBasisState { index, dimension });
        }
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); dimension];
        amplitudes[index] = Complex64::new(1.0, 0.0);
        Ok(Self {
            amplitudes,
            num_qubits,
        })
    }

    /// Create a state from amplitude data
    ///
    /// # Errors
    /// Returns an error if `amplitudes` does not have length `2^num_qubits`.
    pub fn from_amplitudes(num_qubits: usize, amplitudes: &[Complex64]) -> Result<Self> {
        let dimension = 1usize << num_qubits;
        if amplitudes.len() != dimension {
            return Err(StateError::DimensionMismatch {
                expected: dimension,
                actual: amplitudes.len(),
            });
        }
        Ok(Self {
            amplitudes: amplitudes.to_vec(),
            num_qubits,
        })
    }

    /// Number of qubits
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// State dimension (2^num_qubits)
    #[inline]
    pub fn dimension(&self) -> usize {
        self.amplitudes.len()
    }

    /// The amplitudes, basis-index order
    #[inline]
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Mutable access to the amplitudes
    #[inline]
    pub fn amplitudes_mut(&mut self) -> &mut [Complex64] {
        &mut self.amplitudes
    }

    /// The norm of the state
    pub fn norm(&self) -> f64 {
        self.amplitudes
            .iter()
            .map(|a| a.norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    /// Whether the state is normalized within `tolerance`
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.norm() - 1.0).abs() < tolerance
    }

    /// Probability of each basis state
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    /// The inner product `<self|other>`
    pub fn overlap(&self, other: &StateVector) -> Complex64 {
        self.amplitudes
            .iter()
            .zip(other.amplitudes.iter())
            .map(|(a, b)| a.conj() * b)
            .sum()
    }
}

impl fmt::Debug for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StateVector {{ qubits: {}, dim: {}, norm: {:.6} }}",
            self.num_qubits,
            self.dimension(),
            self.norm()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_is_zero_state() {
        let state = StateVector::new(2);
        assert_eq!(state.dimension(), 4);
        assert_relative_eq!(state.amplitudes()[0].re, 1.0);
        assert!(state.is_normalized(1e-12));
    }

    #[test]
    fn test_basis_state_index_convention() {
        // First wire is the most significant bit: |10> has index 2.
        let state = StateVector::basis_state(2, 2).unwrap();
        assert_relative_eq!(state.probabilities()[2], 1.0);
    }

    #[test]
    fn test_basis_state_out_of_range() {
        assert!(matches!(
            StateVector::basis_state(1, 2),
            Err(StateError::InvalidBasisState { .. })
        ));
    }

    #[test]
    fn test_from_amplitudes_length_check() {
        let amps = vec![Complex64::new(1.0, 0.0); 3];
        assert!(matches!(
            StateVector::from_amplitudes(2, &amps),
            Err(StateError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_overlap_conjugates_left() {
        let a = StateVector::from_amplitudes(
            1,
            &[Complex64::new(0.0, 1.0), Complex64::new(0.0, 0.0)],
        )
        .unwrap();
        let b = StateVector::new(1);
        let overlap = a.overlap(&b);
        assert_relative_eq!(overlap.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(overlap.im, -1.0, epsilon = 1e-12);
    }
}
