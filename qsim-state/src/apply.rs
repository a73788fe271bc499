//! Gate-application kernels and the state backend interface
//!
//! The device crate drives state evolution through the [`StateBackend`]
//! trait so alternative dense implementations can be swapped in without
//! touching the statistics or differentiation code. [`DenseBackend`] is
//! the reference implementation over [`StateVector`].

use crate::error::{Result, StateError};
use crate::state_vector::StateVector;
use num_complex::Complex64;
use qsim_core::operation::Operation;

/// Capability set required of a state-evolution backend
///
/// Wires are device positional indices (already mapped from labels);
/// the first device wire is the most significant bit of the basis index.
pub trait StateBackend: Send + Sync {
    /// Apply a `2^k x 2^k` row-major matrix to the given wires
    ///
    /// The matrix need not be unitary: the adjoint differentiation walk
    /// also pushes gate-derivative matrices and observables through this
    /// kernel.
    fn apply_matrix(
        &self,
        state: &StateVector,
        matrix: &[Complex64],
        wires: &[usize],
    ) -> Result<StateVector>;

    /// Apply a gate operation to the given wires
    fn apply_operation(
        &self,
        state: &StateVector,
        operation: &Operation,
        wires: &[usize],
    ) -> Result<StateVector> {
        let matrix = operation
            .matrix()
            .ok_or_else(|| StateError::NonUnitaryOperation {
                name: operation.name().to_string(),
            })?;
        self.apply_matrix(state, &matrix, wires)
    }

    /// Probability of each computational basis state
    fn probabilities(&self, state: &StateVector) -> Vec<f64> {
        state.probabilities()
    }
}

/// Reference dense backend with a single-qubit fast path
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseBackend;

impl StateBackend for DenseBackend {
    fn apply_matrix(
        &self,
        state: &StateVector,
        matrix: &[Complex64],
        wires: &[usize],
    ) -> Result<StateVector> {
        let num_qubits = state.num_qubits();
        for &w in wires {
            if w >= num_qubits {
                return Err(StateError::InvalidQubitIndex {
                    index: w,
                    num_qubits,
                });
            }
        }
        let k = wires.len();
        let sub_dim = 1usize << k;
        if matrix.len() != sub_dim * sub_dim {
            return Err(StateError::InvalidMatrix {
                elements: matrix.len(),
                wires: k,
            });
        }

        if k == 1 {
            Ok(apply_single_qubit(state, matrix, wires[0]))
        } else {
            Ok(apply_multi_qubit(state, matrix, wires))
        }
    }
}

/// Single-qubit kernel: pairs of amplitudes differing in one bit
fn apply_single_qubit(state: &StateVector, matrix: &[Complex64], wire: usize) -> StateVector {
    let n = state.num_qubits();
    let stride = 1usize << (n - 1 - wire);
    let amps = state.amplitudes();
    let mut out = amps.to_vec();

    let mut base = 0;
    while base < amps.len() {
        for offset in 0..stride {
            let i0 = base + offset;
            let i1 = i0 + stride;
            let a0 = amps[i0];
            let a1 = amps[i1];
            out[i0] = matrix[0] * a0 + matrix[1] * a1;
            out[i1] = matrix[2] * a0 + matrix[3] * a1;
        }
        base += 2 * stride;
    }

    StateVector::from_amplitudes(n, &out).expect("dimension preserved")
}

/// General k-qubit kernel
///
/// For each assignment of the untouched wires, gathers the `2^k`
/// amplitudes addressed by the target wires (in the listed wire order,
/// first wire most significant) and multiplies by the matrix.
fn apply_multi_qubit(state: &StateVector, matrix: &[Complex64], wires: &[usize]) -> StateVector {
    let n = state.num_qubits();
    let k = wires.len();
    let sub_dim = 1usize << k;
    let amps = state.amplitudes();
    let mut out = vec![Complex64::new(0.0, 0.0); amps.len()];

    let shifts: Vec<usize> = wires.iter().map(|&w| n - 1 - w).collect();
    let target_mask: usize = shifts.iter().fold(0, |m, &s| m | (1 << s));

    let mut indices = vec![0usize; sub_dim];
    for base in 0..amps.len() {
        if base & target_mask != 0 {
            continue;
        }
        for (sub, slot) in indices.iter_mut().enumerate() {
            let mut idx = base;
            for (j, &shift) in shifts.iter().enumerate() {
                if (sub >> (k - 1 - j)) & 1 == 1 {
                    idx |= 1 << shift;
                }
            }
            *slot = idx;
        }
        for row in 0..sub_dim {
            let mut acc = Complex64::new(0.0, 0.0);
            for col in 0..sub_dim {
                acc += matrix[row * sub_dim + col] * amps[indices[col]];
            }
            out[indices[row]] = acc;
        }
    }

    StateVector::from_amplitudes(n, &out).expect("dimension preserved")
}
