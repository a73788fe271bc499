//! Reduced density matrices and entanglement measures
//!
//! These routines consume a pure statevector and trace out the wires a
//! caller is not interested in. Entropies are computed exactly from the
//! spectrum of the reduced matrix.

use crate::error::{Result, StateError};
use crate::state_vector::StateVector;
use num_complex::Complex64;
use qsim_core::linalg::eigvalsh;

const EIGENVALUE_CUTOFF: f64 = 1e-12;

/// Reduced density matrix of a pure state over the kept wires
///
/// # Arguments
/// * `state` - the pure state
/// * `keep` - device wire indices to keep; their order determines the
///   row/column bit order of the result (first kept wire most significant)
///
/// # Returns
/// Row-major `2^k x 2^k` matrix where `k = keep.len()`.
pub fn reduced_density_matrix(state: &StateVector, keep: &[usize]) -> Result<Vec<Complex64>> {
    let n = state.num_qubits();
    for &w in keep {
        if w >= n {
            return Err(StateError::InvalidQubitIndex {
                index: w,
                num_qubits: n,
            });
        }
    }

    let k = keep.len();
    let kept_shifts: Vec<usize> = keep.iter().map(|&w| n - 1 - w).collect();
    let env_shifts: Vec<usize> = (0..n)
        .filter(|w| !keep.contains(w))
        .map(|w| n - 1 - w)
        .collect();

    let sub_dim = 1usize << k;
    let env_dim = 1usize << env_shifts.len();
    let amps = state.amplitudes();
    let mut rho = vec![Complex64::new(0.0, 0.0); sub_dim * sub_dim];

    // Full index from a kept sub-index and an environment sub-index.
    let compose = |sub: usize, env: usize| -> usize {
        let mut idx = 0usize;
        for (j, &shift) in kept_shifts.iter().enumerate() {
            if (sub >> (k - 1 - j)) & 1 == 1 {
                idx |= 1 << shift;
            }
        }
        for (j, &shift) in env_shifts.iter().enumerate() {
            if (env >> (env_shifts.len() - 1 - j)) & 1 == 1 {
                idx |= 1 << shift;
            }
        }
        idx
    };

    for env in 0..env_dim {
        for i in 0..sub_dim {
            let a_i = amps[compose(i, env)];
            if a_i.norm_sqr() < f64::EPSILON * f64::EPSILON {
                continue;
            }
            for j in 0..sub_dim {
                rho[i * sub_dim + j] += a_i * amps[compose(j, env)].conj();
            }
        }
    }

    Ok(rho)
}

/// Von Neumann entropy of the reduced state over the given wires
///
/// Natural logarithm by default; pass `log_base` to rescale.
pub fn vn_entropy(state: &StateVector, wires: &[usize], log_base: Option<f64>) -> Result<f64> {
    let rho = reduced_density_matrix(state, wires)?;
    let dim = 1usize << wires.len();
    let eigenvalues =
        eigvalsh(&rho, dim).map_err(|_| StateError::InvalidMatrix {
            elements: rho.len(),
            wires: wires.len(),
        })?;

    let mut entropy = 0.0;
    for p in eigenvalues {
        if p > EIGENVALUE_CUTOFF {
            entropy -= p * p.ln();
        }
    }
    if let Some(base) = log_base {
        entropy /= base.ln();
    }
    Ok(entropy)
}

/// Mutual information `I(A, B) = S(A) + S(B) - S(AB)` between two wire
/// groups of a pure state
pub fn mutual_info(
    state: &StateVector,
    wires_a: &[usize],
    wires_b: &[usize],
    log_base: Option<f64>,
) -> Result<f64> {
    let mut joint: Vec<usize> = wires_a.to_vec();
    joint.extend_from_slice(wires_b);
    let s_a = vn_entropy(state, wires_a, log_base)?;
    let s_b = vn_entropy(state, wires_b, log_base)?;
    let s_ab = vn_entropy(state, &joint, log_base)?;
    Ok(s_a + s_b - s_ab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn bell_state() -> StateVector {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        StateVector::from_amplitudes(2, &[h, zero, zero, h]).unwrap()
    }

    #[test]
    fn test_reduced_density_matrix_of_product_state() {
        // |10>: tracing out wire 1 leaves |1><1| on wire 0.
        let state = StateVector::basis_state(2, 2).unwrap();
        let rho = reduced_density_matrix(&state, &[0]).unwrap();
        assert_relative_eq!(rho[0].re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rho[3].re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bell_state_marginal_is_maximally_mixed() {
        let rho = reduced_density_matrix(&bell_state(), &[0]).unwrap();
        assert_relative_eq!(rho[0].re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(rho[3].re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(rho[1].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bell_state_entropy() {
        let state = bell_state();
        let nats = vn_entropy(&state, &[0], None).unwrap();
        assert_relative_eq!(nats, std::f64::consts::LN_2, epsilon = 1e-9);

        let bits = vn_entropy(&state, &[0], Some(2.0)).unwrap();
        assert_relative_eq!(bits, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_product_state_entropy_is_zero() {
        let state = StateVector::new(2);
        let entropy = vn_entropy(&state, &[1], None).unwrap();
        assert_relative_eq!(entropy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bell_state_mutual_info() {
        let info = mutual_info(&bell_state(), &[0], &[1], None).unwrap();
        assert_relative_eq!(info, 2.0 * std::f64::consts::LN_2, epsilon = 1e-9);
    }

    #[test]
    fn test_mutual_info_of_product_state_is_zero() {
        let info = mutual_info(&StateVector::new(2), &[0], &[1], None).unwrap();
        assert_relative_eq!(info, 0.0, epsilon = 1e-9);
    }
}
