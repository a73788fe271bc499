//! Observables and their spectra
//!
//! An observable is a named Hermitian operator over a wire tuple. The order
//! of the wires is semantically meaningful for tensor products: it encodes
//! the factor order, which is distinct from ascending wire order.

use crate::error::{CoreError, Result};
use crate::linalg::{conjugate_transpose, eigh, is_hermitian};
use crate::operation::Operation;
use crate::wires::WireLabel;
use num_complex::Complex64;
use std::f64::consts::FRAC_PI_4;

/// A Hermitian observable over one or more wires
#[derive(Debug, Clone, PartialEq)]
pub enum Observable {
    /// Pauli X
    PauliX { wire: WireLabel },
    /// Pauli Y
    PauliY { wire: WireLabel },
    /// Pauli Z
    PauliZ { wire: WireLabel },
    /// Hadamard observable (X + Z) / sqrt(2)
    Hadamard { wire: WireLabel },
    /// Identity
    Identity { wire: WireLabel },
    /// Arbitrary Hermitian matrix over the given wires
    Hermitian {
        matrix: Vec<Complex64>,
        wires: Vec<WireLabel>,
    },
    /// Projector onto a computational basis state of the given wires
    Projector {
        basis_state: Vec<u8>,
        wires: Vec<WireLabel>,
    },
    /// Tensor product of observables; factor order is preserved
    Tensor { factors: Vec<Observable> },
    /// Linear combination `sum_i coeffs[i] * terms[i]`
    ///
    /// Composite observables have no joint eigenvalue decomposition here;
    /// they exist so callers that cannot handle them reject them by name.
    Hamiltonian {
        coeffs: Vec<f64>,
        terms: Vec<Observable>,
    },
}

impl Observable {
    /// The observable name, e.g. `"PauliZ"`
    pub fn name(&self) -> &'static str {
        match self {
            Observable::PauliX { .. } => "PauliX",
            Observable::PauliY { .. } => "PauliY",
            Observable::PauliZ { .. } => "PauliZ",
            Observable::Hadamard { .. } => "Hadamard",
            Observable::Identity { .. } => "Identity",
            Observable::Hermitian { .. } => "Hermitian",
            Observable::Projector { .. } => "Projector",
            Observable::Tensor { .. } => "Tensor",
            Observable::Hamiltonian { .. } => "Hamiltonian",
        }
    }

    /// Validated Hermitian observable constructor
    pub fn hermitian(matrix: Vec<Complex64>, wires: Vec<WireLabel>) -> Result<Self> {
        let dim = 1usize << wires.len();
        if matrix.len() != dim * dim || !is_hermitian(&matrix, dim, 1e-10) {
            return Err(CoreError::InvalidMatrix {
                elements: matrix.len(),
                wires: wires.len(),
            });
        }
        Ok(Observable::Hermitian { matrix, wires })
    }

    /// The wires this observable acts on, in factor order
    pub fn wires(&self) -> Vec<WireLabel> {
        match self {
            Observable::PauliX { wire }
            | Observable::PauliY { wire }
            | Observable::PauliZ { wire }
            | Observable::Hadamard { wire }
            | Observable::Identity { wire } => vec![wire.clone()],
            Observable::Hermitian { wires, .. } | Observable::Projector { wires, .. } => {
                wires.clone()
            }
            Observable::Tensor { factors } => {
                factors.iter().flat_map(|f| f.wires()).collect()
            }
            Observable::Hamiltonian { terms, .. } => {
                // Union of term wires, first occurrence order.
                let mut wires = Vec::new();
                for term in terms {
                    for w in term.wires() {
                        if !wires.contains(&w) {
                            wires.push(w);
                        }
                    }
                }
                wires
            }
        }
    }

    /// Whether this is a single-wire observable with eigenvalues {+1, -1}
    ///
    /// These admit the direct `1 - 2*bit` transformation of raw samples.
    pub fn is_pauli_like(&self) -> bool {
        matches!(
            self,
            Observable::PauliX { .. }
                | Observable::PauliY { .. }
                | Observable::PauliZ { .. }
                | Observable::Hadamard { .. }
        )
    }

    /// The eigenvalues of the observable, ordered consistently with its
    /// diagonalizing gates
    ///
    /// Tensor products combine factor eigenvalues in factor order
    /// (Kronecker product). Fails for composite observables without a
    /// defined spectrum.
    pub fn eigvals(&self) -> Result<Vec<f64>> {
        match self {
            Observable::PauliX { .. }
            | Observable::PauliY { .. }
            | Observable::PauliZ { .. }
            | Observable::Hadamard { .. } => Ok(vec![1.0, -1.0]),
            Observable::Identity { .. } => Ok(vec![1.0, 1.0]),
            Observable::Hermitian { matrix, wires } => {
                let dim = 1usize << wires.len();
                // Ascending order, matching the diagonalizing rotation.
                crate::linalg::eigvalsh(matrix, dim)
            }
            Observable::Projector { basis_state, .. } => {
                let dim = 1usize << basis_state.len();
                let idx = basis_state
                    .iter()
                    .fold(0usize, |acc, &b| (acc << 1) | b as usize);
                let mut vals = vec![0.0; dim];
                vals[idx] = 1.0;
                Ok(vals)
            }
            Observable::Tensor { factors } => {
                let mut vals = vec![1.0];
                for factor in factors {
                    let fv = factor.eigvals()?;
                    let mut next = Vec::with_capacity(vals.len() * fv.len());
                    for &a in &vals {
                        for &b in &fv {
                            next.push(a * b);
                        }
                    }
                    vals = next;
                }
                Ok(vals)
            }
            Observable::Hamiltonian { .. } => Err(CoreError::EigenvaluesUndefined {
                observable: self.name().to_string(),
            }),
        }
    }

    /// Gates that rotate the computational basis into the eigenbasis of
    /// this observable
    ///
    /// After applying these to the state, computational basis probabilities
    /// line up with `eigvals()` in order.
    pub fn diagonalizing_gates(&self) -> Result<Vec<Operation>> {
        match self {
            Observable::PauliZ { .. }
            | Observable::Identity { .. }
            | Observable::Projector { .. } => Ok(vec![]),
            Observable::PauliX { wire } => Ok(vec![Operation::Hadamard { wire: wire.clone() }]),
            Observable::PauliY { wire } => Ok(vec![
                Operation::PauliZ { wire: wire.clone() },
                Operation::S { wire: wire.clone() },
                Operation::Hadamard { wire: wire.clone() },
            ]),
            Observable::Hadamard { wire } => Ok(vec![Operation::RY {
                theta: -FRAC_PI_4,
                wire: wire.clone(),
            }]),
            Observable::Hermitian { matrix, wires } => {
                let dim = 1usize << wires.len();
                let (_, vectors) = eigh(matrix, dim)?;
                // V^H A V is diagonal with ascending eigenvalues, so V^H is
                // the change of basis to apply to the state.
                Ok(vec![Operation::QubitUnitary {
                    matrix: conjugate_transpose(&vectors, dim),
                    wires: wires.clone(),
                }])
            }
            Observable::Tensor { factors } => {
                let mut gates = Vec::new();
                for factor in factors {
                    gates.extend(factor.diagonalizing_gates()?);
                }
                Ok(gates)
            }
            Observable::Hamiltonian { .. } => Err(CoreError::DiagonalizingGatesUndefined {
                observable: self.name().to_string(),
            }),
        }
    }

    /// The matrices making up this observable, paired with their wires
    ///
    /// A tensor product yields one entry per factor; everything else yields
    /// a single entry. Used to apply the observable as an operator.
    pub fn factor_matrices(&self) -> Result<Vec<(Vec<Complex64>, Vec<WireLabel>)>> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        match self {
            Observable::PauliX { wire } => {
                Ok(vec![(vec![zero, one, one, zero], vec![wire.clone()])])
            }
            Observable::PauliY { wire } => Ok(vec![(
                vec![
                    zero,
                    Complex64::new(0.0, -1.0),
                    Complex64::new(0.0, 1.0),
                    zero,
                ],
                vec![wire.clone()],
            )]),
            Observable::PauliZ { wire } => {
                Ok(vec![(vec![one, zero, zero, -one], vec![wire.clone()])])
            }
            Observable::Hadamard { wire } => {
                let h = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
                Ok(vec![(vec![h, h, h, -h], vec![wire.clone()])])
            }
            Observable::Identity { wire } => {
                Ok(vec![(vec![one, zero, zero, one], vec![wire.clone()])])
            }
            Observable::Hermitian { matrix, wires } => {
                Ok(vec![(matrix.clone(), wires.clone())])
            }
            Observable::Projector { basis_state, wires } => {
                let dim = 1usize << basis_state.len();
                let idx = basis_state
                    .iter()
                    .fold(0usize, |acc, &b| (acc << 1) | b as usize);
                let mut matrix = vec![zero; dim * dim];
                matrix[idx * dim + idx] = one;
                Ok(vec![(matrix, wires.clone())])
            }
            Observable::Tensor { factors } => {
                let mut out = Vec::with_capacity(factors.len());
                for factor in factors {
                    out.extend(factor.factor_matrices()?);
                }
                Ok(out)
            }
            Observable::Hamiltonian { .. } => Err(CoreError::EigenvaluesUndefined {
                observable: self.name().to_string(),
            }),
        }
    }
}
