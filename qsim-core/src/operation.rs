//! Quantum operations (gates and state preparations)
//!
//! Operations are plain values. In particular, taking the adjoint of an
//! operation returns a new operation rather than toggling a direction flag
//! on a shared object, so reverse walks over a tape never mutate it.
//!
//! Matrix convention: row-major, with the first listed wire as the most
//! significant bit of the sub-index (`|c t>` ordering for two-qubit gates).

use crate::error::{CoreError, Result};
use crate::linalg::conjugate_transpose;
use crate::wires::WireLabel;
use num_complex::Complex64;
use smallvec::{smallvec, SmallVec};
use std::f64::consts::FRAC_1_SQRT_2;

/// A quantum operation applied to specific wires
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Hadamard gate
    Hadamard { wire: WireLabel },
    /// Pauli X gate
    PauliX { wire: WireLabel },
    /// Pauli Y gate
    PauliY { wire: WireLabel },
    /// Pauli Z gate
    PauliZ { wire: WireLabel },
    /// Phase gate diag(1, i)
    S { wire: WireLabel },
    /// Rotation about the X axis
    RX { theta: f64, wire: WireLabel },
    /// Rotation about the Y axis
    RY { theta: f64, wire: WireLabel },
    /// Rotation about the Z axis
    RZ { theta: f64, wire: WireLabel },
    /// Single-qubit phase shift diag(1, exp(i*phi))
    PhaseShift { phi: f64, wire: WireLabel },
    /// General single-qubit rotation RZ(omega) RY(theta) RZ(phi)
    Rot {
        phi: f64,
        theta: f64,
        omega: f64,
        wire: WireLabel,
    },
    /// Controlled NOT; `control` is the first (most significant) wire
    CNOT { control: WireLabel, target: WireLabel },
    /// Controlled Z
    CZ { control: WireLabel, target: WireLabel },
    /// Arbitrary unitary given as a row-major `2^k x 2^k` matrix
    QubitUnitary {
        matrix: Vec<Complex64>,
        wires: Vec<WireLabel>,
    },
    /// Prepare a computational basis state on the given wires
    BasisState { bits: Vec<u8>, wires: Vec<WireLabel> },
    /// Prepare an arbitrary statevector on the given wires
    StatePrep {
        amplitudes: Vec<Complex64>,
        wires: Vec<WireLabel>,
    },
    /// Debugging marker with no effect on the state
    Snapshot,
}

impl Operation {
    /// The operation name, e.g. `"RX"`
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Hadamard { .. } => "Hadamard",
            Operation::PauliX { .. } => "PauliX",
            Operation::PauliY { .. } => "PauliY",
            Operation::PauliZ { .. } => "PauliZ",
            Operation::S { .. } => "S",
            Operation::RX { .. } => "RX",
            Operation::RY { .. } => "RY",
            Operation::RZ { .. } => "RZ",
            Operation::PhaseShift { .. } => "PhaseShift",
            Operation::Rot { .. } => "Rot",
            Operation::CNOT { .. } => "CNOT",
            Operation::CZ { .. } => "CZ",
            Operation::QubitUnitary { .. } => "QubitUnitary",
            Operation::BasisState { .. } => "BasisState",
            Operation::StatePrep { .. } => "StatePrep",
            Operation::Snapshot => "Snapshot",
        }
    }

    /// The wires this operation acts on, in application order
    pub fn wires(&self) -> SmallVec<[WireLabel; 2]> {
        match self {
            Operation::Hadamard { wire }
            | Operation::PauliX { wire }
            | Operation::PauliY { wire }
            | Operation::PauliZ { wire }
            | Operation::S { wire }
            | Operation::RX { wire, .. }
            | Operation::RY { wire, .. }
            | Operation::RZ { wire, .. }
            | Operation::PhaseShift { wire, .. }
            | Operation::Rot { wire, .. } => smallvec![wire.clone()],
            Operation::CNOT { control, target } | Operation::CZ { control, target } => {
                smallvec![control.clone(), target.clone()]
            }
            Operation::QubitUnitary { wires, .. }
            | Operation::BasisState { wires, .. }
            | Operation::StatePrep { wires, .. } => SmallVec::from_vec(wires.clone()),
            Operation::Snapshot => SmallVec::new(),
        }
    }

    /// Number of differentiable gate parameters
    pub fn num_params(&self) -> usize {
        match self {
            Operation::RX { .. }
            | Operation::RY { .. }
            | Operation::RZ { .. }
            | Operation::PhaseShift { .. } => 1,
            Operation::Rot { .. } => 3,
            _ => 0,
        }
    }

    /// The gate parameters in declaration order
    pub fn parameters(&self) -> SmallVec<[f64; 3]> {
        match self {
            Operation::RX { theta, .. }
            | Operation::RY { theta, .. }
            | Operation::RZ { theta, .. } => SmallVec::from_slice(&[*theta]),
            Operation::PhaseShift { phi, .. } => SmallVec::from_slice(&[*phi]),
            Operation::Rot {
                phi, theta, omega, ..
            } => SmallVec::from_slice(&[*phi, *theta, *omega]),
            _ => SmallVec::new(),
        }
    }

    /// Whether this operation prepares a state rather than evolving one
    pub fn is_state_prep(&self) -> bool {
        matches!(
            self,
            Operation::BasisState { .. } | Operation::StatePrep { .. }
        )
    }

    /// Whether this operation is a snapshot marker
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Operation::Snapshot)
    }

    /// Whether this operation supports gradient computation
    ///
    /// Single-parameter rotations carry an analytic parameter derivative;
    /// `Rot` is handled through its decomposition.
    pub fn has_grad_method(&self) -> bool {
        matches!(
            self,
            Operation::RX { .. }
                | Operation::RY { .. }
                | Operation::RZ { .. }
                | Operation::PhaseShift { .. }
        )
    }

    /// The unitary matrix of this operation, row-major
    ///
    /// Returns `None` for state preparations and snapshots, which have no
    /// matrix representation.
    pub fn matrix(&self) -> Option<Vec<Complex64>> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        match self {
            Operation::Hadamard { .. } => {
                let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
                Some(vec![h, h, h, -h])
            }
            Operation::PauliX { .. } => Some(vec![zero, one, one, zero]),
            Operation::PauliY { .. } => Some(vec![
                zero,
                Complex64::new(0.0, -1.0),
                Complex64::new(0.0, 1.0),
                zero,
            ]),
            Operation::PauliZ { .. } => Some(vec![one, zero, zero, -one]),
            Operation::S { .. } => Some(vec![one, zero, zero, Complex64::new(0.0, 1.0)]),
            Operation::RX { theta, .. } => {
                let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
                let ms = Complex64::new(0.0, -s);
                Some(vec![Complex64::new(c, 0.0), ms, ms, Complex64::new(c, 0.0)])
            }
            Operation::RY { theta, .. } => {
                let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
                Some(vec![
                    Complex64::new(c, 0.0),
                    Complex64::new(-s, 0.0),
                    Complex64::new(s, 0.0),
                    Complex64::new(c, 0.0),
                ])
            }
            Operation::RZ { theta, .. } => Some(vec![
                Complex64::from_polar(1.0, -theta / 2.0),
                zero,
                zero,
                Complex64::from_polar(1.0, theta / 2.0),
            ]),
            Operation::PhaseShift { phi, .. } => {
                Some(vec![one, zero, zero, Complex64::from_polar(1.0, *phi)])
            }
            Operation::Rot { .. } => {
                // RZ(omega) RY(theta) RZ(phi) as matrices.
                let decomp = self.decomposition()?;
                let mut m = decomp[0].matrix()?;
                for op in &decomp[1..] {
                    m = matmul2(&op.matrix()?, &m);
                }
                Some(m)
            }
            Operation::CNOT { .. } => Some(vec![
                one, zero, zero, zero, //
                zero, one, zero, zero, //
                zero, zero, zero, one, //
                zero, zero, one, zero,
            ]),
            Operation::CZ { .. } => Some(vec![
                one, zero, zero, zero, //
                zero, one, zero, zero, //
                zero, zero, one, zero, //
                zero, zero, zero, -one,
            ]),
            Operation::QubitUnitary { matrix, .. } => Some(matrix.clone()),
            Operation::BasisState { .. } | Operation::StatePrep { .. } | Operation::Snapshot => {
                None
            }
        }
    }

    /// The adjoint (inverse) of this operation as a new value
    ///
    /// State preparations and snapshots return themselves; reverse walks
    /// skip them before ever taking adjoints.
    pub fn adjoint(&self) -> Operation {
        match self {
            Operation::Hadamard { .. }
            | Operation::PauliX { .. }
            | Operation::PauliY { .. }
            | Operation::PauliZ { .. }
            | Operation::CNOT { .. }
            | Operation::CZ { .. } => self.clone(),
            Operation::S { wire } => Operation::PhaseShift {
                phi: -std::f64::consts::FRAC_PI_2,
                wire: wire.clone(),
            },
            Operation::RX { theta, wire } => Operation::RX {
                theta: -theta,
                wire: wire.clone(),
            },
            Operation::RY { theta, wire } => Operation::RY {
                theta: -theta,
                wire: wire.clone(),
            },
            Operation::RZ { theta, wire } => Operation::RZ {
                theta: -theta,
                wire: wire.clone(),
            },
            Operation::PhaseShift { phi, wire } => Operation::PhaseShift {
                phi: -phi,
                wire: wire.clone(),
            },
            Operation::Rot {
                phi,
                theta,
                omega,
                wire,
            } => Operation::Rot {
                phi: -omega,
                theta: -theta,
                omega: -phi,
                wire: wire.clone(),
            },
            Operation::QubitUnitary { matrix, wires } => {
                let dim = 1usize << wires.len();
                Operation::QubitUnitary {
                    matrix: conjugate_transpose(matrix, dim),
                    wires: wires.clone(),
                }
            }
            Operation::BasisState { .. } | Operation::StatePrep { .. } | Operation::Snapshot => {
                self.clone()
            }
        }
    }

    /// Decomposition into single-parameter primitives, if one exists
    ///
    /// Only `Rot` decomposes; the components are returned in application
    /// order (`RZ(phi)` first).
    pub fn decomposition(&self) -> Option<Vec<Operation>> {
        match self {
            Operation::Rot {
                phi,
                theta,
                omega,
                wire,
            } => Some(vec![
                Operation::RZ {
                    theta: *phi,
                    wire: wire.clone(),
                },
                Operation::RY {
                    theta: *theta,
                    wire: wire.clone(),
                },
                Operation::RZ {
                    theta: *omega,
                    wire: wire.clone(),
                },
            ]),
            _ => None,
        }
    }

    /// The elementwise derivative of the gate matrix with respect to its
    /// single parameter
    pub fn parameter_derivative(&self) -> Result<Vec<Complex64>> {
        let zero = Complex64::new(0.0, 0.0);
        match self {
            Operation::RX { theta, .. } => {
                let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
                let dc = Complex64::new(-0.5 * s, 0.0);
                let ds = Complex64::new(0.0, -0.5 * c);
                Ok(vec![dc, ds, ds, dc])
            }
            Operation::RY { theta, .. } => {
                let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
                Ok(vec![
                    Complex64::new(-0.5 * s, 0.0),
                    Complex64::new(-0.5 * c, 0.0),
                    Complex64::new(0.5 * c, 0.0),
                    Complex64::new(-0.5 * s, 0.0),
                ])
            }
            Operation::RZ { theta, .. } => Ok(vec![
                Complex64::from_polar(0.5, -theta / 2.0) * Complex64::new(0.0, -1.0),
                zero,
                zero,
                Complex64::from_polar(0.5, theta / 2.0) * Complex64::new(0.0, 1.0),
            ]),
            Operation::PhaseShift { phi, .. } => Ok(vec![
                zero,
                zero,
                zero,
                Complex64::from_polar(1.0, *phi) * Complex64::new(0.0, 1.0),
            ]),
            _ => Err(CoreError::DerivativeUndefined {
                operation: self.name().to_string(),
            }),
        }
    }
}

/// Multiply two row-major 2x2 complex matrices
fn matmul2(a: &[Complex64], b: &[Complex64]) -> Vec<Complex64> {
    vec![
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wire0() -> WireLabel {
        0usize.into()
    }

    fn assert_matrix_eq(a: &[Complex64], b: &[Complex64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x.re, y.re, epsilon = 1e-12);
            assert_relative_eq!(x.im, y.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wires_with_named_labels() {
        let single = Operation::RX {
            theta: 0.1,
            wire: "anc".into(),
        };
        assert_eq!(single.wires().as_slice(), &[WireLabel::from("anc")]);

        let two = Operation::CNOT {
            control: "ctrl".into(),
            target: "tgt".into(),
        };
        assert_eq!(
            two.wires().as_slice(),
            &[WireLabel::from("ctrl"), WireLabel::from("tgt")]
        );
    }

    #[test]
    fn test_rx_adjoint_is_inverse() {
        let op = Operation::RX {
            theta: 0.7,
            wire: wire0(),
        };
        let m = op.matrix().unwrap();
        let madj = op.adjoint().matrix().unwrap();
        let product = matmul2(&m, &madj);
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        assert_matrix_eq(&product, &[one, zero, zero, one]);
    }

    #[test]
    fn test_s_adjoint_is_phase_shift() {
        let op = Operation::S { wire: wire0() };
        let m = op.matrix().unwrap();
        let madj = op.adjoint().matrix().unwrap();
        let product = matmul2(&m, &madj);
        assert_relative_eq!(product[0].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(product[3].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(product[3].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rot_matches_decomposition() {
        let op = Operation::Rot {
            phi: 0.3,
            theta: -1.2,
            omega: 2.5,
            wire: wire0(),
        };
        let decomp = op.decomposition().unwrap();
        assert_eq!(decomp.len(), 3);
        assert_eq!(decomp[0].name(), "RZ");
        assert_eq!(decomp[1].name(), "RY");

        let mut m = decomp[0].matrix().unwrap();
        for part in &decomp[1..] {
            m = matmul2(&part.matrix().unwrap(), &m);
        }
        assert_matrix_eq(&m, &op.matrix().unwrap());
    }

    #[test]
    fn test_rot_adjoint_reverses_angles() {
        let op = Operation::Rot {
            phi: 0.3,
            theta: -1.2,
            omega: 2.5,
            wire: wire0(),
        };
        match op.adjoint() {
            Operation::Rot {
                phi, theta, omega, ..
            } => {
                assert_relative_eq!(phi, -2.5);
                assert_relative_eq!(theta, 1.2);
                assert_relative_eq!(omega, -0.3);
            }
            other => panic!("unexpected adjoint {:?}", other),
        }
    }

    #[test]
    fn test_parameter_derivative_rx_finite_difference() {
        let theta = 0.9;
        let eps = 1e-6;
        let op = Operation::RX {
            theta,
            wire: wire0(),
        };
        let plus = Operation::RX {
            theta: theta + eps,
            wire: wire0(),
        }
        .matrix()
        .unwrap();
        let minus = Operation::RX {
            theta: theta - eps,
            wire: wire0(),
        }
        .matrix()
        .unwrap();
        let deriv = op.parameter_derivative().unwrap();
        for i in 0..4 {
            let fd = (plus[i] - minus[i]) / (2.0 * eps);
            assert_relative_eq!(deriv[i].re, fd.re, epsilon = 1e-6);
            assert_relative_eq!(deriv[i].im, fd.im, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_parameter_derivative_undefined_for_fixed_gates() {
        let op = Operation::Hadamard { wire: wire0() };
        assert!(matches!(
            op.parameter_derivative(),
            Err(CoreError::DerivativeUndefined { .. })
        ));
    }

    #[test]
    fn test_num_params() {
        assert_eq!(
            Operation::Rot {
                phi: 0.0,
                theta: 0.0,
                omega: 0.0,
                wire: wire0()
            }
            .num_params(),
            3
        );
        assert_eq!(
            Operation::RX {
                theta: 0.0,
                wire: wire0()
            }
            .num_params(),
            1
        );
        assert_eq!(
            Operation::CNOT {
                control: 0usize.into(),
                target: 1usize.into()
            }
            .num_params(),
            0
        );
    }
}
