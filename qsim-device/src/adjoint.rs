//! Adjoint differentiation
//!
//! Implements the adjoint method of Jones and Gacon
//! (<https://arxiv.org/abs/2009.02823>): after a forward pass, the circuit
//! is walked backwards by applying adjoint gates, and for every trainable
//! parameter the gate-derivative matrix is contracted between the evolving
//! bra states (one per observable) and the stepped-back ket. Cost is one
//! extra state per observable instead of one circuit per parameter.
//!
//! Restrictions: measurements must all be expectation values, and
//! composite observables without a fixed spectrum are not supported.

use num_complex::Complex64;
use rayon::prelude::*;

use qsim_core::measurement::{MeasurementKind, Tape};
use qsim_core::observable::Observable;
use qsim_core::wires::Wires;
use qsim_state::apply::StateBackend;
use qsim_state::state_vector::StateVector;

use crate::device::QubitDevice;
use crate::error::{DeviceError, Result};

/// Derivatives of expectation values with respect to gate parameters
///
/// Row `i` holds the gradient of observable `i`; column `j` corresponds to
/// the `j`-th trainable parameter in ascending index order.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    entries: Vec<f64>,
    num_observables: usize,
    num_params: usize,
}

impl Jacobian {
    fn zeros(num_observables: usize, num_params: usize) -> Self {
        Self {
            entries: vec![0.0; num_observables * num_params],
            num_observables,
            num_params,
        }
    }

    pub fn num_observables(&self) -> usize {
        self.num_observables
    }

    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn get(&self, observable: usize, param: usize) -> f64 {
        self.entries[observable * self.num_params + param]
    }

    /// The gradient row for one observable
    pub fn row(&self, observable: usize) -> &[f64] {
        &self.entries[observable * self.num_params..(observable + 1) * self.num_params]
    }

    fn set_column(&mut self, param: usize, values: &[f64]) {
        for (observable, &value) in values.iter().enumerate() {
            self.entries[observable * self.num_params + param] = value;
        }
    }
}

impl<B: StateBackend> QubitDevice<B> {
    /// Differentiate a tape with the adjoint method
    ///
    /// # Arguments
    /// * `tape` - circuit to differentiate
    /// * `starting_state` - post-forward-pass state to start from; takes
    ///   precedence over `use_device_state`
    /// * `use_device_state` - reuse the device state from the last
    ///   execution instead of running a fresh forward pass
    ///
    /// # Returns
    /// A [`Jacobian`] of shape `(observables, trainable parameters)`.
    pub fn adjoint_jacobian(
        &mut self,
        tape: &Tape,
        starting_state: Option<&[Complex64]>,
        use_device_state: bool,
    ) -> Result<Jacobian> {
        for m in &tape.measurements {
            if m.kind != MeasurementKind::Expectation {
                return Err(DeviceError::UnsupportedGradientMeasurement {
                    kind: m.kind.to_string(),
                });
            }
            if let Some(Observable::Hamiltonian { .. }) = m.observable {
                return Err(DeviceError::UnsupportedObservable {
                    observable: "Hamiltonian".to_string(),
                });
            }
        }

        if !self.shots().is_analytic() {
            log::warn!(
                "Requested adjoint differentiation to be computed with finite shots. \
                 The derivative is always exact when using the adjoint differentiation method."
            );
        }

        let n = self.num_wires();
        let ket = match starting_state {
            Some(amplitudes) => StateVector::from_amplitudes(n, amplitudes)
                .map_err(DeviceError::from)?,
            None => {
                if !use_device_state {
                    self.execute(tape)?;
                }
                self.pre_rotated_state().clone()
            }
        };

        let observables = tape.observables();
        let mut bras: Vec<StateVector> = observables
            .iter()
            .map(|obs| self.apply_observable(&ket, obs))
            .collect::<Result<_>>()?;
        let mut ket = ket;

        // Reversed operation list with multi-parameter gates decomposed
        // into single-parameter primitives; state preparations and
        // snapshots never contribute to the walk.
        let mut expanded_ops = Vec::with_capacity(tape.operations.len());
        for op in tape.operations.iter().rev() {
            if op.num_params() > 1 {
                match op.decomposition() {
                    Some(decomposition) => expanded_ops.extend(decomposition.into_iter().rev()),
                    None => {
                        return Err(DeviceError::UnsupportedAdjointOperation {
                            operation: op.name().to_string(),
                        })
                    }
                }
            } else if !op.is_state_prep() && !op.is_snapshot() {
                expanded_ops.push(op.clone());
            }
        }

        // Trainable indices past the gate-parameter stream belong to the
        // measured observables and are excluded from the gradient.
        let num_gate_params = tape.num_gate_params();
        let mut trainable_params = Vec::with_capacity(tape.trainable_params.len());
        for &k in &tape.trainable_params {
            if k < num_gate_params {
                trainable_params.push(k);
            } else {
                log::warn!(
                    "Differentiating with respect to the input parameters of observables \
                     is not supported with the adjoint differentiation method. Gradients \
                     are computed only with regards to the trainable parameters of the \
                     circuit. Mark the parameters of the measured observables as \
                     non-trainable to silence this warning."
                );
            }
        }
        trainable_params.sort_unstable();

        let mut jacobian = Jacobian::zeros(observables.len(), trainable_params.len());
        let mut param_number = num_gate_params as isize - 1;
        let mut trainable_number = trainable_params.len() as isize - 1;

        for op in &expanded_ops {
            let differentiable = op.has_grad_method();
            let train_here = differentiable
                && param_number >= 0
                && trainable_params.contains(&(param_number as usize));

            // Derivative of the forward gate, taken before stepping back.
            let d_matrix = if train_here {
                Some(op.parameter_derivative()?)
            } else {
                None
            };

            let adjoint_op = op.adjoint();
            ket = self.apply_operation(&ket, &adjoint_op)?;

            if differentiable {
                if let Some(d_matrix) = d_matrix {
                    let mapped = self.map_wires(&Wires::new(op.wires())?)?;
                    let ket_temp = self.backend().apply_matrix(&ket, &d_matrix, &mapped)?;

                    let column: Vec<f64> = bras
                        .par_iter()
                        .map(|bra| 2.0 * bra.overlap(&ket_temp).re)
                        .collect();
                    jacobian.set_column(trainable_number as usize, &column);
                    trainable_number -= 1;
                }
                param_number -= 1;
            }

            bras = bras
                .par_iter()
                .map(|bra| self.apply_operation(bra, &adjoint_op))
                .collect::<Result<_>>()?;
        }

        Ok(jacobian)
    }
}
