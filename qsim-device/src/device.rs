//! The qubit device: circuit execution and measurement statistics
//!
//! [`QubitDevice`] drives a [`StateBackend`] through a tape, rotates the
//! state into the measurement basis, draws samples when shots are
//! configured, and turns measurement requests into values. The statistics
//! layer is written against basis-state probabilities and raw bit samples
//! only, so it works unchanged over any backend.
//!
//! Basis convention: the first device wire is the most significant bit,
//! `|q_0, q_1, ..., q_{n-1}>`.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use qsim_core::measurement::{Measurement, MeasurementKind, Tape};
use qsim_core::observable::Observable;
use qsim_core::operation::Operation;
use qsim_core::wires::{WireLabel, Wires};
use qsim_state::apply::{DenseBackend, StateBackend};
use qsim_state::state_vector::StateVector;
use qsim_state::{density_matrix, StateError};

use crate::basis::{argsort, basis_states, bit_weights, bits_to_index};
use crate::error::{DeviceError, Result};
use crate::result::{ExecutionResult, MeasurementValue, ProbResult};
use crate::sampling::SampleBuffer;
use crate::shots::Shots;

/// Static configuration of a device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device wires; registration order defines the basis bit order
    pub wires: Wires,
    /// Shot configuration
    pub shots: Shots,
    /// Seed for the sampling generator, fresh entropy when unset
    pub seed: Option<u64>,
    /// Whether state and density-matrix measurements are allowed
    pub returns_state: bool,
}

impl DeviceConfig {
    /// Analytic device over the canonical wires `0..num_wires`
    pub fn new(num_wires: usize) -> Self {
        Self {
            wires: Wires::range(num_wires),
            shots: Shots::Analytic,
            seed: None,
            returns_state: true,
        }
    }

    pub fn with_wires(mut self, wires: Wires) -> Self {
        self.wires = wires;
        self
    }

    pub fn with_shots(mut self, shots: Shots) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_returns_state(mut self, returns_state: bool) -> Self {
        self.returns_state = returns_state;
        self
    }
}

/// A statevector simulator device
///
/// # Example
/// ```
/// use qsim_core::measurement::{Measurement, Tape};
/// use qsim_core::observable::Observable;
/// use qsim_core::operation::Operation;
/// use qsim_device::device::{DeviceConfig, QubitDevice};
///
/// let mut dev = QubitDevice::dense(DeviceConfig::new(1));
/// let tape = Tape::new(
///     vec![Operation::Hadamard { wire: 0usize.into() }],
///     vec![Measurement::expval(Observable::PauliX { wire: 0usize.into() })],
/// );
/// let result = dev.execute(&tape).unwrap();
/// let value = result.as_single().unwrap()[0].as_scalar().unwrap();
/// assert!((value - 1.0).abs() < 1e-10);
/// ```
pub struct QubitDevice<B: StateBackend> {
    config: DeviceConfig,
    backend: B,
    /// State after measurement rotations
    state: StateVector,
    /// State before measurement rotations
    pre_rotated_state: StateVector,
    samples: Option<SampleBuffer>,
    rng: StdRng,
    num_executions: u64,
}

impl QubitDevice<DenseBackend> {
    /// Device over the reference dense backend
    pub fn dense(config: DeviceConfig) -> Self {
        Self::new(config, DenseBackend)
    }
}

impl<B: StateBackend> QubitDevice<B> {
    pub fn new(config: DeviceConfig, backend: B) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let n = config.wires.len();
        Self {
            config,
            backend,
            state: StateVector::new(n),
            pre_rotated_state: StateVector::new(n),
            samples: None,
            rng,
            num_executions: 0,
        }
    }

    pub fn num_wires(&self) -> usize {
        self.config.wires.len()
    }

    pub fn wires(&self) -> &Wires {
        &self.config.wires
    }

    pub fn shots(&self) -> &Shots {
        &self.config.shots
    }

    /// Number of completed tape executions
    pub fn num_executions(&self) -> u64 {
        self.num_executions
    }

    /// Return the device to the |0...0> state and drop cached samples
    pub fn reset(&mut self) {
        let n = self.num_wires();
        self.state = StateVector::new(n);
        self.pre_rotated_state = StateVector::new(n);
        self.samples = None;
    }

    /// The statevector prior to measurement rotations
    pub fn state(&self) -> &[Complex64] {
        self.pre_rotated_state.amplitudes()
    }

    /// Translate wire labels to device positional indices
    pub fn map_wires(&self, wires: &Wires) -> Result<Vec<usize>> {
        Ok(self.config.wires.indices_of(wires)?)
    }

    /// Execute a tape and compute its measurement statistics
    ///
    /// Shot vectors yield one result row per batch copy, each computed
    /// over its own consecutive slice of the sample stream.
    pub fn execute(&mut self, tape: &Tape) -> Result<ExecutionResult> {
        self.reset();
        let rotations = tape.diagonalizing_gates()?;
        self.apply(&tape.operations, &rotations)?;

        if !self.config.shots.is_analytic() {
            self.generate_samples()?;
        }

        let shots = self.config.shots.clone();
        let result = match &shots {
            Shots::Vector(batches) => {
                let mut rows = Vec::new();
                let mut s1 = 0usize;
                for batch in batches {
                    for _ in 0..batch.copies {
                        let s2 = s1 + batch.shots as usize;
                        rows.push(self.statistics(
                            &tape.measurements,
                            Some((s1, s2)),
                            None,
                        )?);
                        s1 = s2;
                    }
                }
                ExecutionResult::Batched(rows)
            }
            _ => ExecutionResult::Single(self.statistics(&tape.measurements, None, None)?),
        };

        self.num_executions += 1;
        Ok(result)
    }

    /// Apply circuit operations, then the measurement-basis rotations
    ///
    /// State preparations must come before any gate. Snapshots are
    /// markers and leave the state untouched.
    pub fn apply(&mut self, operations: &[Operation], rotations: &[Operation]) -> Result<()> {
        let n = self.num_wires();
        let mut state = StateVector::new(n);
        let mut gates_applied = false;

        for op in operations {
            if op.is_snapshot() {
                continue;
            }
            if op.is_state_prep() {
                if gates_applied {
                    return Err(DeviceError::LateStatePreparation {
                        operation: op.name().to_string(),
                    });
                }
                state = self.prepare_state(op)?;
                continue;
            }
            state = self.apply_operation(&state, op)?;
            gates_applied = true;
        }

        self.pre_rotated_state = state.clone();
        for rotation in rotations {
            state = self.apply_operation(&state, rotation)?;
        }
        self.state = state;
        Ok(())
    }

    pub(crate) fn apply_operation(&self, state: &StateVector, op: &Operation) -> Result<StateVector> {
        let wires = Wires::new(op.wires())?;
        let mapped = self.map_wires(&wires)?;
        Ok(self.backend.apply_operation(state, op, &mapped)?)
    }

    fn prepare_state(&self, op: &Operation) -> Result<StateVector> {
        let n = self.num_wires();
        match op {
            Operation::BasisState { bits, wires } => {
                let mapped = self.map_wires(&Wires::new(wires.clone())?)?;
                if bits.len() != mapped.len() || bits.iter().any(|&b| b > 1) {
                    return Err(DeviceError::InvalidWires {
                        reason: format!(
                            "BasisState of {} bit(s) cannot prepare {} wire(s)",
                            bits.len(),
                            mapped.len()
                        ),
                    });
                }
                let mut index = 0usize;
                for (&bit, &w) in bits.iter().zip(mapped.iter()) {
                    index |= (bit as usize) << (n - 1 - w);
                }
                Ok(StateVector::basis_state(n, index)?)
            }
            Operation::StatePrep { amplitudes, wires } => {
                let mapped = self.map_wires(&Wires::new(wires.clone())?)?;
                let k = mapped.len();
                let sub_dim = 1usize << k;
                if amplitudes.len() != sub_dim {
                    return Err(DeviceError::State(StateError::DimensionMismatch {
                        expected: sub_dim,
                        actual: amplitudes.len(),
                    }));
                }
                let norm_sqr: f64 = amplitudes.iter().map(|a| a.norm_sqr()).sum();
                if (norm_sqr - 1.0).abs() > 1e-10 {
                    return Err(DeviceError::State(StateError::NotNormalized {
                        norm: norm_sqr.sqrt(),
                    }));
                }

                let mut full = vec![Complex64::new(0.0, 0.0); 1 << n];
                for (sub, &amp) in amplitudes.iter().enumerate() {
                    let mut index = 0usize;
                    for (j, &w) in mapped.iter().enumerate() {
                        if (sub >> (k - 1 - j)) & 1 == 1 {
                            index |= 1 << (n - 1 - w);
                        }
                    }
                    full[index] = amp;
                }
                Ok(StateVector::from_amplitudes(n, &full)?)
            }
            other => Err(DeviceError::InvalidWires {
                reason: format!("{} is not a state preparation", other.name()),
            }),
        }
    }

    /// Draw computational-basis samples from the rotated state
    pub fn generate_samples(&mut self) -> Result<()> {
        let shots = self.config.shots.total_shots();
        if shots == 0 {
            return Err(DeviceError::ShotsRequired);
        }
        let probabilities = self.backend.probabilities(&self.state);
        let buffer = SampleBuffer::generate(
            &probabilities,
            self.num_wires(),
            shots as usize,
            &mut self.rng,
        )?;
        self.samples = Some(buffer);
        Ok(())
    }

    fn samples(&self) -> Result<&SampleBuffer> {
        self.samples.as_ref().ok_or(DeviceError::ShotsRequired)
    }

    /// Compute one value per measurement over an optional sample window
    ///
    /// `shot_range` restricts shot-based statistics to samples
    /// `[start, end)`; `bin_size` splits that window into consecutive
    /// bins and reports one value per bin.
    pub fn statistics(
        &self,
        measurements: &[Measurement],
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<Vec<MeasurementValue>> {
        Self::check_bin_size(bin_size)?;
        let mut results = Vec::with_capacity(measurements.len());

        for m in measurements {
            let value = match m.kind {
                MeasurementKind::Expectation => {
                    let obs = Self::required_observable(m)?;
                    self.expval(obs, shot_range, bin_size)?
                }
                MeasurementKind::Variance => {
                    let obs = Self::required_observable(m)?;
                    self.var(obs, shot_range, bin_size)?
                }
                MeasurementKind::Sample => self.sample(m, shot_range, bin_size)?,
                MeasurementKind::Probability => {
                    let wires = self.nonempty(&m.wires);
                    MeasurementValue::Probabilities(self.probability(
                        wires,
                        shot_range,
                        bin_size,
                    )?)
                }
                MeasurementKind::State => {
                    if measurements.len() > 1 {
                        return Err(DeviceError::StateAccess {
                            reason: "the state or density matrix cannot be returned in \
                                     combination with other return types"
                                .to_string(),
                        });
                    }
                    self.check_canonical_wires("the state")?;
                    self.access_state(self.nonempty(&m.wires))?
                }
                MeasurementKind::VnEntropy => {
                    self.check_canonical_wires("the Von Neumann entropy")?;
                    MeasurementValue::Scalar(self.vn_entropy(&m.wires, m.log_base)?)
                }
                MeasurementKind::MutualInfo => {
                    self.check_canonical_wires("the mutual information")?;
                    let wires_b = m.wires_b.as_ref().ok_or_else(|| {
                        DeviceError::InvalidWires {
                            reason: "mutual information requires two wire groups".to_string(),
                        }
                    })?;
                    MeasurementValue::Scalar(self.mutual_info(&m.wires, wires_b, m.log_base)?)
                }
            };
            results.push(value);
        }

        Ok(results)
    }

    fn check_bin_size(bin_size: Option<usize>) -> Result<()> {
        match bin_size {
            Some(0) => Err(DeviceError::InvalidBinSize),
            _ => Ok(()),
        }
    }

    fn required_observable(m: &Measurement) -> Result<&Observable> {
        m.observable
            .as_ref()
            .ok_or_else(|| DeviceError::UnsupportedMeasurement {
                observable: "none".to_string(),
            })
    }

    fn nonempty<'a>(&self, wires: &'a Wires) -> Option<&'a Wires> {
        if wires.is_empty() {
            None
        } else {
            Some(wires)
        }
    }

    fn check_canonical_wires(&self, what: &str) -> Result<()> {
        if self.config.wires.is_canonical() {
            Ok(())
        } else {
            Err(DeviceError::StateAccess {
                reason: format!(
                    "returning {} is not supported when using custom wire labels",
                    what
                ),
            })
        }
    }

    /// The state, or the reduced density matrix when wires are given
    pub fn access_state(&self, wires: Option<&Wires>) -> Result<MeasurementValue> {
        if !self.config.returns_state {
            return Err(DeviceError::StateAccess {
                reason: "the device is not configured to return the state".to_string(),
            });
        }
        match wires {
            None => Ok(MeasurementValue::State(
                self.pre_rotated_state.amplitudes().to_vec(),
            )),
            Some(wires) => self.density_matrix(wires),
        }
    }

    /// Reduced density matrix over the given wires, prior to rotations
    pub fn density_matrix(&self, wires: &Wires) -> Result<MeasurementValue> {
        let mapped = self.map_wires(wires)?;
        let matrix = density_matrix::reduced_density_matrix(&self.pre_rotated_state, &mapped)?;
        Ok(MeasurementValue::DensityMatrix {
            matrix,
            dim: 1 << mapped.len(),
        })
    }

    /// Von Neumann entropy of the reduced state over the given wires
    pub fn vn_entropy(&self, wires: &Wires, log_base: Option<f64>) -> Result<f64> {
        if !self.config.returns_state {
            return Err(DeviceError::StateAccess {
                reason: "the device is not configured to return the state".to_string(),
            });
        }
        let mapped = self.map_wires(wires)?;
        Ok(density_matrix::vn_entropy(
            &self.pre_rotated_state,
            &mapped,
            log_base,
        )?)
    }

    /// Mutual information between two wire groups
    pub fn mutual_info(
        &self,
        wires_a: &Wires,
        wires_b: &Wires,
        log_base: Option<f64>,
    ) -> Result<f64> {
        if !self.config.returns_state {
            return Err(DeviceError::StateAccess {
                reason: "the device is not configured to return the state".to_string(),
            });
        }
        let mapped_a = self.map_wires(wires_a)?;
        let mapped_b = self.map_wires(wires_b)?;
        Ok(density_matrix::mutual_info(
            &self.pre_rotated_state,
            &mapped_a,
            &mapped_b,
            log_base,
        )?)
    }

    /// Analytic or estimated probability of each basis state
    pub fn probability(
        &self,
        wires: Option<&Wires>,
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<ProbResult> {
        if self.config.shots.is_analytic() {
            Ok(ProbResult::Vector(self.analytic_probability(wires)?))
        } else {
            self.estimate_probability(wires, shot_range, bin_size)
        }
    }

    /// Exact marginal probability from the rotated state
    pub fn analytic_probability(&self, wires: Option<&Wires>) -> Result<Vec<f64>> {
        let probabilities = self.backend.probabilities(&self.state);
        self.marginal_prob(probabilities, wires)
    }

    /// Marginalize a full probability vector onto the given wires
    ///
    /// Wires not listed are summed out. When the wires are not in device
    /// order the result is permuted to match the requested order, so
    /// passing `[2, 0]` on a three-wire device yields probabilities
    /// indexed as `|q_2 q_0>`.
    pub fn marginal_prob(&self, prob: Vec<f64>, wires: Option<&Wires>) -> Result<Vec<f64>> {
        let wires = match wires {
            Some(wires) => wires,
            None => return Ok(prob),
        };
        let n = self.num_wires();
        let mapped = self.map_wires(wires)?;
        let k = mapped.len();

        // Sum the inactive wires out, indexing by ascending device order.
        let mut sorted = mapped.clone();
        sorted.sort_unstable();
        let mut marginal = vec![0.0; 1 << k];
        for (index, p) in prob.iter().enumerate() {
            let mut sub = 0usize;
            for (j, &w) in sorted.iter().enumerate() {
                sub |= ((index >> (n - 1 - w)) & 1) << (k - 1 - j);
            }
            marginal[sub] += p;
        }

        // Permute to the requested wire order.
        let column_order = argsort(&argsort(&mapped));
        let weights = bit_weights(k);
        let mut out = vec![0.0; 1 << k];
        for (i, row) in basis_states(k).iter().enumerate() {
            let source: u64 = (0..k)
                .map(|j| u64::from(row[column_order[j]]) * weights[j])
                .sum();
            out[i] = marginal[source as usize];
        }
        Ok(out)
    }

    /// Estimate basis-state probabilities from the drawn samples
    pub fn estimate_probability(
        &self,
        wires: Option<&Wires>,
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<ProbResult> {
        Self::check_bin_size(bin_size)?;
        let samples = self.samples()?;
        let mapped = match wires {
            Some(wires) => self.map_wires(wires)?,
            None => (0..self.num_wires()).collect(),
        };
        let k = mapped.len();
        let dim = 1usize << k;

        let (start, end) = samples.shot_window(shot_range);
        let indices: Vec<usize> = (start..end)
            .map(|shot| {
                let row = samples.row(shot);
                mapped
                    .iter()
                    .fold(0usize, |acc, &w| (acc << 1) | row[w] as usize)
            })
            .collect();

        match bin_size {
            Some(bin_size) => {
                let bins = indices.len() / bin_size;
                let mut out = vec![vec![0.0; dim]; bins];
                for (b, chunk) in indices.chunks_exact(bin_size).enumerate() {
                    for &idx in chunk {
                        out[b][idx] += 1.0 / bin_size as f64;
                    }
                }
                Ok(ProbResult::Binned(out))
            }
            None => {
                let total = indices.len() as f64;
                let mut out = vec![0.0; dim];
                for idx in indices {
                    out[idx] += 1.0 / total;
                }
                Ok(ProbResult::Vector(out))
            }
        }
    }

    /// Expectation value of an observable
    pub fn expval(
        &self,
        observable: &Observable,
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<MeasurementValue> {
        Self::check_bin_size(bin_size)?;
        if let Observable::Projector { basis_state, .. } = observable {
            let index = bits_to_index(basis_state) as usize;
            let wires = Wires::new(observable.wires())?;
            return Ok(
                match self.probability(Some(&wires), shot_range, bin_size)? {
                    ProbResult::Vector(probs) => MeasurementValue::Scalar(probs[index]),
                    ProbResult::Binned(bins) => MeasurementValue::Vector(
                        bins.iter().map(|probs| probs[index]).collect(),
                    ),
                },
            );
        }

        if self.config.shots.is_analytic() {
            let eigvals = self.statistic_eigvals(observable, "expectation")?;
            let permuted = self.permuted_wires(observable)?;
            let prob = self.analytic_probability(Some(&permuted))?;
            let value = eigvals.iter().zip(prob.iter()).map(|(e, p)| e * p).sum();
            return Ok(MeasurementValue::Scalar(value));
        }

        let values = self.sample_values(observable, shot_range)?;
        Ok(binned_statistic(&values, bin_size, mean))
    }

    /// Variance of an observable
    pub fn var(
        &self,
        observable: &Observable,
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<MeasurementValue> {
        Self::check_bin_size(bin_size)?;
        if let Observable::Projector { basis_state, .. } = observable {
            let index = bits_to_index(basis_state) as usize;
            let wires = Wires::new(observable.wires())?;
            return Ok(
                match self.probability(Some(&wires), shot_range, bin_size)? {
                    ProbResult::Vector(probs) => {
                        MeasurementValue::Scalar(probs[index] - probs[index].powi(2))
                    }
                    ProbResult::Binned(bins) => MeasurementValue::Vector(
                        bins.iter()
                            .map(|probs| probs[index] - probs[index].powi(2))
                            .collect(),
                    ),
                },
            );
        }

        if self.config.shots.is_analytic() {
            let eigvals = self.statistic_eigvals(observable, "variance")?;
            let permuted = self.permuted_wires(observable)?;
            let prob = self.analytic_probability(Some(&permuted))?;
            let mean_sq: f64 = eigvals
                .iter()
                .zip(prob.iter())
                .map(|(e, p)| e * e * p)
                .sum();
            let mean: f64 = eigvals.iter().zip(prob.iter()).map(|(e, p)| e * p).sum();
            return Ok(MeasurementValue::Scalar(mean_sq - mean * mean));
        }

        let values = self.sample_values(observable, shot_range)?;
        Ok(binned_statistic(&values, bin_size, variance))
    }

    /// Samples for a measurement: observable eigenvalues, or raw bits
    fn sample(
        &self,
        m: &Measurement,
        shot_range: Option<(usize, usize)>,
        bin_size: Option<usize>,
    ) -> Result<MeasurementValue> {
        match &m.observable {
            Some(observable) => {
                let values = self.sample_values(observable, shot_range)?;
                Ok(match bin_size {
                    Some(bin_size) => MeasurementValue::Matrix(
                        values.chunks_exact(bin_size).map(<[f64]>::to_vec).collect(),
                    ),
                    None => MeasurementValue::Vector(values),
                })
            }
            None => {
                // Raw computational-basis bits, one row per shot.
                let samples = self.samples()?;
                let mapped = match self.nonempty(&m.wires) {
                    Some(wires) => self.map_wires(wires)?,
                    None => (0..self.num_wires()).collect(),
                };
                let (start, end) = samples.shot_window(shot_range);
                let rows = (start..end)
                    .map(|shot| {
                        let row = samples.row(shot);
                        mapped.iter().map(|&w| f64::from(row[w])).collect()
                    })
                    .collect();
                Ok(MeasurementValue::Matrix(rows))
            }
        }
    }

    /// Per-shot eigenvalue samples of an observable
    ///
    /// Observables with spectrum {+1, -1} on a single wire map directly
    /// from the sampled bit; everything else goes through an eigenvalue
    /// lookup on the sampled basis index.
    fn sample_values(
        &self,
        observable: &Observable,
        shot_range: Option<(usize, usize)>,
    ) -> Result<Vec<f64>> {
        let samples = self.samples()?;
        let wires = Wires::new(observable.wires())?;
        let mapped = self.map_wires(&wires)?;
        let (start, end) = samples.shot_window(shot_range);

        if observable.is_pauli_like() {
            return Ok((start..end)
                .map(|shot| 1.0 - 2.0 * f64::from(samples.row(shot)[mapped[0]]))
                .collect());
        }

        let eigvals = self.statistic_eigvals(observable, "samples")?;
        Ok((start..end)
            .map(|shot| {
                let row = samples.row(shot);
                let index = mapped
                    .iter()
                    .fold(0usize, |acc, &w| (acc << 1) | row[w] as usize);
                eigvals[index]
            })
            .collect())
    }

    fn statistic_eigvals(
        &self,
        observable: &Observable,
        statistic: &'static str,
    ) -> Result<Vec<f64>> {
        observable
            .eigvals()
            .map_err(|_| DeviceError::EigenvaluesUndefined {
                statistic,
                observable: observable.name().to_string(),
            })
    }

    /// The observable's wires permuted for eigenvalue/probability pairing
    ///
    /// Tensor factors may list wires in any order. The eigenvalues follow
    /// the factor order, so the probability vector they are paired with
    /// must be indexed by the wires each factor position lands on once the
    /// observable is reconciled with the device order.
    pub fn permuted_wires(&self, observable: &Observable) -> Result<Wires> {
        let obs_wires = Wires::new(observable.wires())?;
        let ordered: Vec<WireLabel> = self
            .config
            .wires
            .ordered_subset(&obs_wires)
            .iter()
            .cloned()
            .collect();
        let mapped = self.map_wires(&obs_wires)?;
        let permutation = argsort(&mapped);
        Ok(Wires::new(
            permutation.iter().map(|&i| ordered[i].clone()),
        )?)
    }

    /// Apply an observable's factor matrices to a state
    ///
    /// Used by the adjoint differentiation walk to form bra states.
    pub(crate) fn apply_observable(
        &self,
        state: &StateVector,
        observable: &Observable,
    ) -> Result<StateVector> {
        let mut out = state.clone();
        for (matrix, wires) in observable.factor_matrices()? {
            let mapped = self.map_wires(&Wires::new(wires)?)?;
            out = self.backend.apply_matrix(&out, &matrix, &mapped)?;
        }
        Ok(out)
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn pre_rotated_state(&self) -> &StateVector {
        &self.pre_rotated_state
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, matching the analytic `E[e^2] - E[e]^2` form
fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn binned_statistic(
    values: &[f64],
    bin_size: Option<usize>,
    statistic: fn(&[f64]) -> f64,
) -> MeasurementValue {
    match bin_size {
        Some(bin_size) => MeasurementValue::Vector(
            values.chunks_exact(bin_size).map(statistic).collect(),
        ),
        None => MeasurementValue::Scalar(statistic(values)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn analytic_device(num_wires: usize) -> QubitDevice<DenseBackend> {
        QubitDevice::dense(DeviceConfig::new(num_wires))
    }

    fn bell_ops() -> Vec<Operation> {
        vec![
            Operation::Hadamard { wire: 0usize.into() },
            Operation::CNOT {
                control: 0usize.into(),
                target: 1usize.into(),
            },
        ]
    }

    #[test]
    fn test_bell_state_probability() {
        let mut dev = analytic_device(2);
        let tape = Tape::new(bell_ops(), vec![Measurement::probability(Wires::range(0))]);
        let result = dev.execute(&tape).unwrap();
        let values = result.as_single().unwrap();
        let probs = values[0]
            .as_probabilities()
            .and_then(ProbResult::as_vector)
            .unwrap();
        assert_relative_eq!(probs[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(probs[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(probs[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(probs[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_marginal_prob_reorders_wires() {
        // |01>: wire 0 in state 0, wire 1 in state 1.
        let mut dev = analytic_device(2);
        dev.apply(
            &[Operation::PauliX { wire: 1usize.into() }],
            &[],
        )
        .unwrap();

        let forward = dev
            .analytic_probability(Some(&Wires::new([0usize, 1]).unwrap()))
            .unwrap();
        assert_relative_eq!(forward[1], 1.0, epsilon = 1e-12);

        // Reversed request order swaps the index bits.
        let reversed = dev
            .analytic_probability(Some(&Wires::new([1usize, 0]).unwrap()))
            .unwrap();
        assert_relative_eq!(reversed[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_marginal_prob_identity_on_full_wire_set() {
        let mut dev = analytic_device(2);
        dev.apply(&bell_ops(), &[]).unwrap();
        let prob = dev.analytic_probability(None).unwrap();
        let marginal = dev
            .marginal_prob(prob.clone(), Some(&Wires::range(2)))
            .unwrap();
        for (a, b) in marginal.iter().zip(prob.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_marginal_prob_sums_to_one() {
        let mut dev = analytic_device(3);
        dev.apply(
            &[
                Operation::Hadamard { wire: 0usize.into() },
                Operation::RY {
                    theta: 0.4,
                    wire: 2usize.into(),
                },
            ],
            &[],
        )
        .unwrap();
        for subset in [vec![0usize], vec![2, 0], vec![1, 2]] {
            let prob = dev.analytic_probability(None).unwrap();
            let marginal = dev
                .marginal_prob(prob, Some(&Wires::new(subset).unwrap()))
                .unwrap();
            assert_relative_eq!(marginal.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_binned_probability_aggregates_to_unbinned() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1).with_shots(Shots::Finite(120)).with_seed(8),
        );
        let tape = Tape::new(
            vec![Operation::Hadamard { wire: 0usize.into() }],
            vec![Measurement::probability(Wires::range(0))],
        );
        dev.execute(&tape).unwrap();

        let unbinned = match dev.estimate_probability(None, None, None).unwrap() {
            ProbResult::Vector(probs) => probs,
            other => panic!("unexpected result {:?}", other),
        };
        let bins = match dev.estimate_probability(None, None, Some(30)).unwrap() {
            ProbResult::Binned(bins) => bins,
            other => panic!("unexpected result {:?}", other),
        };
        assert_eq!(bins.len(), 4);
        for state in 0..2 {
            let aggregated: f64 =
                bins.iter().map(|bin| bin[state] * 30.0).sum::<f64>() / 120.0;
            assert_relative_eq!(aggregated, unbinned[state], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_expval_rx_half_pi() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![Operation::RX {
                theta: FRAC_PI_2,
                wire: 0usize.into(),
            }],
            vec![
                Measurement::expval(Observable::PauliZ { wire: 0usize.into() }),
                Measurement::var(Observable::PauliZ { wire: 0usize.into() }),
            ],
        );
        let result = dev.execute(&tape).unwrap();
        let values = result.as_single().unwrap();
        assert_relative_eq!(values[0].as_scalar().unwrap(), 0.0, epsilon = 1e-10);
        assert_relative_eq!(values[1].as_scalar().unwrap(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_expval_invariant_under_factor_order() {
        // Z(2) (x) I(0) (x) I(1) equals I(0) (x) I(1) (x) Z(2).
        let ops = vec![Operation::PauliX { wire: 2usize.into() }];
        let listed_first = Observable::Tensor {
            factors: vec![
                Observable::PauliZ { wire: 2usize.into() },
                Observable::Identity { wire: 0usize.into() },
                Observable::Identity { wire: 1usize.into() },
            ],
        };
        let listed_last = Observable::Tensor {
            factors: vec![
                Observable::Identity { wire: 0usize.into() },
                Observable::Identity { wire: 1usize.into() },
                Observable::PauliZ { wire: 2usize.into() },
            ],
        };

        for obs in [listed_first, listed_last] {
            let mut dev = analytic_device(3);
            let tape = Tape::new(ops.clone(), vec![Measurement::expval(obs)]);
            let result = dev.execute(&tape).unwrap();
            let value = result.as_single().unwrap()[0].as_scalar().unwrap();
            assert_relative_eq!(value, -1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_expval_pauli_x_uses_rotations() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![Operation::Hadamard { wire: 0usize.into() }],
            vec![Measurement::expval(Observable::PauliX { wire: 0usize.into() })],
        );
        let result = dev.execute(&tape).unwrap();
        let value = result.as_single().unwrap()[0].as_scalar().unwrap();
        assert_relative_eq!(value, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_projector_expval_and_var() {
        let mut dev = analytic_device(2);
        let projector = Observable::Projector {
            basis_state: vec![0, 0],
            wires: vec![0usize.into(), 1usize.into()],
        };
        let tape = Tape::new(
            bell_ops(),
            vec![
                Measurement::expval(projector.clone()),
                Measurement::var(projector),
            ],
        );
        let result = dev.execute(&tape).unwrap();
        let values = result.as_single().unwrap();
        assert_relative_eq!(values[0].as_scalar().unwrap(), 0.5, epsilon = 1e-10);
        assert_relative_eq!(values[1].as_scalar().unwrap(), 0.25, epsilon = 1e-10);
    }

    #[test]
    fn test_hamiltonian_expval_rejected() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![],
            vec![Measurement::expval(Observable::Hamiltonian {
                coeffs: vec![1.0],
                terms: vec![Observable::PauliZ { wire: 0usize.into() }],
            })],
        );
        assert!(matches!(
            dev.execute(&tape),
            Err(DeviceError::Core(_)) | Err(DeviceError::EigenvaluesUndefined { .. })
        ));
    }

    #[test]
    fn test_sample_without_shots_fails() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![],
            vec![Measurement::sample(Observable::PauliZ { wire: 0usize.into() })],
        );
        assert!(matches!(dev.execute(&tape), Err(DeviceError::ShotsRequired)));
    }

    #[test]
    fn test_sampling_converges_to_analytic() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1)
                .with_shots(Shots::Finite(20_000))
                .with_seed(1234),
        );
        let theta = 0.62;
        let tape = Tape::new(
            vec![Operation::RX {
                theta,
                wire: 0usize.into(),
            }],
            vec![Measurement::expval(Observable::PauliZ { wire: 0usize.into() })],
        );
        let result = dev.execute(&tape).unwrap();
        let value = result.as_single().unwrap()[0].as_scalar().unwrap();
        assert_relative_eq!(value, theta.cos(), epsilon = 0.03);
    }

    #[test]
    fn test_raw_samples_shape() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(2).with_shots(Shots::Finite(17)).with_seed(3),
        );
        let tape = Tape::new(
            vec![Operation::PauliX { wire: 0usize.into() }],
            vec![Measurement::sample_wires(Wires::range(0))],
        );
        let result = dev.execute(&tape).unwrap();
        match &result.as_single().unwrap()[0] {
            MeasurementValue::Matrix(rows) => {
                assert_eq!(rows.len(), 17);
                for row in rows {
                    assert_eq!(row, &[1.0, 0.0]);
                }
            }
            other => panic!("unexpected sample value {:?}", other),
        }
    }

    #[test]
    fn test_shot_vector_produces_one_row_per_copy() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1)
                .with_shots(Shots::vector(&[10, 10, 50]))
                .with_seed(99),
        );
        let tape = Tape::new(
            vec![],
            vec![Measurement::expval(Observable::PauliZ { wire: 0usize.into() })],
        );
        let result = dev.execute(&tape).unwrap();
        let rows = result.as_batched().unwrap();
        assert_eq!(rows.len(), 3);
        for row in rows {
            // |0> always samples +1 regardless of shot count.
            assert_relative_eq!(row[0].as_scalar().unwrap(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_state_measurement_must_be_alone() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![],
            vec![
                Measurement::state(Wires::range(0)),
                Measurement::expval(Observable::PauliZ { wire: 0usize.into() }),
            ],
        );
        assert!(matches!(
            dev.execute(&tape),
            Err(DeviceError::StateAccess { .. })
        ));
    }

    #[test]
    fn test_state_measurement_custom_labels_rejected() {
        let config = DeviceConfig::new(0).with_wires(Wires::new(["a", "b"]).unwrap());
        let mut dev = QubitDevice::dense(config);
        let tape = Tape::new(vec![], vec![Measurement::state(Wires::range(0))]);
        assert!(matches!(
            dev.execute(&tape),
            Err(DeviceError::StateAccess { .. })
        ));
    }

    #[test]
    fn test_state_and_density_matrix_access() {
        let mut dev = analytic_device(2);
        let tape = Tape::new(bell_ops(), vec![Measurement::state(Wires::range(0))]);
        let result = dev.execute(&tape).unwrap();
        match &result.as_single().unwrap()[0] {
            MeasurementValue::State(amps) => {
                assert_eq!(amps.len(), 4);
                assert_relative_eq!(amps[0].re, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
            }
            other => panic!("unexpected state value {:?}", other),
        }

        match dev.density_matrix(&Wires::new([0usize]).unwrap()).unwrap() {
            MeasurementValue::DensityMatrix { matrix, dim } => {
                assert_eq!(dim, 2);
                assert_relative_eq!(matrix[0].re, 0.5, epsilon = 1e-12);
                assert_relative_eq!(matrix[3].re, 0.5, epsilon = 1e-12);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_vn_entropy_of_bell_state() {
        let mut dev = analytic_device(2);
        let tape = Tape::new(
            bell_ops(),
            vec![Measurement::vn_entropy(
                Wires::new([0usize]).unwrap(),
                Some(2.0),
            )],
        );
        let result = dev.execute(&tape).unwrap();
        let entropy = result.as_single().unwrap()[0].as_scalar().unwrap();
        assert_relative_eq!(entropy, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_basis_state_preparation() {
        let mut dev = analytic_device(2);
        dev.apply(
            &[Operation::BasisState {
                bits: vec![1, 0],
                wires: vec![0usize.into(), 1usize.into()],
            }],
            &[],
        )
        .unwrap();
        let probs = dev.analytic_probability(None).unwrap();
        assert_relative_eq!(probs[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_state_prep_after_gate_rejected() {
        let mut dev = analytic_device(1);
        let result = dev.apply(
            &[
                Operation::Hadamard { wire: 0usize.into() },
                Operation::BasisState {
                    bits: vec![1],
                    wires: vec![0usize.into()],
                },
            ],
            &[],
        );
        assert!(matches!(
            result,
            Err(DeviceError::LateStatePreparation { .. })
        ));
    }

    #[test]
    fn test_snapshot_is_a_no_op() {
        let mut dev = analytic_device(1);
        dev.apply(
            &[
                Operation::Snapshot,
                Operation::PauliX { wire: 0usize.into() },
                Operation::Snapshot,
            ],
            &[],
        )
        .unwrap();
        let probs = dev.analytic_probability(None).unwrap();
        assert_relative_eq!(probs[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seeded_devices_reproduce_samples() {
        let run = || {
            let mut dev = QubitDevice::dense(
                DeviceConfig::new(1).with_shots(Shots::Finite(200)).with_seed(5),
            );
            let tape = Tape::new(
                vec![Operation::Hadamard { wire: 0usize.into() }],
                vec![Measurement::sample(Observable::PauliZ { wire: 0usize.into() })],
            );
            dev.execute(&tape).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_deterministic_samples_give_exact_expval() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1).with_shots(Shots::Finite(500)).with_seed(2),
        );
        let tape = Tape::new(
            vec![Operation::PauliX { wire: 0usize.into() }],
            vec![Measurement::expval(Observable::PauliZ { wire: 0usize.into() })],
        );
        let result = dev.execute(&tape).unwrap();
        // |1> is the only outcome, so every sampled eigenvalue is -1.
        let value = result.as_single().unwrap()[0].as_scalar().unwrap();
        assert_relative_eq!(value, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shot_range_past_buffer_is_clamped() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1).with_shots(Shots::Finite(10)).with_seed(17),
        );
        let tape = Tape::new(
            vec![Operation::Hadamard { wire: 0usize.into() }],
            vec![Measurement::probability(Wires::range(0))],
        );
        dev.execute(&tape).unwrap();

        let probs = match dev.estimate_probability(None, Some((0, 100)), None).unwrap() {
            ProbResult::Vector(probs) => probs,
            other => panic!("unexpected result {:?}", other),
        };
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        let obs = Observable::PauliZ { wire: 0usize.into() };
        let full = dev.expval(&obs, None, None).unwrap();
        let clamped = dev.expval(&obs, Some((0, 100)), None).unwrap();
        assert_eq!(full, clamped);
    }

    #[test]
    fn test_zero_bin_size_rejected() {
        let mut dev = QubitDevice::dense(
            DeviceConfig::new(1).with_shots(Shots::Finite(10)).with_seed(17),
        );
        let tape = Tape::new(
            vec![Operation::Hadamard { wire: 0usize.into() }],
            vec![Measurement::probability(Wires::range(0))],
        );
        dev.execute(&tape).unwrap();

        assert!(matches!(
            dev.estimate_probability(None, None, Some(0)),
            Err(DeviceError::InvalidBinSize)
        ));
        let obs = Observable::PauliZ { wire: 0usize.into() };
        assert!(matches!(
            dev.expval(&obs, None, Some(0)),
            Err(DeviceError::InvalidBinSize)
        ));
        let m = Measurement::sample(obs);
        assert!(matches!(
            dev.statistics(&[m], None, Some(0)),
            Err(DeviceError::InvalidBinSize)
        ));
    }

    #[test]
    fn test_execution_counter() {
        let mut dev = analytic_device(1);
        let tape = Tape::new(
            vec![],
            vec![Measurement::expval(Observable::PauliZ { wire: 0usize.into() })],
        );
        dev.execute(&tape).unwrap();
        dev.execute(&tape).unwrap();
        assert_eq!(dev.num_executions(), 2);
    }
}
