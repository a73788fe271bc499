//! Measurement requests and circuit tapes

use crate::error::Result;
use crate::observable::Observable;
use crate::operation::Operation;
use crate::wires::Wires;
use std::fmt;

/// The kind of statistic requested by a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    /// Expectation value of an observable
    Expectation,
    /// Variance of an observable
    Variance,
    /// Per-shot samples of an observable (or raw wire readout)
    Sample,
    /// Probability distribution over a wire subset
    Probability,
    /// The statevector (or reduced density matrix) itself
    State,
    /// Von Neumann entropy of a wire subset
    VnEntropy,
    /// Mutual information between two wire subsets
    MutualInfo,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementKind::Expectation => "expval",
            MeasurementKind::Variance => "var",
            MeasurementKind::Sample => "sample",
            MeasurementKind::Probability => "probs",
            MeasurementKind::State => "state",
            MeasurementKind::VnEntropy => "vn_entropy",
            MeasurementKind::MutualInfo => "mutual_info",
        };
        write!(f, "{}", name)
    }
}

/// One requested measurement
///
/// Observable-based kinds carry an observable; wire-based kinds carry the
/// wires directly. An empty wire set means "all device wires".
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub observable: Option<Observable>,
    pub wires: Wires,
    /// Second wire group, only used by mutual information
    pub wires_b: Option<Wires>,
    /// Logarithm base for entropy measures; natural log when unset
    pub log_base: Option<f64>,
}

impl Measurement {
    pub fn expval(observable: Observable) -> Self {
        Self::with_observable(MeasurementKind::Expectation, observable)
    }

    pub fn var(observable: Observable) -> Self {
        Self::with_observable(MeasurementKind::Variance, observable)
    }

    pub fn sample(observable: Observable) -> Self {
        Self::with_observable(MeasurementKind::Sample, observable)
    }

    /// Raw computational basis samples over the given wires
    ///
    /// An empty wire set samples every device wire.
    pub fn sample_wires(wires: Wires) -> Self {
        Self {
            kind: MeasurementKind::Sample,
            observable: None,
            wires,
            wires_b: None,
            log_base: None,
        }
    }

    pub fn probability(wires: Wires) -> Self {
        Self {
            kind: MeasurementKind::Probability,
            observable: None,
            wires,
            wires_b: None,
            log_base: None,
        }
    }

    /// The full state, or the reduced density matrix when wires are given
    pub fn state(wires: Wires) -> Self {
        Self {
            kind: MeasurementKind::State,
            observable: None,
            wires,
            wires_b: None,
            log_base: None,
        }
    }

    pub fn vn_entropy(wires: Wires, log_base: Option<f64>) -> Self {
        Self {
            kind: MeasurementKind::VnEntropy,
            observable: None,
            wires,
            wires_b: None,
            log_base,
        }
    }

    pub fn mutual_info(wires_a: Wires, wires_b: Wires, log_base: Option<f64>) -> Self {
        Self {
            kind: MeasurementKind::MutualInfo,
            observable: None,
            wires: wires_a,
            wires_b: Some(wires_b),
            log_base,
        }
    }

    fn with_observable(kind: MeasurementKind, observable: Observable) -> Self {
        // Tensor factors may repeat a wire; keep each label once.
        let wires = Wires::unique(observable.wires());
        Self {
            kind,
            observable: Some(observable),
            wires,
            wires_b: None,
            log_base: None,
        }
    }
}

/// An executable circuit: ordered operations plus requested measurements
///
/// Trainable parameter indices address the flattened gate-parameter stream
/// (operation order, each operation contributing `num_params()` slots).
/// Indices past the end of that stream denote parameters owned by the
/// measured observables.
#[derive(Debug, Clone, PartialEq)]
pub struct Tape {
    pub operations: Vec<Operation>,
    pub measurements: Vec<Measurement>,
    pub trainable_params: Vec<usize>,
}

impl Tape {
    /// Create a tape with every gate parameter marked trainable
    pub fn new(operations: Vec<Operation>, measurements: Vec<Measurement>) -> Self {
        let num_params: usize = operations.iter().map(|op| op.num_params()).sum();
        Self {
            operations,
            measurements,
            trainable_params: (0..num_params).collect(),
        }
    }

    /// Restrict the trainable parameter set
    pub fn with_trainable_params(mut self, trainable_params: Vec<usize>) -> Self {
        self.trainable_params = trainable_params;
        self
    }

    /// Total number of gate parameters in the flattened stream
    pub fn num_gate_params(&self) -> usize {
        self.operations.iter().map(|op| op.num_params()).sum()
    }

    /// The observables of all observable-based measurements, tape order
    pub fn observables(&self) -> Vec<&Observable> {
        self.measurements
            .iter()
            .filter_map(|m| m.observable.as_ref())
            .collect()
    }

    /// Gates rotating the state into the shared eigenbasis of all measured
    /// observables
    pub fn diagonalizing_gates(&self) -> Result<Vec<Operation>> {
        let mut gates = Vec::new();
        for obs in self.observables() {
            gates.extend(obs.diagonalizing_gates()?);
        }
        Ok(gates)
    }
}
