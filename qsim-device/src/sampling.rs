//! Finite-shot sampling
//!
//! Samples computational-basis outcomes from a probability distribution
//! using the alias method, and stores the drawn shots as bit rows for
//! downstream statistics.

use rand::Rng;

use crate::basis::index_to_bits;
use crate::error::{DeviceError, Result};

/// Alias table for O(1) sampling from a discrete distribution
///
/// Uses Walker's method: O(n) setup, then each draw costs two uniform
/// variates and one comparison.
pub struct AliasTable {
    /// Probability threshold for each index
    prob: Vec<f64>,
    /// Alias index for each index
    alias: Vec<usize>,
}

impl AliasTable {
    /// Create a new alias table from a probability distribution
    ///
    /// # Arguments
    /// * `probabilities` - Distribution over outcomes (must sum to ~1.0)
    pub fn new(probabilities: &[f64]) -> Result<Self> {
        let n = probabilities.len();
        if n == 0 {
            return Err(DeviceError::InvalidWires {
                reason: "cannot sample from an empty distribution".to_string(),
            });
        }

        let mut prob = vec![0.0; n];
        let mut alias = vec![0; n];

        let mut scaled: Vec<f64> = probabilities.iter().map(|&p| p * n as f64).collect();

        let mut small = Vec::new();
        let mut large = Vec::new();
        for (i, &p) in scaled.iter().enumerate() {
            if p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while !small.is_empty() && !large.is_empty() {
            let s = small.pop().unwrap();
            let l = large.pop().unwrap();
            prob[s] = scaled[s];
            alias[s] = l;

            scaled[l] = (scaled[l] + scaled[s]) - 1.0;

            if scaled[l] < 1.0 {
                small.push(l);
            } else {
                large.push(l);
            }
        }

        // Remaining entries are numerically 1.0 up to rounding.
        for l in large {
            prob[l] = 1.0;
        }
        for s in small {
            prob[s] = 1.0;
        }

        Ok(Self { prob, alias })
    }

    /// Sample an outcome index in O(1) time
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.prob.len();
        let i = rng.gen_range(0..n);
        if rng.gen::<f64>() < self.prob[i] {
            i
        } else {
            self.alias[i]
        }
    }
}

/// Raw samples drawn from a device, one bit row per shot
///
/// Rows follow the device wire order, first wire in the leftmost column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    data: Vec<u8>,
    shots: usize,
    num_wires: usize,
}

impl SampleBuffer {
    /// Draw `shots` samples from `probabilities` over `num_wires` wires
    pub fn generate<R: Rng + ?Sized>(
        probabilities: &[f64],
        num_wires: usize,
        shots: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let table = AliasTable::new(probabilities)?;
        let mut data = Vec::with_capacity(shots * num_wires);
        for _ in 0..shots {
            let outcome = table.sample(rng) as u64;
            data.extend(index_to_bits(outcome, num_wires)?);
        }
        Ok(Self {
            data,
            shots,
            num_wires,
        })
    }

    pub fn shots(&self) -> usize {
        self.shots
    }

    pub fn num_wires(&self) -> usize {
        self.num_wires
    }

    /// Resolve an optional shot range against the stored shots
    ///
    /// Ends past the buffer are clamped, and a start past the end yields
    /// an empty window.
    pub fn shot_window(&self, shot_range: Option<(usize, usize)>) -> (usize, usize) {
        let (start, end) = shot_range.unwrap_or((0, self.shots));
        let end = end.min(self.shots);
        (start.min(end), end)
    }

    /// The bit row for one shot
    pub fn row(&self, shot: usize) -> &[u8] {
        &self.data[shot * self.num_wires..(shot + 1) * self.num_wires]
    }

    /// Iterate over shot rows in draw order
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.num_wires)
    }

    /// Column of bits for a single wire position across all shots
    pub fn column(&self, wire_index: usize) -> Vec<u8> {
        self.rows().map(|row| row[wire_index]).collect()
    }
}
