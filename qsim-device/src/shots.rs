//! Shot configuration
//!
//! A device either runs analytically (exact statistics from the final
//! state) or draws a finite number of samples. Shot vectors describe a
//! sequence of sample batches executed against the same final state, with
//! one result row produced per copy of each batch.

/// One entry of a shot vector: `copies` consecutive batches of `shots`
/// samples each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotBatch {
    pub shots: u64,
    pub copies: u64,
}

/// Shot configuration of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shots {
    /// Exact statistics from the state vector
    Analytic,
    /// A single batch of samples
    Finite(u64),
    /// A sequence of sample batches, e.g. `[(10, 3), (100, 1)]` for
    /// three 10-shot rows followed by one 100-shot row
    Vector(Vec<ShotBatch>),
}

impl Shots {
    /// Build a shot vector from raw shot counts, merging consecutive
    /// equal entries into copies
    ///
    /// # Example
    /// ```
    /// use qsim_device::shots::{ShotBatch, Shots};
    ///
    /// let shots = Shots::vector(&[10, 10, 50]);
    /// assert_eq!(
    ///     shots,
    ///     Shots::Vector(vec![
    ///         ShotBatch { shots: 10, copies: 2 },
    ///         ShotBatch { shots: 50, copies: 1 },
    ///     ])
    /// );
    /// ```
    pub fn vector(counts: &[u64]) -> Self {
        let mut batches: Vec<ShotBatch> = Vec::new();
        for &shots in counts {
            match batches.last_mut() {
                Some(last) if last.shots == shots => last.copies += 1,
                _ => batches.push(ShotBatch { shots, copies: 1 }),
            }
        }
        Shots::Vector(batches)
    }

    /// Total number of samples drawn across all batches
    pub fn total_shots(&self) -> u64 {
        match self {
            Shots::Analytic => 0,
            Shots::Finite(shots) => *shots,
            Shots::Vector(batches) => {
                batches.iter().map(|b| b.shots * b.copies).sum()
            }
        }
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self, Shots::Analytic)
    }

    /// Whether this configuration produces one result row per batch copy
    pub fn is_vector(&self) -> bool {
        matches!(self, Shots::Vector(_))
    }
}
