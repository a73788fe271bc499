//! Basis-state codec
//!
//! Converts between integer basis-state indices and bit vectors, and
//! enumerates the full basis for a wire count. The convention throughout
//! is big-endian: the first wire is the most significant bit.

use crate::error::{DeviceError, Result};

/// Largest wire count representable as a `u64` basis index
pub const MAX_INDEX_WIRES: usize = 63;

/// Decompose a basis-state index into bits, first wire first
///
/// # Example
/// ```
/// use qsim_device::basis::index_to_bits;
///
/// assert_eq!(index_to_bits(5, 3).unwrap(), vec![1, 0, 1]);
/// ```
pub fn index_to_bits(index: u64, num_wires: usize) -> Result<Vec<u8>> {
    if num_wires > MAX_INDEX_WIRES {
        return Err(DeviceError::CapacityExceeded {
            requested: num_wires,
            max: MAX_INDEX_WIRES,
        });
    }
    Ok((0..num_wires)
        .map(|i| ((index >> (num_wires - 1 - i)) & 1) as u8)
        .collect())
}

/// Recompose a bit vector into a basis-state index, first bit most
/// significant
pub fn bits_to_index(bits: &[u8]) -> u64 {
    bits.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b))
}

/// Big-endian positional weights for `k` selected wires: `2^(k-1-i)`
pub fn bit_weights(k: usize) -> Vec<u64> {
    (0..k).map(|i| 1u64 << (k - 1 - i)).collect()
}

/// Enumerate all basis states for `num_wires` wires in ascending index
/// order, one row of bits per state
///
/// For `2 < num_wires < 32` the rows are produced by decomposing a dense
/// index counter, which is the fast path. Outside that window an odometer
/// generator produces rows one at a time, trading speed for peak memory.
/// Both paths produce bit-identical output.
pub fn basis_states(num_wires: usize) -> Vec<Vec<u8>> {
    if 2 < num_wires && num_wires < 32 {
        basis_states_counter(num_wires)
    } else {
        basis_states_odometer(num_wires)
    }
}

fn basis_states_counter(num_wires: usize) -> Vec<Vec<u8>> {
    (0..1u64 << num_wires)
        .map(|index| {
            (0..num_wires)
                .map(|i| ((index >> (num_wires - 1 - i)) & 1) as u8)
                .collect()
        })
        .collect()
}

fn basis_states_odometer(num_wires: usize) -> Vec<Vec<u8>> {
    let total = 1usize << num_wires;
    let mut rows = Vec::with_capacity(total);
    let mut row = vec![0u8; num_wires];
    rows.push(row.clone());
    for _ in 1..total {
        // Increment the rightmost bit with carry.
        for bit in row.iter_mut().rev() {
            if *bit == 0 {
                *bit = 1;
                break;
            }
            *bit = 0;
        }
        rows.push(row.clone());
    }
    rows
}

/// Stable argsort of a slice of indices
pub fn argsort(values: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| values[i]);
    order
}
