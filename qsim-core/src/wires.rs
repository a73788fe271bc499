//! Wire labels and ordered wire sets
//!
//! Wires identify qubit slots by label. Labels may be integers or strings;
//! the order in which labels were registered on a device defines the
//! canonical device wire order, and all positional indexing into state
//! tensors goes through that order.

use crate::error::{CoreError, Result};
use std::fmt;

/// A single wire label, either numeric or named
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireLabel {
    /// Integer label, e.g. `0`, `-1`
    Num(i64),
    /// String label, e.g. `"ancilla"`
    Name(String),
}

impl fmt::Display for WireLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireLabel::Num(n) => write!(f, "{}", n),
            WireLabel::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for WireLabel {
    fn from(n: i64) -> Self {
        WireLabel::Num(n)
    }
}

impl From<usize> for WireLabel {
    fn from(n: usize) -> Self {
        WireLabel::Num(n as i64)
    }
}

impl From<&str> for WireLabel {
    fn from(s: &str) -> Self {
        WireLabel::Name(s.to_string())
    }
}

impl From<String> for WireLabel {
    fn from(s: String) -> Self {
        WireLabel::Name(s)
    }
}

/// An ordered set of unique wire labels
///
/// # Example
/// ```
/// use qsim_core::wires::Wires;
///
/// let wires = Wires::range(3);
/// assert_eq!(wires.len(), 3);
/// assert_eq!(wires.index_of(&1usize.into()), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wires {
    labels: Vec<WireLabel>,
}

impl Wires {
    /// Create a wire set from labels, rejecting duplicates
    pub fn new<I, L>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<WireLabel>,
    {
        let labels: Vec<WireLabel> = labels.into_iter().map(Into::into).collect();
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(CoreError::DuplicateWire {
                    label: label.to_string(),
                });
            }
        }
        Ok(Self { labels })
    }

    /// Create a wire set from labels, keeping the first occurrence of each
    pub fn unique<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<WireLabel>,
    {
        let mut out: Vec<WireLabel> = Vec::new();
        for label in labels.into_iter().map(Into::into) {
            if !out.contains(&label) {
                out.push(label);
            }
        }
        Self { labels: out }
    }

    /// Create the canonical numeric wire set `[0, 1, ..., n - 1]`
    pub fn range(n: usize) -> Self {
        Self {
            labels: (0..n as i64).map(WireLabel::Num).collect(),
        }
    }

    /// Number of wires
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over the labels in order
    pub fn iter(&self) -> impl Iterator<Item = &WireLabel> {
        self.labels.iter()
    }

    /// The label at a given position
    pub fn label(&self, index: usize) -> Option<&WireLabel> {
        self.labels.get(index)
    }

    /// Whether the set contains a label
    pub fn contains(&self, label: &WireLabel) -> bool {
        self.labels.contains(label)
    }

    /// Position of a label within this set
    pub fn index_of(&self, label: &WireLabel) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Map the labels of `other` to their positional indices in this set
    ///
    /// This is the device wire mapping: positions are indices into the
    /// canonical wire order of `self`.
    pub fn indices_of(&self, other: &Wires) -> Result<Vec<usize>> {
        other
            .iter()
            .map(|label| {
                self.index_of(label).ok_or_else(|| CoreError::WireNotFound {
                    label: label.to_string(),
                })
            })
            .collect()
    }

    /// The labels of `other` reordered to match their position in `self`
    pub fn ordered_subset(&self, other: &Wires) -> Wires {
        let labels = self
            .labels
            .iter()
            .filter(|l| other.contains(l))
            .cloned()
            .collect();
        Wires { labels }
    }

    /// The labels of `self` that do not appear in `other`
    pub fn difference(&self, other: &Wires) -> Wires {
        let labels = self
            .labels
            .iter()
            .filter(|l| !other.contains(l))
            .cloned()
            .collect();
        Wires { labels }
    }

    /// Whether the labels are exactly `0..n` in order
    ///
    /// Several measurement kinds (state access, entropies) are only
    /// defined for devices without relabelled wires.
    pub fn is_canonical(&self) -> bool {
        self.labels
            .iter()
            .enumerate()
            .all(|(i, l)| matches!(l, WireLabel::Num(n) if *n == i as i64))
    }
}

impl fmt::Display for Wires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, "]")
    }
}
