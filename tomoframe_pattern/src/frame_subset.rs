//! Frame subsets.
//!
//! A [`FrameSubset`] is one scheduled chunk of work: the per-dimension index
//! ranges of a dataset that a stage reads, processes and writes for a single
//! invocation.

use std::fmt::{Debug, Display};
use std::ops::Range;

use thiserror::Error;

use crate::{ArrayIndices, ArrayShape};

/// A frame subset error.
#[derive(Clone, Debug, Error)]
#[allow(missing_docs)]
pub enum FrameSubsetError {
    /// Start and shape differ in dimensionality.
    #[error("incompatible start {start:?} with shape {shape:?}")]
    IncompatibleStartShape {
        start: ArrayIndices,
        shape: ArrayShape,
    },
    /// Start and end are incompatible (mismatched rank, or end before start).
    #[error("incompatible start {start:?} with end {end:?}")]
    IncompatibleStartEnd {
        start: ArrayIndices,
        end: ArrayIndices,
    },
    /// An origin does not enclose the subset it is applied to.
    #[error("origin {origin:?} does not enclose subset starting at {start:?}")]
    IncompatibleOrigin {
        start: ArrayIndices,
        origin: ArrayIndices,
    },
}

/// A contiguous region of a dataset: one `(start, extent)` pair per dimension.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct FrameSubset {
    start: ArrayIndices,
    shape: ArrayShape,
}

impl Display for FrameSubset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_ranges().fmt(f)
    }
}

impl<T: IntoIterator<Item = Range<u64>>> From<T> for FrameSubset {
    fn from(ranges: T) -> Self {
        let (start, shape) = ranges
            .into_iter()
            .map(|range| (range.start, range.end.saturating_sub(range.start)))
            .unzip();
        Self { start, shape }
    }
}

impl FrameSubset {
    /// Create a new frame subset from a list of per-dimension [`Range`]s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        ranges.iter().cloned().into()
    }

    /// Create a new frame subset spanning `shape` from the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new frame subset from a start and a shape.
    ///
    /// # Errors
    /// Returns [`FrameSubsetError`] if `start` and `shape` differ in length.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, FrameSubsetError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(FrameSubsetError::IncompatibleStartShape { start, shape })
        }
    }

    /// Create a new frame subset from a start and an exclusive end.
    ///
    /// # Errors
    /// Returns [`FrameSubsetError`] if `start` and `end` differ in length or
    /// any element of `end` is less than `start`.
    pub fn new_with_start_end_exc(
        start: ArrayIndices,
        end: ArrayIndices,
    ) -> Result<Self, FrameSubsetError> {
        if start.len() != end.len() || std::iter::zip(&start, &end).any(|(s, e)| e < s) {
            Err(FrameSubsetError::IncompatibleStartEnd { start, end })
        } else {
            let shape = std::iter::zip(&start, end)
                .map(|(&s, e)| e - s)
                .collect();
            Ok(Self { start, shape })
        }
    }

    /// Clamp the subset to the domain within `end` (exclusive).
    ///
    /// This is the edge-clamp applied to padded work units: a range widened
    /// past a dataset boundary is silently truncated to `[0, end)`.
    ///
    /// # Errors
    /// Returns [`FrameSubsetError`] if `end` does not match the subset
    /// dimensionality.
    pub fn bound(&self, end: &[u64]) -> Result<Self, FrameSubsetError> {
        if end.len() != self.start.len() {
            return Err(FrameSubsetError::IncompatibleStartEnd {
                start: self.start.clone(),
                end: end.to_vec(),
            });
        }
        let start: ArrayIndices = std::iter::zip(&self.start, end)
            .map(|(&s, &e)| std::cmp::min(s, e))
            .collect();
        let end_exc = std::iter::zip(&self.start, &self.shape)
            .zip(end)
            .map(|((&s, &l), &e)| std::cmp::min(s + l, e))
            .collect();
        Self::new_with_start_end_exc(start, end_exc)
    }

    /// Express the subset relative to `origin`.
    ///
    /// Used to locate an unpadded write range within the padded block that
    /// was read for it.
    ///
    /// # Errors
    /// Returns [`FrameSubsetError`] if `origin` has the wrong dimensionality
    /// or lies beyond the subset start in any dimension.
    pub fn relative_to(&self, origin: &[u64]) -> Result<Self, FrameSubsetError> {
        if origin.len() != self.start.len()
            || std::iter::zip(&self.start, origin).any(|(s, o)| o > s)
        {
            return Err(FrameSubsetError::IncompatibleOrigin {
                start: self.start.clone(),
                origin: origin.to_vec(),
            });
        }
        Ok(Self {
            start: std::iter::zip(&self.start, origin).map(|(s, o)| s - o).collect(),
            shape: self.shape.clone(),
        })
    }

    /// Return the start of the subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the exclusive end of the subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(s, l)| s + l)
            .collect()
    }

    /// Return the subset as a list of per-dimension ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&s, &l)| s..s + l)
            .collect()
    }

    /// Return the dimensionality of the subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the number of elements of the subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the subset has a zero extent in any dimension.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&l| l == 0)
    }

    /// Returns true if the subset lies fully within an array of `shape`.
    #[must_use]
    pub fn inbounds_shape(&self, shape: &[u64]) -> bool {
        shape.len() == self.start.len()
            && std::iter::zip(self.end_exc(), shape).all(|(e, &s)| e <= s)
    }
}
