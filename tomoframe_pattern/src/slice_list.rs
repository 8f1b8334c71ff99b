//! Slice lists.
//!
//! A [`SliceList`] is the decomposition plan of one stage over one dataset:
//! the ordered sequence of [`FrameSubset`] work units covering the full
//! slice-dimension space of a pattern, with at most a budgeted number of
//! frames along the primary slice dimension per unit.
//!
//! The sequence is deterministic and restartable: the plan is a pure function
//! of its inputs and units are computed on demand from a linear index, so
//! every worker process can rebuild the identical plan and select a disjoint
//! contiguous subrange with nothing shared beyond the unit count and a worker
//! index. Downstream code relies on this by associating work-unit index with
//! output-array index directly.

use std::iter::FusedIterator;
use std::ops::Range;

use thiserror::Error;

use crate::{unravel_index, ArrayShape, FrameSubset, PaddingMap, Pattern};

/// A slice list construction error.
#[derive(Clone, Debug, Error)]
#[allow(missing_docs)]
pub enum SliceListError {
    /// The frame budget is zero.
    #[error("the frame budget must be at least one frame")]
    ZeroFrameBudget,
    /// The pattern and dataset shape disagree on dimensionality.
    #[error("incompatible dimensionality {got}, expected {expected}")]
    IncompatibleDimensionality { got: usize, expected: usize },
    /// A fixed-size requirement cannot be met: the extent along the primary
    /// slice dimension is not divisible by the frame budget, so the final
    /// chunk would be truncated.
    #[error(
        "dimension {dim} with extent {extent} cannot be split into fixed chunks of {max_frames} frames"
    )]
    UnfixableChunk {
        dim: usize,
        extent: u64,
        max_frames: u64,
    },
    /// The work-unit count cannot be addressed.
    #[error("grid shape {0:?} holds more work units than can be addressed")]
    UnaddressableGrid(ArrayShape),
    /// A worker index at or beyond the worker count.
    #[error("worker index {index} out of range for {count} workers")]
    InvalidWorker { index: usize, count: usize },
}

/// The ordered work units of one stage over one dataset.
#[derive(Clone, Debug)]
pub struct SliceList {
    pattern: Pattern,
    shape: ArrayShape,
    max_frames: u64,
    padding: PaddingMap,
    fixed: bool,
    /// One extent per slice dimension in ascending dimension order; the
    /// primary dimension's entry is its chunk count.
    grid_shape: ArrayShape,
    primary: Option<usize>,
    len: usize,
}

impl SliceList {
    /// Build the decomposition plan of `pattern` over a dataset of `shape`.
    ///
    /// Work units hold at most `max_frames` frames along the primary slice
    /// dimension; other slice dimensions iterate at unit granularity,
    /// outermost first. `padding` widens each unit's read range, clamped at
    /// the dataset edges. With `fixed`, every unit must be exactly
    /// `max_frames` long.
    ///
    /// # Errors
    /// Returns [`SliceListError`] if `max_frames` is zero, the pattern does
    /// not match the shape's dimensionality, `fixed` is set and the primary
    /// extent is not divisible by `max_frames`, or the number of work units
    /// exceeds [`usize::MAX`].
    pub fn new(
        pattern: Pattern,
        shape: ArrayShape,
        max_frames: u64,
        padding: PaddingMap,
        fixed: bool,
    ) -> Result<Self, SliceListError> {
        if max_frames == 0 {
            return Err(SliceListError::ZeroFrameBudget);
        }
        if pattern.dimensionality() != shape.len() {
            return Err(SliceListError::IncompatibleDimensionality {
                got: pattern.dimensionality(),
                expected: shape.len(),
            });
        }
        let primary = pattern.primary_slice_dim();
        if let Some(dim) = primary {
            if fixed && shape[dim] % max_frames != 0 {
                return Err(SliceListError::UnfixableChunk {
                    dim,
                    extent: shape[dim],
                    max_frames,
                });
            }
        }
        let grid_shape: ArrayShape = pattern
            .slice_dims()
            .iter()
            .map(|&dim| {
                if Some(dim) == primary {
                    shape[dim].div_ceil(max_frames)
                } else {
                    shape[dim]
                }
            })
            .collect();
        let len = grid_shape
            .iter()
            .try_fold(1u64, |acc, &extent| acc.checked_mul(extent))
            .and_then(|units| usize::try_from(units).ok())
            .ok_or_else(|| SliceListError::UnaddressableGrid(grid_shape.clone()))?;
        Ok(Self {
            pattern,
            shape,
            max_frames,
            padding,
            fixed,
            grid_shape,
            primary,
            len,
        })
    }

    /// Return the number of work units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the plan holds no work units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the dataset shape the plan was built over.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the pattern the plan slices over.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Return the frame budget per work unit.
    #[must_use]
    pub fn max_frames(&self) -> u64 {
        self.max_frames
    }

    /// Returns true if every unit is exactly `max_frames` long.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Return the unpadded work unit at `index`: the range the stage's output
    /// is written to.
    ///
    /// Returns [`None`] if `index` is out of range.
    #[must_use]
    pub fn get_unpadded(&self, index: usize) -> Option<FrameSubset> {
        let grid = unravel_index(index as u64, &self.grid_shape)?;
        let mut ranges: Vec<Range<u64>> = self
            .shape
            .iter()
            .map(|&extent| 0..extent)
            .collect();
        for (&dim, &g) in std::iter::zip(self.pattern.slice_dims(), grid.iter()) {
            ranges[dim] = if Some(dim) == self.primary {
                let start = g * self.max_frames;
                start..(start + self.max_frames).min(self.shape[dim])
            } else {
                g..g + 1
            };
        }
        Some(FrameSubset::new_with_ranges(&ranges))
    }

    /// Return the padded work unit at `index`: the range the stage's input is
    /// read from.
    ///
    /// Each dimension with a padding entry is widened by its `(before,
    /// after)` amounts then clamped to `[0, extent)`; clamping silently
    /// truncates at the dataset edges, so the range never indexes outside
    /// the data.
    ///
    /// Returns [`None`] if `index` is out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<FrameSubset> {
        let unit = self.get_unpadded(index)?;
        if self.padding.is_empty() {
            return Some(unit);
        }
        let mut ranges = unit.to_ranges();
        for (&dim, amount) in &self.padding {
            if let Some(range) = ranges.get_mut(dim) {
                range.start = range.start.saturating_sub(amount.before);
                range.end = (range.end + amount.after).min(self.shape[dim]);
            }
        }
        Some(FrameSubset::new_with_ranges(&ranges))
    }

    /// Return a lazy iterator over the padded work units.
    #[must_use]
    pub fn iter(&self) -> SliceListIter<'_> {
        SliceListIter {
            list: self,
            range: 0..self.len,
        }
    }

    /// Return the iterator over the contiguous subrange of work units
    /// assigned to worker `index` of `count`.
    ///
    /// The subranges of all workers are disjoint and cover the plan; workers
    /// need only agree on the plan inputs and the two scalars.
    ///
    /// # Errors
    /// Returns [`SliceListError::InvalidWorker`] if `index >= count` or
    /// `count` is zero.
    pub fn subrange(&self, index: usize, count: usize) -> Result<SliceListIter<'_>, SliceListError> {
        if count == 0 || index >= count {
            return Err(SliceListError::InvalidWorker { index, count });
        }
        let base = self.len / count;
        let remainder = self.len % count;
        let start = index * base + index.min(remainder);
        let end = start + base + usize::from(index < remainder);
        Ok(SliceListIter {
            list: self,
            range: start..end,
        })
    }
}

impl<'a> IntoIterator for &'a SliceList {
    type Item = FrameSubset;
    type IntoIter = SliceListIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A lazy iterator over the padded work units of a [`SliceList`].
#[derive(Clone)]
pub struct SliceListIter<'a> {
    list: &'a SliceList,
    range: Range<usize>,
}

impl SliceListIter<'_> {
    /// Return the work-unit index of the next unit to be yielded.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.range.start
    }
}

impl Iterator for SliceListIter<'_> {
    type Item = FrameSubset;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }
        let index = self.range.start;
        self.range.start += 1;
        self.list.get(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let length = self.range.end.saturating_sub(self.range.start);
        (length, Some(length))
    }
}

impl DoubleEndedIterator for SliceListIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.range.end > self.range.start {
            self.range.end -= 1;
            self.list.get(self.range.end)
        } else {
            None
        }
    }
}

impl ExactSizeIterator for SliceListIter<'_> {}

impl FusedIterator for SliceListIter<'_> {}
