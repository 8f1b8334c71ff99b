//! Work-unit padding.
//!
//! A stage that needs neighbour context (e.g. a filter with a convolution
//! footprint) declares per-dimension overlap through [`Padding`]. Requests
//! accumulate by summation into a single per-dimension map of `(before,
//! after)` amounts; the slice list applies the map to each work unit's read
//! range, clamping at the dataset edges.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::Pattern;

/// The side(s) of a dimension a padding request applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PadSide {
    /// Pad before the range start only.
    Before,
    /// Pad after the range end only.
    After,
    /// Pad both sides.
    Both,
}

/// The accumulated pad amounts for one dimension.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PadAmount {
    /// Elements added before the range start.
    pub before: u64,
    /// Elements added after the range end.
    pub after: u64,
}

/// The resolved per-dimension padding of a stage's work units.
pub type PaddingMap = BTreeMap<usize, PadAmount>;

/// A multi-frame padding request on a pattern with no main dimension.
#[derive(Clone, Debug, Error)]
#[error("pattern {0} has no main dimension to pad multi frames over")]
pub struct NoPrimaryDimensionError(pub String);

/// A padding request naming a dimension outside the active pattern.
///
/// Only raised in strict mode; the default permissive mode logs a warning and
/// ignores the request.
#[derive(Clone, Debug, Error)]
#[error("dimension {dim} is not associated with the pattern {pattern}")]
pub struct PaddingDimensionError {
    /// The requested dimension.
    pub dim: usize,
    /// The active pattern name.
    pub pattern: String,
}

/// Accumulates the padding requests of one stage against one pattern.
#[derive(Clone, Debug)]
pub struct Padding {
    pattern_name: String,
    pattern: Pattern,
    amounts: BTreeMap<usize, PadAmount>,
    strict: bool,
}

impl Padding {
    /// Create a padding accumulator for `pattern`.
    ///
    /// Requests naming a dimension outside the pattern are logged and
    /// ignored.
    #[must_use]
    pub fn new(pattern_name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            pattern_name: pattern_name.into(),
            pattern,
            amounts: BTreeMap::new(),
            strict: false,
        }
    }

    /// Create a padding accumulator that rejects requests naming a dimension
    /// outside the pattern with [`PaddingDimensionError`].
    #[must_use]
    pub fn strict(pattern_name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            strict: true,
            ..Self::new(pattern_name, pattern)
        }
    }

    /// Return the name of the pattern the padding applies to.
    #[must_use]
    pub fn pattern_name(&self) -> &str {
        &self.pattern_name
    }

    /// Pad all edges of a frame with the same amount (i.e. pad both sides of
    /// every core dimension).
    pub fn pad_frame_edges(&mut self, amount: u64) {
        for dim in self.pattern.core_dims().to_vec() {
            self.add(dim, PadSide::Both, amount);
        }
    }

    /// Add `amount` extra frames before and after the current frames (i.e.
    /// pad both sides of the pattern's main slice dimension).
    ///
    /// # Errors
    /// Returns [`NoPrimaryDimensionError`] if the pattern declares no main
    /// dimension.
    pub fn pad_multi_frames(&mut self, amount: u64) -> Result<(), NoPrimaryDimensionError> {
        let main = self
            .pattern
            .main_dim()
            .ok_or_else(|| NoPrimaryDimensionError(self.pattern_name.clone()))?;
        self.add(main, PadSide::Both, amount);
        Ok(())
    }

    /// Pad an individually specified dimension and side.
    ///
    /// A request naming a dimension outside the pattern's dimension set is
    /// ignored with a warning in the default permissive mode.
    ///
    /// # Errors
    /// Returns [`PaddingDimensionError`] for such a request in strict mode.
    pub fn pad_direction(
        &mut self,
        dim: usize,
        side: PadSide,
        amount: u64,
    ) -> Result<(), PaddingDimensionError> {
        if !self.pattern.contains_dim(dim) {
            if self.strict {
                return Err(PaddingDimensionError {
                    dim,
                    pattern: self.pattern_name.clone(),
                });
            }
            log::warn!(
                "dimension {dim} is not associated with the pattern {}, ignoring padding request",
                self.pattern_name
            );
            return Ok(());
        }
        self.add(dim, side, amount);
        Ok(())
    }

    fn add(&mut self, dim: usize, side: PadSide, amount: u64) {
        let entry = self.amounts.entry(dim).or_default();
        if matches!(side, PadSide::Before | PadSide::Both) {
            entry.before += amount;
        }
        if matches!(side, PadSide::After | PadSide::Both) {
            entry.after += amount;
        }
    }

    /// Resolve the accumulated requests into a per-dimension map, dropping
    /// dimensions whose total pad amount is zero.
    #[must_use]
    pub fn resolve(&self) -> PaddingMap {
        self.amounts
            .iter()
            .filter(|(_, amount)| amount.before + amount.after > 0)
            .map(|(&dim, &amount)| (dim, amount))
            .collect()
    }
}
