//! Axis labels.
//!
//! Each dataset dimension may carry an [`AxisLabel`]: a semantic name and a
//! unit (e.g. `rotation_angle`/`degrees`, `detector_x`/`pixels`). Stages
//! locate dimensions by semantic name rather than by position, so shape
//! transformations keep the labels consistent alongside the patterns.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An axis name lookup failure.
#[derive(Clone, Debug, Error)]
#[error("no dimension has the axis label {0}")]
pub struct UnknownAxisError(pub String);

/// The semantic label of one dataset dimension.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AxisLabel {
    /// The semantic name of the axis.
    pub name: String,
    /// The unit of the axis.
    pub unit: String,
}

impl AxisLabel {
    /// Create a new axis label.
    #[must_use]
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

impl Display for AxisLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.unit)
    }
}

/// The axis labels of a dataset: one optional label per dimension.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AxisLabels(Vec<Option<AxisLabel>>);

impl AxisLabels {
    /// Create unlabelled axes for a dataset of `rank` dimensions.
    #[must_use]
    pub fn new_unlabelled(rank: usize) -> Self {
        Self(vec![None; rank])
    }

    /// Create axis labels from `(name, unit)` pairs, one per dimension.
    #[must_use]
    pub fn new<N: Into<String>, U: Into<String>>(labels: impl IntoIterator<Item = (N, U)>) -> Self {
        Self(
            labels
                .into_iter()
                .map(|(name, unit)| Some(AxisLabel::new(name, unit)))
                .collect(),
        )
    }

    /// Return the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the label of dimension `dim`, if any.
    #[must_use]
    pub fn get(&self, dim: usize) -> Option<&AxisLabel> {
        self.0.get(dim).and_then(Option::as_ref)
    }

    /// Set or replace the label of dimension `dim`.
    ///
    /// Out-of-range dimensions are ignored.
    pub fn set(&mut self, dim: usize, label: AxisLabel) {
        if let Some(slot) = self.0.get_mut(dim) {
            *slot = Some(label);
        }
    }

    /// Return the index of the dimension whose label name equals `name`.
    ///
    /// # Errors
    /// Returns [`UnknownAxisError`] if no dimension carries the name.
    pub fn index_of(&self, name: &str) -> Result<usize, UnknownAxisError> {
        self.0
            .iter()
            .position(|label| label.as_ref().is_some_and(|l| l.name == name))
            .ok_or_else(|| UnknownAxisError(name.to_string()))
    }

    /// Return the index of the first dimension whose label name contains
    /// `fragment`.
    ///
    /// Stages use this to find e.g. the detector `x` axis without knowing
    /// the loader's exact naming.
    ///
    /// # Errors
    /// Returns [`UnknownAxisError`] if no dimension matches.
    pub fn index_containing(&self, fragment: &str) -> Result<usize, UnknownAxisError> {
        self.0
            .iter()
            .position(|label| label.as_ref().is_some_and(|l| l.name.contains(fragment)))
            .ok_or_else(|| UnknownAxisError(fragment.to_string()))
    }

    /// Return the labels with dimension `dim` removed.
    #[must_use]
    pub fn remove_dim(&self, dim: usize) -> Self {
        let mut labels = self.0.clone();
        if dim < labels.len() {
            labels.remove(dim);
        }
        Self(labels)
    }

    /// Return the labels with `count` unlabelled trailing dimensions
    /// appended.
    #[must_use]
    pub fn append_unlabelled(&self, count: usize) -> Self {
        let mut labels = self.0.clone();
        labels.extend(std::iter::repeat_n(None, count));
        Self(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_labels() -> AxisLabels {
        AxisLabels::new([
            ("rotation_angle", "degrees"),
            ("detector_y", "pixels"),
            ("detector_x", "pixels"),
        ])
    }

    #[test]
    fn lookup_by_name() {
        let labels = projection_labels();
        assert_eq!(labels.index_of("rotation_angle").unwrap(), 0);
        assert_eq!(labels.index_of("detector_x").unwrap(), 2);
        assert!(labels.index_of("detector").is_err());
        assert_eq!(labels.index_containing("detector").unwrap(), 1);
        assert!(labels.index_containing("voxel").is_err());
    }

    #[test]
    fn remove_and_append() {
        let labels = projection_labels();
        let removed = labels.remove_dim(1);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed.index_of("detector_x").unwrap(), 1);
        let appended = labels.append_unlabelled(2);
        assert_eq!(appended.len(), 5);
        assert!(appended.get(3).is_none());
    }

    #[test]
    fn set_replaces_label() {
        let mut labels = projection_labels();
        labels.set(0, AxisLabel::new("voxel_x", "voxels"));
        assert_eq!(labels.get(0).unwrap().to_string(), "voxel_x.voxels");
        assert!(labels.index_of("rotation_angle").is_err());
    }

    #[test]
    fn unlabelled_axes() {
        let labels = AxisLabels::new_unlabelled(3);
        assert_eq!(labels.len(), 3);
        assert!(labels.get(0).is_none());
        assert!(labels.index_of("anything").is_err());
    }
}
