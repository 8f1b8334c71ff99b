//! Data patterns.
//!
//! A [`Pattern`] splits a dataset's dimensions into *core* dimensions, which a
//! stage must receive in full for each work unit, and *slice* dimensions,
//! which the framework partitions across work units. A dataset may carry
//! several named patterns simultaneously (e.g. `PROJECTION` and `SINOGRAM`
//! views of the same array); a [`PatternSet`] holds them and derives new sets
//! when a stage's output dataset adds or removes dimensions.

use std::collections::BTreeMap;

use thiserror::Error;

/// An invalid pattern error.
#[derive(Clone, Debug, Error)]
#[allow(missing_docs)]
pub enum InvalidPatternError {
    /// Core and slice dimensions overlap.
    #[error("pattern {name}: core dimensions {core:?} overlap slice dimensions {slice:?}")]
    OverlappingDimensions {
        name: String,
        core: Vec<usize>,
        slice: Vec<usize>,
    },
    /// Core and slice dimensions do not cover `0..rank` exactly once.
    #[error("pattern {name}: core {core:?} and slice {slice:?} do not cover all {rank} dimensions")]
    IncompleteCover {
        name: String,
        core: Vec<usize>,
        slice: Vec<usize>,
        rank: usize,
    },
    /// The designated main dimension is not a slice dimension.
    #[error("pattern {name}: main dimension {main} is not a slice dimension")]
    MainNotSlice { name: String, main: usize },
}

/// An unknown pattern name error.
#[derive(Clone, Debug, Error)]
#[error("pattern {0} is not associated with this dataset")]
pub struct UnknownPatternError(pub String);

/// A split of a dataset's dimensions into core and slice roles.
///
/// The optional *main* dimension is the primary slice dimension: the one that
/// frame budgets and multi-frame padding apply to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    core_dims: Vec<usize>,
    slice_dims: Vec<usize>,
    main_dim: Option<usize>,
}

impl Pattern {
    fn validate(
        name: &str,
        core: &[usize],
        slice: &[usize],
        main: Option<usize>,
    ) -> Result<(), InvalidPatternError> {
        let rank = core.len() + slice.len();
        if core.iter().any(|dim| slice.contains(dim)) {
            return Err(InvalidPatternError::OverlappingDimensions {
                name: name.to_string(),
                core: core.to_vec(),
                slice: slice.to_vec(),
            });
        }
        let covered = (0..rank).all(|dim| core.contains(&dim) || slice.contains(&dim));
        if !covered {
            return Err(InvalidPatternError::IncompleteCover {
                name: name.to_string(),
                core: core.to_vec(),
                slice: slice.to_vec(),
                rank,
            });
        }
        if let Some(main) = main {
            if !slice.contains(&main) {
                return Err(InvalidPatternError::MainNotSlice {
                    name: name.to_string(),
                    main,
                });
            }
        }
        Ok(())
    }

    fn new_validated(
        name: &str,
        mut core: Vec<usize>,
        mut slice: Vec<usize>,
        main: Option<usize>,
    ) -> Result<Self, InvalidPatternError> {
        Self::validate(name, &core, &slice, main)?;
        core.sort_unstable();
        slice.sort_unstable();
        Ok(Self {
            core_dims: core,
            slice_dims: slice,
            main_dim: main,
        })
    }

    /// Return the core dimension indices, ascending.
    #[must_use]
    pub fn core_dims(&self) -> &[usize] {
        &self.core_dims
    }

    /// Return the slice dimension indices, ascending.
    #[must_use]
    pub fn slice_dims(&self) -> &[usize] {
        &self.slice_dims
    }

    /// Return the designated main (primary slice) dimension, if any.
    #[must_use]
    pub fn main_dim(&self) -> Option<usize> {
        self.main_dim
    }

    /// Return the primary slice dimension used for work-unit chunking.
    ///
    /// The main dimension if one is designated, otherwise the highest-index
    /// (fastest-changing) slice dimension. [`None`] if the pattern has no
    /// slice dimensions.
    #[must_use]
    pub fn primary_slice_dim(&self) -> Option<usize> {
        self.main_dim.or_else(|| self.slice_dims.last().copied())
    }

    /// Return the total number of dimensions covered by the pattern.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.core_dims.len() + self.slice_dims.len()
    }

    /// Returns true if `dim` is one of the pattern's dimensions.
    #[must_use]
    pub fn contains_dim(&self, dim: usize) -> bool {
        dim < self.dimensionality()
    }

    /// The pattern with `dim` removed and higher dimensions re-indexed down.
    ///
    /// Returns [`None`] if no dimensions remain.
    fn without_dim(&self, dim: usize) -> Option<Self> {
        let reindex = |dims: &[usize]| {
            dims.iter()
                .filter(|&&d| d != dim)
                .map(|&d| if d > dim { d - 1 } else { d })
                .collect::<Vec<_>>()
        };
        let core_dims = reindex(&self.core_dims);
        let slice_dims = reindex(&self.slice_dims);
        if core_dims.is_empty() && slice_dims.is_empty() {
            return None;
        }
        let main_dim = match self.main_dim {
            Some(main) if main == dim => None,
            Some(main) if main > dim => Some(main - 1),
            main => main,
        };
        Some(Self {
            core_dims,
            slice_dims,
            main_dim,
        })
    }

    /// The pattern with `count` extra trailing dimensions appended as slice
    /// dimensions.
    fn with_appended_slice_dims(&self, count: usize) -> Self {
        let rank = self.dimensionality();
        let mut slice_dims = self.slice_dims.clone();
        slice_dims.extend(rank..rank + count);
        Self {
            core_dims: self.core_dims.clone(),
            slice_dims,
            main_dim: self.main_dim,
        }
    }
}

/// The named patterns of a dataset.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PatternSet {
    patterns: BTreeMap<String, Pattern>,
}

impl PatternSet {
    /// Create an empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern with the given core and slice dimensions.
    ///
    /// # Errors
    /// Returns [`InvalidPatternError`] if the core and slice dimensions
    /// overlap or do not cover all dimensions exactly once.
    pub fn add_pattern(
        &mut self,
        name: impl Into<String>,
        core_dims: Vec<usize>,
        slice_dims: Vec<usize>,
    ) -> Result<(), InvalidPatternError> {
        let name = name.into();
        let pattern = Pattern::new_validated(&name, core_dims, slice_dims, None)?;
        self.patterns.insert(name, pattern);
        Ok(())
    }

    /// Add a pattern with a designated main (primary slice) dimension.
    ///
    /// # Errors
    /// Returns [`InvalidPatternError`] if the pattern is invalid or `main` is
    /// not a slice dimension.
    pub fn add_pattern_with_main(
        &mut self,
        name: impl Into<String>,
        core_dims: Vec<usize>,
        slice_dims: Vec<usize>,
        main: usize,
    ) -> Result<(), InvalidPatternError> {
        let name = name.into();
        let pattern = Pattern::new_validated(&name, core_dims, slice_dims, Some(main))?;
        self.patterns.insert(name, pattern);
        Ok(())
    }

    /// Return the pattern named `name`.
    ///
    /// # Errors
    /// Returns [`UnknownPatternError`] if no such pattern exists.
    pub fn get(&self, name: &str) -> Result<&Pattern, UnknownPatternError> {
        self.patterns
            .get(name)
            .ok_or_else(|| UnknownPatternError(name.to_string()))
    }

    /// Return the core dimensions of the pattern named `name`.
    ///
    /// # Errors
    /// Returns [`UnknownPatternError`] if no such pattern exists.
    pub fn core_dims(&self, name: &str) -> Result<&[usize], UnknownPatternError> {
        Ok(self.get(name)?.core_dims())
    }

    /// Return the slice dimensions of the pattern named `name`.
    ///
    /// # Errors
    /// Returns [`UnknownPatternError`] if no such pattern exists.
    pub fn slice_dims(&self, name: &str) -> Result<&[usize], UnknownPatternError> {
        Ok(self.get(name)?.slice_dims())
    }

    /// Returns true if a pattern named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Return the number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Iterate over `(name, pattern)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.patterns.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Derive the pattern set of an output dataset with dimension `dim`
    /// removed.
    ///
    /// Every pattern loses `dim` from its core and slice sets and all higher
    /// dimension indices shift down by one, keeping indices consistent across
    /// patterns. Patterns left with no dimensions are dropped.
    #[must_use]
    pub fn remove_dim(&self, dim: usize) -> Self {
        Self {
            patterns: self
                .patterns
                .iter()
                .filter_map(|(name, p)| Some((name.clone(), p.without_dim(dim)?)))
                .collect(),
        }
    }

    /// Derive the pattern set of an output dataset with `count` extra
    /// trailing dimensions.
    ///
    /// Parameter-sweep dimensions are always sliceable, so every pattern
    /// gains them as slice dimensions.
    #[must_use]
    pub fn append_slice_dims(&self, count: usize) -> Self {
        if count == 0 {
            return self.clone();
        }
        Self {
            patterns: self
                .patterns
                .iter()
                .map(|(name, p)| (name.clone(), p.with_appended_slice_dims(count)))
                .collect(),
        }
    }

    /// The pattern set of a reconstructed volume with voxel dimensions
    /// `x`/`y`/`z` in a dataset of `rank` dimensions.
    ///
    /// Creates `VOLUME_XZ`, `VOLUME_XY` and `VOLUME_YZ` patterns, each with
    /// the named voxel pair as core dimensions and the remaining voxel
    /// dimension as main slice dimension.
    ///
    /// # Errors
    /// Returns [`InvalidPatternError`] if the voxel dimensions are not
    /// distinct indices below `rank`.
    pub fn volume(
        x: usize,
        y: usize,
        z: usize,
        rank: usize,
    ) -> Result<Self, InvalidPatternError> {
        if x == y || y == z || x == z || [x, y, z].iter().any(|&dim| dim >= rank) {
            return Err(InvalidPatternError::IncompleteCover {
                name: "VOLUME".to_string(),
                core: vec![x, y, z],
                slice: vec![],
                rank,
            });
        }
        let mut set = Self::new();
        for (name, core, main) in [
            ("VOLUME_XZ", [x, z], y),
            ("VOLUME_XY", [x, y], z),
            ("VOLUME_YZ", [y, z], x),
        ] {
            let slice = (0..rank).filter(|dim| !core.contains(dim)).collect();
            set.add_pattern_with_main(name, core.to_vec(), slice, main)?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_validation() {
        let mut set = PatternSet::new();
        assert!(set.add_pattern("SINOGRAM", vec![1, 2], vec![0]).is_ok());
        // overlapping
        assert!(matches!(
            set.add_pattern("BAD", vec![0, 1], vec![1, 2]),
            Err(InvalidPatternError::OverlappingDimensions { .. })
        ));
        // incomplete cover
        assert!(matches!(
            set.add_pattern("BAD", vec![0], vec![3]),
            Err(InvalidPatternError::IncompleteCover { .. })
        ));
        // main outside slice dims
        assert!(matches!(
            set.add_pattern_with_main("BAD", vec![1, 2], vec![0], 1),
            Err(InvalidPatternError::MainNotSlice { .. })
        ));
        assert!(set.contains("SINOGRAM"));
        assert!(!set.contains("BAD"));
    }

    #[test]
    fn pattern_lookup() {
        let mut set = PatternSet::new();
        set.add_pattern_with_main("PROJECTION", vec![1, 2], vec![0], 0)
            .unwrap();
        assert_eq!(set.core_dims("PROJECTION").unwrap(), &[1, 2]);
        assert_eq!(set.slice_dims("PROJECTION").unwrap(), &[0]);
        assert_eq!(set.get("PROJECTION").unwrap().main_dim(), Some(0));
        assert!(set.get("SINOGRAM").is_err());
        assert!(set.core_dims("SINOGRAM").is_err());
    }

    #[test]
    fn primary_slice_dim_fallback() {
        let mut set = PatternSet::new();
        set.add_pattern("PROJECTION", vec![2, 3], vec![0, 1]).unwrap();
        assert_eq!(set.get("PROJECTION").unwrap().primary_slice_dim(), Some(1));
        set.add_pattern_with_main("SINOGRAM", vec![0, 3], vec![1, 2], 1)
            .unwrap();
        assert_eq!(set.get("SINOGRAM").unwrap().primary_slice_dim(), Some(1));
    }

    #[test]
    fn remove_dim_reindexes_all_patterns() {
        let mut set = PatternSet::new();
        set.add_pattern("SINOGRAM", vec![1, 2], vec![0]).unwrap();
        set.add_pattern_with_main("PROJECTION", vec![0, 2], vec![1], 1)
            .unwrap();
        let derived = set.remove_dim(2);
        assert_eq!(derived.core_dims("SINOGRAM").unwrap(), &[1]);
        assert_eq!(derived.slice_dims("SINOGRAM").unwrap(), &[0]);
        assert_eq!(derived.core_dims("PROJECTION").unwrap(), &[0]);
        assert_eq!(derived.get("PROJECTION").unwrap().main_dim(), Some(1));
    }

    #[test]
    fn remove_dim_drops_emptied_and_main() {
        let mut set = PatternSet::new();
        set.add_pattern_with_main("SPECTRUM", vec![1], vec![0], 0).unwrap();
        // removing the main dim clears it on the survivor
        let derived = set.remove_dim(0);
        assert_eq!(derived.get("SPECTRUM").unwrap().main_dim(), None);
        assert_eq!(derived.get("SPECTRUM").unwrap().core_dims(), &[0]);

        let mut single = PatternSet::new();
        single.add_pattern("POINT", vec![0], vec![]).unwrap();
        assert!(single.remove_dim(0).is_empty());
    }

    #[test]
    fn append_slice_dims() {
        let mut set = PatternSet::new();
        set.add_pattern_with_main("SINOGRAM", vec![1, 2], vec![0], 0)
            .unwrap();
        let derived = set.append_slice_dims(2);
        assert_eq!(derived.slice_dims("SINOGRAM").unwrap(), &[0, 3, 4]);
        assert_eq!(derived.core_dims("SINOGRAM").unwrap(), &[1, 2]);
        assert_eq!(derived.get("SINOGRAM").unwrap().main_dim(), Some(0));
        assert_eq!(set.append_slice_dims(0), set);
    }

    #[test]
    fn volume_patterns() {
        let set = PatternSet::volume(0, 1, 2, 3).unwrap();
        assert_eq!(set.core_dims("VOLUME_XZ").unwrap(), &[0, 2]);
        assert_eq!(set.get("VOLUME_XZ").unwrap().main_dim(), Some(1));
        assert_eq!(set.core_dims("VOLUME_XY").unwrap(), &[0, 1]);
        assert_eq!(set.core_dims("VOLUME_YZ").unwrap(), &[1, 2]);
        assert!(PatternSet::volume(0, 1, 3, 3).is_err());
    }
}
