//! Pattern-based dataset decomposition for the `tomoframe` pipeline framework.
//!
//! A processing stage sees an N-dimensional dataset through a [`Pattern`]: a
//! named split of the dataset's dimensions into *core* dimensions (presented
//! whole on every invocation) and *slice* dimensions (partitioned into work
//! units). A [`SliceList`] turns a pattern, a dataset shape and a
//! frames-per-unit budget into the deterministic, restartable sequence of
//! [`FrameSubset`] work units that the execution transport dispatches to
//! workers. [`Padding`] describes per-dimension boundary overlap, applied to
//! each work unit with clamping at the dataset edges.

mod frame_subset;
pub use frame_subset::{FrameSubset, FrameSubsetError};

mod pattern;
pub use pattern::{InvalidPatternError, Pattern, PatternSet, UnknownPatternError};

mod padding;
pub use padding::{
    NoPrimaryDimensionError, PadAmount, PadSide, Padding, PaddingDimensionError, PaddingMap,
};

mod slice_list;
pub use slice_list::{SliceList, SliceListError, SliceListIter};

/// The extent of each dimension of a dataset or work unit.
pub type ArrayShape = Vec<u64>;

/// An ND index to an element in a dataset.
pub type ArrayIndices = Vec<u64>;

/// An ND index with stack allocation up to 4 dimensions.
///
/// Work-unit grids rarely exceed a handful of slice dimensions.
pub type ArrayIndicesTinyVec = tinyvec::TinyVec<[u64; 4]>;

/// Unravel a linearised index into ND indices over `shape` (C order).
///
/// Returns [`None`] if `index` is out-of-bounds of `shape`.
#[must_use]
pub(crate) fn unravel_index(mut index: u64, shape: &[u64]) -> Option<ArrayIndicesTinyVec> {
    let total: u64 = shape
        .iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))?;
    if index >= total {
        return None;
    }
    let mut indices: ArrayIndicesTinyVec = tinyvec::tiny_vec!([u64; 4]);
    indices.resize(shape.len(), 0);
    for i in (0..shape.len()).rev() {
        indices[i] = index % shape[i];
        index /= shape[i];
    }
    Some(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unravel() {
        assert_eq!(unravel_index(0, &[2, 3]).unwrap().as_slice(), &[0, 0]);
        assert_eq!(unravel_index(5, &[2, 3]).unwrap().as_slice(), &[1, 2]);
        assert_eq!(unravel_index(3, &[2, 3]).unwrap().as_slice(), &[1, 0]);
        assert!(unravel_index(6, &[2, 3]).is_none());
        assert!(unravel_index(0, &[]).is_some());
    }
}
