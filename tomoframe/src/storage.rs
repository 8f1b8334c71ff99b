//! Backing storage interfaces.
//!
//! Stages never touch files directly; they read and write rectangular blocks
//! through [`StoreTraits`] using the frame subsets a slice list hands them.
//! A synchronous in-memory store backs the tests; real deployments provide
//! their own implementation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use derive_more::Display;
use ndarray::ArrayD;
use thiserror::Error;

use tomoframe_pattern::{ArrayShape, FrameSubset};

use crate::dataset::Configuration;

/// The element type of a stored dataset.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit floating point.
    #[display("float32")]
    Float32,
    /// 64-bit floating point.
    #[display("float64")]
    Float64,
    /// 16-bit unsigned integer (raw detector counts).
    #[display("uint16")]
    UInt16,
}

impl DataType {
    /// The size of one element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::UInt16 => 2,
        }
    }
}

/// An opaque handle to an allocated dataset.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatasetHandle(u64);

/// A storage error.
#[derive(Clone, Debug, Error)]
pub enum StorageError {
    /// No dataset is allocated under the handle.
    #[error("no dataset allocated under handle {0}")]
    UnknownHandle(DatasetHandle),
    /// A shape with a dimension too large to address.
    #[error("shape {0:?} is not addressable")]
    UnaddressableShape(ArrayShape),
    /// A block access outside the dataset bounds.
    #[error("subset {subset} is out of bounds of shape {shape:?}")]
    OutOfBounds {
        /// The requested subset.
        subset: FrameSubset,
        /// The dataset shape.
        shape: ArrayShape,
    },
    /// A written block whose shape does not match its subset.
    #[error("block shape {got:?} does not match subset shape {expected:?}")]
    BlockShapeMismatch {
        /// The subset shape.
        expected: Vec<usize>,
        /// The block shape.
        got: Vec<usize>,
    },
}

/// Block-level dataset storage.
///
/// Elements are transported as `f32` whatever the declared [`DataType`]; the
/// declaration is a hint for the backing allocation.
pub trait StoreTraits: Send + Sync {
    /// Allocate a zero-initialised dataset.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the shape cannot be allocated.
    fn allocate(
        &self,
        shape: &[u64],
        data_type: DataType,
        configuration: &Configuration,
    ) -> Result<DatasetHandle, StorageError>;

    /// Read the block covered by `subset`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the handle is unknown or the subset
    /// exits the dataset bounds.
    fn read_block(
        &self,
        handle: DatasetHandle,
        subset: &FrameSubset,
    ) -> Result<ArrayD<f32>, StorageError>;

    /// Write `block` over the region covered by `subset`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the handle is unknown, the subset exits
    /// the dataset bounds or the block shape does not match the subset.
    fn write_block(
        &self,
        handle: DatasetHandle,
        subset: &FrameSubset,
        block: &ArrayD<f32>,
    ) -> Result<(), StorageError>;
}

/// A synchronous in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: Mutex<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    next_handle: u64,
    datasets: BTreeMap<DatasetHandle, ArrayD<f32>>,
}

impl MemoryStore {
    /// Create a new memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn subset_shape(subset: &FrameSubset, shape: &[usize]) -> Result<Vec<usize>, StorageError> {
    let shape_u64: ArrayShape = shape.iter().map(|&extent| extent as u64).collect();
    if subset.inbounds_shape(&shape_u64) {
        Ok(subset.shape().iter().map(|&extent| extent as usize).collect())
    } else {
        Err(StorageError::OutOfBounds {
            subset: subset.clone(),
            shape: shape_u64,
        })
    }
}

fn sliced<'a>(array: &'a ArrayD<f32>, subset: &FrameSubset) -> ndarray::ArrayViewD<'a, f32> {
    let ranges = subset.to_ranges();
    array.slice_each_axis(|axis| {
        let range = &ranges[axis.axis.index()];
        ndarray::Slice::from(range.start as usize..range.end as usize)
    })
}

impl StoreTraits for MemoryStore {
    fn allocate(
        &self,
        shape: &[u64],
        _data_type: DataType,
        _configuration: &Configuration,
    ) -> Result<DatasetHandle, StorageError> {
        let dims = shape
            .iter()
            .map(|&extent| usize::try_from(extent).ok())
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| StorageError::UnaddressableShape(shape.to_vec()))?;
        let mut inner = self.data_map.lock().unwrap();
        let handle = DatasetHandle(inner.next_handle);
        inner.next_handle += 1;
        inner
            .datasets
            .insert(handle, ArrayD::zeros(ndarray::IxDyn(&dims)));
        Ok(handle)
    }

    fn read_block(
        &self,
        handle: DatasetHandle,
        subset: &FrameSubset,
    ) -> Result<ArrayD<f32>, StorageError> {
        let inner = self.data_map.lock().unwrap();
        let array = inner
            .datasets
            .get(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        subset_shape(subset, array.shape())?;
        Ok(sliced(array, subset).to_owned())
    }

    fn write_block(
        &self,
        handle: DatasetHandle,
        subset: &FrameSubset,
        block: &ArrayD<f32>,
    ) -> Result<(), StorageError> {
        let mut inner = self.data_map.lock().unwrap();
        let array = inner
            .datasets
            .get_mut(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        let expected = subset_shape(subset, array.shape())?;
        if block.shape() != expected.as_slice() {
            return Err(StorageError::BlockShapeMismatch {
                expected,
                got: block.shape().to_vec(),
            });
        }
        let ranges = subset.to_ranges();
        let mut view = array.slice_each_axis_mut(|axis| {
            let range = &ranges[axis.axis.index()];
            ndarray::Slice::from(range.start as usize..range.end as usize)
        });
        view.assign(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn subset(ranges: [std::ops::Range<u64>; 2]) -> FrameSubset {
        FrameSubset::from(ranges)
    }

    #[test]
    fn block_round_trip() {
        let store = MemoryStore::new();
        let handle = store
            .allocate(&[4, 3], DataType::Float32, &Configuration::new())
            .unwrap();
        let block = Array2::from_shape_fn((2, 3), |(row, col)| (row * 3 + col) as f32).into_dyn();
        store.write_block(handle, &subset([1..3, 0..3]), &block).unwrap();

        let read = store.read_block(handle, &subset([1..3, 0..3])).unwrap();
        assert_eq!(read, block);
        let untouched = store.read_block(handle, &subset([0..1, 0..3])).unwrap();
        assert!(untouched.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let store = MemoryStore::new();
        let handle = store
            .allocate(&[4, 3], DataType::Float32, &Configuration::new())
            .unwrap();
        assert!(matches!(
            store.read_block(handle, &subset([0..5, 0..3])),
            Err(StorageError::OutOfBounds { .. })
        ));
        assert!(matches!(
            store.read_block(DatasetHandle(7), &subset([0..1, 0..1])),
            Err(StorageError::UnknownHandle(_))
        ));
    }

    #[test]
    fn mismatched_block_shape_fails() {
        let store = MemoryStore::new();
        let handle = store
            .allocate(&[4, 3], DataType::Float32, &Configuration::new())
            .unwrap();
        let block = Array2::<f32>::zeros((2, 2)).into_dyn();
        assert!(matches!(
            store.write_block(handle, &subset([0..2, 0..3]), &block),
            Err(StorageError::BlockShapeMismatch { .. })
        ));
    }
}
