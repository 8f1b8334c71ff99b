//! Datasets and the dataset registry.
//!
//! A [`Dataset`] is the descriptor of one N-dimensional array flowing through
//! the pipeline: its shape, axis labels, named patterns and open-ended
//! metadata. Descriptors are created once per declared stage output, shaped
//! by inference during stage setup, and immutable in shape thereafter.

use std::collections::BTreeMap;

use thiserror::Error;
use tomoframe_pattern::{ArrayShape, PatternSet};

use crate::axis::{AxisLabels, UnknownAxisError};

/// Open-ended string-keyed metadata, insertion-ordered.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// The metadata key holding the per-frame image key of a raw dataset.
pub const IMAGE_KEY: &str = "image_key";

/// A dataset descriptor error.
#[derive(Clone, Debug, Error)]
#[allow(missing_docs)]
pub enum DatasetError {
    /// A dataset with this name already exists in the registry.
    #[error("dataset {0} already exists")]
    AlreadyExists(String),
    /// No dataset with this name exists in the registry.
    #[error("dataset {0} does not exist")]
    Unknown(String),
    /// Extra dimensions were already appended to this dataset.
    #[error("dataset {0} already has extra dimensions")]
    ExtraDimsAlreadySet(String),
}

/// The descriptor of one N-dimensional dataset.
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    shape: ArrayShape,
    axis_labels: AxisLabels,
    patterns: PatternSet,
    extra_dims: Vec<u64>,
    meta: Configuration,
}

impl Dataset {
    /// Create a new dataset descriptor with unlabelled axes and no patterns.
    #[must_use]
    pub fn new(name: impl Into<String>, shape: ArrayShape) -> Self {
        let rank = shape.len();
        Self {
            name: name.into(),
            shape,
            axis_labels: AxisLabels::new_unlabelled(rank),
            patterns: PatternSet::new(),
            extra_dims: Vec::new(),
            meta: Configuration::new(),
        }
    }

    /// Create a new dataset descriptor with the given labels and patterns.
    #[must_use]
    pub fn new_with(
        name: impl Into<String>,
        shape: ArrayShape,
        axis_labels: AxisLabels,
        patterns: PatternSet,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            axis_labels,
            patterns,
            extra_dims: Vec::new(),
            meta: Configuration::new(),
        }
    }

    /// Return the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the dataset shape, including any extra dimensions.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the number of dimensions, including any extra dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Return the axis labels.
    #[must_use]
    pub fn axis_labels(&self) -> &AxisLabels {
        &self.axis_labels
    }

    /// Return the named patterns.
    #[must_use]
    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Mutable access to the patterns, for stage setup.
    pub fn patterns_mut(&mut self) -> &mut PatternSet {
        &mut self.patterns
    }

    /// Return the extents of the extra (parameter-sweep) dimensions.
    #[must_use]
    pub fn extra_dims(&self) -> &[u64] {
        &self.extra_dims
    }

    /// Return the open-ended metadata.
    #[must_use]
    pub fn meta(&self) -> &Configuration {
        &self.meta
    }

    /// Mutable access to the metadata, for stage setup.
    pub fn meta_mut(&mut self) -> &mut Configuration {
        &mut self.meta
    }

    /// Return the index of the dimension labelled `name`.
    ///
    /// # Errors
    /// Returns [`UnknownAxisError`] if no dimension carries the name.
    pub fn dimension_by_name(&self, name: &str) -> Result<usize, UnknownAxisError> {
        self.axis_labels.index_of(name)
    }

    /// Append the extra dimensions of a parameter sweep.
    ///
    /// The dimensions go after all data dimensions; every pattern gains them
    /// as slice dimensions and the new axes are unlabelled. All output
    /// datasets of one multi-parameter stage invocation share the identical
    /// extra-dimension tuple, so this is called exactly once per dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::ExtraDimsAlreadySet`] on a second call.
    pub fn set_extra_dims(&mut self, extra_dims: Vec<u64>) -> Result<(), DatasetError> {
        if !self.extra_dims.is_empty() {
            return Err(DatasetError::ExtraDimsAlreadySet(self.name.clone()));
        }
        if extra_dims.is_empty() {
            return Ok(());
        }
        self.shape.extend(&extra_dims);
        self.patterns = self.patterns.append_slice_dims(extra_dims.len());
        self.axis_labels = self.axis_labels.append_unlabelled(extra_dims.len());
        self.extra_dims = extra_dims;
        Ok(())
    }

    /// Return the per-frame image key, if the metadata holds one.
    ///
    /// The image key marks each acquisition frame along dimension 0 as data
    /// or calibration (darks/flats).
    #[must_use]
    pub fn image_key(&self) -> Option<Vec<u64>> {
        self.meta
            .get(IMAGE_KEY)?
            .as_array()?
            .iter()
            .map(serde_json::Value::as_u64)
            .collect()
    }

    /// Store the per-frame image key in the metadata.
    pub fn set_image_key(&mut self, keys: &[u64]) {
        self.meta.insert(
            IMAGE_KEY.to_string(),
            serde_json::Value::Array(keys.iter().map(|&k| k.into()).collect()),
        );
    }
}

/// The pipeline's dataset registry.
///
/// Stage setup creates each declared output dataset here once; the registry
/// owns the descriptors until pipeline teardown.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Dataset>,
}

impl DatasetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset to the registry.
    ///
    /// # Errors
    /// Returns [`DatasetError::AlreadyExists`] if the name is taken.
    pub fn create(&mut self, dataset: Dataset) -> Result<(), DatasetError> {
        if self.datasets.contains_key(dataset.name()) {
            return Err(DatasetError::AlreadyExists(dataset.name().to_string()));
        }
        self.datasets.insert(dataset.name().to_string(), dataset);
        Ok(())
    }

    /// Return the dataset named `name`.
    ///
    /// # Errors
    /// Returns [`DatasetError::Unknown`] if no such dataset exists.
    pub fn get(&self, name: &str) -> Result<&Dataset, DatasetError> {
        self.datasets
            .get(name)
            .ok_or_else(|| DatasetError::Unknown(name.to_string()))
    }

    /// Return the dataset named `name` mutably, for stage setup.
    ///
    /// # Errors
    /// Returns [`DatasetError::Unknown`] if no such dataset exists.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Dataset, DatasetError> {
        self.datasets
            .get_mut(name)
            .ok_or_else(|| DatasetError::Unknown(name.to_string()))
    }

    /// Remove and return the dataset named `name`, at teardown.
    ///
    /// # Errors
    /// Returns [`DatasetError::Unknown`] if no such dataset exists.
    pub fn remove(&mut self, name: &str) -> Result<Dataset, DatasetError> {
        self.datasets
            .remove(name)
            .ok_or_else(|| DatasetError::Unknown(name.to_string()))
    }

    /// Returns true if a dataset named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// Iterate over dataset names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisLabels;

    fn tomo_dataset() -> Dataset {
        let mut patterns = PatternSet::new();
        patterns
            .add_pattern_with_main("PROJECTION", vec![1, 2], vec![0], 0)
            .unwrap();
        patterns
            .add_pattern_with_main("SINOGRAM", vec![0, 2], vec![1], 1)
            .unwrap();
        Dataset::new_with(
            "tomo",
            vec![180, 135, 160],
            AxisLabels::new([
                ("rotation_angle", "degrees"),
                ("detector_y", "pixels"),
                ("detector_x", "pixels"),
            ]),
            patterns,
        )
    }

    #[test]
    fn dimension_lookup() {
        let dataset = tomo_dataset();
        assert_eq!(dataset.dimension_by_name("detector_y").unwrap(), 1);
        assert!(dataset.dimension_by_name("voxel_x").is_err());
    }

    #[test]
    fn extra_dims_extend_shape_patterns_and_labels() {
        let mut dataset = tomo_dataset();
        dataset.set_extra_dims(vec![3, 2]).unwrap();
        assert_eq!(dataset.shape(), &[180, 135, 160, 3, 2]);
        assert_eq!(dataset.extra_dims(), &[3, 2]);
        assert_eq!(
            dataset.patterns().slice_dims("SINOGRAM").unwrap(),
            &[1, 3, 4]
        );
        assert_eq!(dataset.axis_labels().len(), 5);
        assert!(matches!(
            dataset.set_extra_dims(vec![4]),
            Err(DatasetError::ExtraDimsAlreadySet(_))
        ));
    }

    #[test]
    fn empty_extra_dims_are_a_no_op() {
        let mut dataset = tomo_dataset();
        dataset.set_extra_dims(vec![]).unwrap();
        assert_eq!(dataset.shape(), &[180, 135, 160]);
        dataset.set_extra_dims(vec![2]).unwrap();
        assert_eq!(dataset.shape(), &[180, 135, 160, 2]);
    }

    #[test]
    fn image_key_round_trip() {
        let mut dataset = tomo_dataset();
        assert!(dataset.image_key().is_none());
        dataset.set_image_key(&[1, 0, 0, 2]);
        assert_eq!(dataset.image_key().unwrap(), vec![1, 0, 0, 2]);
    }

    #[test]
    fn registry_lifecycle() {
        let mut registry = DatasetRegistry::new();
        registry.create(tomo_dataset()).unwrap();
        assert!(matches!(
            registry.create(tomo_dataset()),
            Err(DatasetError::AlreadyExists(_))
        ));
        assert!(registry.contains("tomo"));
        assert_eq!(registry.get("tomo").unwrap().rank(), 3);
        assert!(registry.get("volume").is_err());
        registry.get_mut("tomo").unwrap().set_image_key(&[0]);
        let removed = registry.remove("tomo").unwrap();
        assert_eq!(removed.image_key().unwrap(), vec![0]);
        assert!(registry.remove("tomo").is_err());
    }
}
