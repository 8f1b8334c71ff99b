//! Output dataset shape inference.
//!
//! A stage declares how each output relates to its input with a
//! [`TransformSpec`]; [`infer`] turns that declaration plus the input
//! descriptor into the output shape, pattern set and axis labels. Inference
//! is pure: it never touches stored data, only descriptors and per-frame key
//! metadata.

use thiserror::Error;

use tomoframe_pattern::{ArrayShape, InvalidPatternError, PatternSet};

use crate::axis::{AxisLabel, AxisLabels};
use crate::dataset::Dataset;

/// A shape inference error.
#[derive(Clone, Debug, Error)]
pub enum ShapeInferenceError {
    /// A transform references a dimension outside the input shape.
    #[error("dimension {dim} is out of bounds for rank {rank}")]
    DimensionOutOfBounds {
        /// The referenced dimension.
        dim: usize,
        /// The input dataset rank.
        rank: usize,
    },
    /// A key-trimming transform on a dataset without per-frame key metadata.
    #[error("dataset {0} has no image key metadata")]
    MissingImageKey(String),
    /// The per-frame key metadata does not match the frame dimension extent.
    #[error("image key length {got} does not match frame extent {expected}")]
    ImageKeyLength {
        /// The extent of the frame dimension.
        expected: u64,
        /// The number of key entries.
        got: usize,
    },
    /// A volume remap produced an invalid pattern.
    #[error(transparent)]
    InvalidPattern(#[from] InvalidPatternError),
}

/// How an output dataset's geometry derives from its input's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformSpec {
    /// Output mirrors the input: same shape, patterns and labels.
    Copy,
    /// Output drops one input dimension; patterns and labels reindex.
    DropAxis(usize),
    /// Projection space becomes volume space: the rotation dimension takes
    /// the detector column extent and the three roles relabel to voxels.
    VolumeRemap {
        /// The rotation angle dimension (becomes `voxel_x`).
        rotation_dim: usize,
        /// The detector row dimension (becomes `voxel_y`).
        detector_row_dim: usize,
        /// The detector column dimension (becomes `voxel_z`).
        detector_col_dim: usize,
    },
    /// Output keeps only the frames whose image key equals the given value,
    /// shrinking the frame dimension (dimension 0) accordingly.
    TrimKey(u64),
}

/// An inferred output dataset geometry.
#[derive(Clone, Debug)]
pub struct Inferred {
    /// The output shape, swept parameter dimensions included.
    pub shape: ArrayShape,
    /// The output pattern set.
    pub patterns: PatternSet,
    /// The output axis labels.
    pub axis_labels: AxisLabels,
}

/// Infer the geometry of an output dataset from its input, a transform and
/// the stage's swept parameter dimensions.
///
/// The swept dimensions are appended to the shape, to every pattern's slice
/// dimensions and as unlabelled axes, whatever the transform.
///
/// # Errors
/// Returns a [`ShapeInferenceError`] if the transform references a dimension
/// outside the input, if key trimming finds no or mismatched key metadata,
/// or if a volume remap's dimensions do not form a valid pattern set.
pub fn infer(
    input: &Dataset,
    spec: &TransformSpec,
    extra_dims: &[u64],
) -> Result<Inferred, ShapeInferenceError> {
    let rank = input.rank();
    let (mut shape, patterns, axis_labels) = match spec {
        TransformSpec::Copy => (
            input.shape().to_vec(),
            input.patterns().clone(),
            input.axis_labels().clone(),
        ),
        TransformSpec::DropAxis(dim) => {
            if *dim >= rank {
                return Err(ShapeInferenceError::DimensionOutOfBounds { dim: *dim, rank });
            }
            let mut shape = input.shape().to_vec();
            shape.remove(*dim);
            (
                shape,
                input.patterns().remove_dim(*dim),
                input.axis_labels().remove_dim(*dim),
            )
        }
        TransformSpec::VolumeRemap {
            rotation_dim,
            detector_row_dim,
            detector_col_dim,
        } => {
            for &dim in [rotation_dim, detector_row_dim, detector_col_dim] {
                if dim >= rank {
                    return Err(ShapeInferenceError::DimensionOutOfBounds { dim, rank });
                }
            }
            let mut shape = input.shape().to_vec();
            shape[*rotation_dim] = shape[*detector_col_dim];
            let patterns =
                PatternSet::volume(*rotation_dim, *detector_row_dim, *detector_col_dim, rank)?;
            let mut axis_labels = input.axis_labels().clone();
            for (dim, name) in [
                (*rotation_dim, "voxel_x"),
                (*detector_row_dim, "voxel_y"),
                (*detector_col_dim, "voxel_z"),
            ] {
                axis_labels.set(dim, AxisLabel::new(name, "voxels"));
            }
            (shape, patterns, axis_labels)
        }
        TransformSpec::TrimKey(keep) => {
            if input.shape().is_empty() {
                return Err(ShapeInferenceError::DimensionOutOfBounds { dim: 0, rank: 0 });
            }
            let keys = input
                .image_key()
                .ok_or_else(|| ShapeInferenceError::MissingImageKey(input.name().to_string()))?;
            let frames = input.shape()[0];
            if keys.len() as u64 != frames {
                return Err(ShapeInferenceError::ImageKeyLength {
                    expected: frames,
                    got: keys.len(),
                });
            }
            let mut shape = input.shape().to_vec();
            shape[0] = keys.iter().filter(|&&key| key == *keep).count() as u64;
            (shape, input.patterns().clone(), input.axis_labels().clone())
        }
    };
    shape.extend_from_slice(extra_dims);
    Ok(Inferred {
        shape,
        patterns: patterns.append_slice_dims(extra_dims.len()),
        axis_labels: axis_labels.append_unlabelled(extra_dims.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_dataset() -> Dataset {
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
    fn copy_appends_extra_dims() {
        let input = projection_dataset();
        let inferred = infer(&input, &TransformSpec::Copy, &[3, 2]).unwrap();
        assert_eq!(inferred.shape, vec![180, 135, 160, 3, 2]);
        let sinogram = inferred.patterns.get("SINOGRAM").unwrap();
        assert_eq!(sinogram.slice_dims(), &[1, 3, 4]);
        assert_eq!(sinogram.core_dims(), &[0, 2]);
        assert!(inferred.axis_labels.get(3).is_none());
        assert_eq!(inferred.axis_labels.len(), 5);
    }

    #[test]
    fn drop_axis_reindexes() {
        let input = projection_dataset();
        let inferred = infer(&input, &TransformSpec::DropAxis(1), &[]).unwrap();
        assert_eq!(inferred.shape, vec![180, 160]);
        let projection = inferred.patterns.get("PROJECTION").unwrap();
        assert_eq!(projection.core_dims(), &[1]);
        assert_eq!(projection.slice_dims(), &[0]);
        assert_eq!(inferred.axis_labels.index_of("detector_x").unwrap(), 1);
        assert!(matches!(
            infer(&input, &TransformSpec::DropAxis(3), &[]),
            Err(ShapeInferenceError::DimensionOutOfBounds { dim: 3, rank: 3 })
        ));
    }

    #[test]
    fn volume_remap_squares_and_relabels() {
        let input = projection_dataset();
        let spec = TransformSpec::VolumeRemap {
            rotation_dim: 0,
            detector_row_dim: 1,
            detector_col_dim: 2,
        };
        let inferred = infer(&input, &spec, &[3, 2]).unwrap();
        assert_eq!(inferred.shape, vec![160, 135, 160, 3, 2]);
        assert_eq!(inferred.axis_labels.index_of("voxel_x").unwrap(), 0);
        assert_eq!(inferred.axis_labels.index_of("voxel_z").unwrap(), 2);
        let xz = inferred.patterns.get("VOLUME_XZ").unwrap();
        assert_eq!(xz.core_dims(), &[0, 2]);
        assert_eq!(xz.slice_dims(), &[1, 3, 4]);
        assert_eq!(xz.main_dim(), Some(1));
        assert!(inferred.patterns.contains("VOLUME_XY"));
        assert!(inferred.patterns.contains("VOLUME_YZ"));
    }

    #[test]
    fn trim_key_counts_kept_frames() {
        let mut input = projection_dataset();
        let mut keys = vec![0u64; 180];
        keys[0] = 1;
        keys[1] = 1;
        keys[178] = 2;
        keys[179] = 2;
        input.set_image_key(&keys);
        let inferred = infer(&input, &TransformSpec::TrimKey(0), &[]).unwrap();
        assert_eq!(inferred.shape, vec![176, 135, 160]);
        assert!(inferred.patterns.contains("SINOGRAM"));
    }

    #[test]
    fn trim_key_requires_matching_metadata() {
        let input = projection_dataset();
        assert!(matches!(
            infer(&input, &TransformSpec::TrimKey(0), &[]),
            Err(ShapeInferenceError::MissingImageKey(_))
        ));
        let mut short = projection_dataset();
        short.set_image_key(&[0, 0, 0]);
        assert!(matches!(
            infer(&short, &TransformSpec::TrimKey(0), &[]),
            Err(ShapeInferenceError::ImageKeyLength {
                expected: 180,
                got: 3
            })
        ));
    }

    #[test]
    fn trim_key_rejects_rank_zero_input() {
        let mut input = Dataset::new("empty", vec![]);
        input.set_image_key(&[]);
        assert!(matches!(
            infer(&input, &TransformSpec::TrimKey(0), &[]),
            Err(ShapeInferenceError::DimensionOutOfBounds { dim: 0, rank: 0 })
        ));
    }
}
