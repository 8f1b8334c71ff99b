//! An end-to-end run of a small correction → filter → reconstruction chain
//! over an in-memory store, with the filter work split across two emulated
//! workers.

use std::error::Error;

use ndarray::{concatenate, ArrayD, Axis, IxDyn};

use tomoframe::axis::AxisLabels;
use tomoframe::dataset::{Configuration, Dataset, DatasetRegistry};
use tomoframe::parameters::{expand, ParamValue};
use tomoframe::pattern::{FrameSubset, Padding, PatternSet};
use tomoframe::shape_inference::TransformSpec;
use tomoframe::stage::{StageContext, StageData};
use tomoframe::storage::{DataType, MemoryStore, StoreTraits};

const ROTATIONS: u64 = 12;
const ROWS: u64 = 5;
const COLS: u64 = 6;

/// Frames 0 and 6 are calibration frames; the 10 others carry data.
const IMAGE_KEY: [u64; ROTATIONS as usize] = [1, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0];

fn raw_dataset() -> Result<Dataset, Box<dyn Error>> {
    let mut patterns = PatternSet::new();
    patterns.add_pattern_with_main("PROJECTION", vec![1, 2], vec![0], 0)?;
    patterns.add_pattern_with_main("SINOGRAM", vec![0, 2], vec![1], 1)?;
    let mut dataset = Dataset::new_with(
        "tomo",
        vec![ROTATIONS, ROWS, COLS],
        AxisLabels::new([
            ("rotation_angle", "degrees"),
            ("detector_y", "pixels"),
            ("detector_x", "pixels"),
        ]),
        patterns,
    );
    dataset.set_image_key(&IMAGE_KEY);
    Ok(dataset)
}

fn raw_value(frame: u64, row: u64, col: u64) -> f32 {
    (frame * 100 + row * 10 + col) as f32
}

fn block_slice(array: &ArrayD<f32>, subset: &FrameSubset) -> ArrayD<f32> {
    let ranges = subset.to_ranges();
    array
        .slice_each_axis(|axis| {
            let range = &ranges[axis.axis.index()];
            ndarray::Slice::from(range.start as usize..range.end as usize)
        })
        .to_owned()
}

#[test]
fn pipeline() -> Result<(), Box<dyn Error>> {
    let store = MemoryStore::new();
    let mut registry = DatasetRegistry::new();
    registry.create(raw_dataset()?)?;

    let raw = ArrayD::from_shape_fn(
        IxDyn(&[ROTATIONS as usize, ROWS as usize, COLS as usize]),
        |index| raw_value(index[0] as u64, index[1] as u64, index[2] as u64),
    );
    let raw_handle = store.allocate(
        &[ROTATIONS, ROWS, COLS],
        DataType::Float32,
        &Configuration::new(),
    )?;
    store.write_block(
        raw_handle,
        &FrameSubset::new_with_shape(vec![ROTATIONS, ROWS, COLS]),
        &raw,
    )?;

    // Correction: discard the calibration frames, copy the data frames.
    let no_sweep = expand(&Configuration::new())?;
    {
        let mut context = StageContext::new(&mut registry, vec!["tomo".to_string()], &no_sweep);
        let corrected = context.create_output_dataset("corrected", &TransformSpec::TrimKey(0))?;
        assert_eq!(corrected.shape(), &[10, ROWS, COLS]);
    }
    let corrected_handle = store.allocate(&[10, ROWS, COLS], DataType::Float32, &Configuration::new())?;
    let kept: Vec<u64> = IMAGE_KEY
        .iter()
        .enumerate()
        .filter(|(_, &key)| key == 0)
        .map(|(frame, _)| frame as u64)
        .collect();
    let view = StageData::new(registry.get("corrected")?, "PROJECTION", 4, false)?;
    let plan = view.slice_list()?;
    assert_eq!(plan.len(), 3);
    for index in 0..plan.len() {
        let unit = plan.get(index).ok_or("missing work unit")?;
        let frames = unit.to_ranges()[0].clone();
        let input_frames: Vec<ArrayD<f32>> = frames
            .clone()
            .map(|frame| {
                store.read_block(
                    raw_handle,
                    &FrameSubset::from([kept[frame as usize]..kept[frame as usize] + 1, 0..ROWS, 0..COLS]),
                )
            })
            .collect::<Result<_, _>>()?;
        let views: Vec<_> = input_frames.iter().map(|frame| frame.view()).collect();
        let block = concatenate(Axis(0), &views)?;
        store.write_block(corrected_handle, &unit, &block)?;
    }
    let first = store.read_block(corrected_handle, &FrameSubset::from([0..1, 0..ROWS, 0..COLS]))?;
    // frame 0 of the corrected data is raw frame 1
    assert_eq!(first[[0, 2, 3]], raw_value(1, 2, 3));

    // Filter: neighbour-aware pass-through with one frame of padding either
    // side, split across two workers.
    {
        let mut context = StageContext::new(&mut registry, vec!["corrected".to_string()], &no_sweep);
        context.create_output_dataset("filtered", &TransformSpec::Copy)?;
    }
    let filtered_handle = store.allocate(&[10, ROWS, COLS], DataType::Float32, &Configuration::new())?;
    let mut view = StageData::new(registry.get("corrected")?, "PROJECTION", 4, false)?;
    let mut padding = Padding::new("PROJECTION", view.pattern().clone());
    padding.pad_multi_frames(1)?;
    view.set_padding(padding);
    let plan = view.slice_list()?;
    assert_eq!(
        plan.iter().map(|unit| unit.to_ranges()[0].clone()).collect::<Vec<_>>(),
        vec![0..5, 3..9, 7..10]
    );

    let mut seen = Vec::new();
    for worker in 0..2 {
        let mut units = plan.subrange(worker, 2)?;
        loop {
            let index = units.next_index();
            let Some(padded) = units.next() else { break };
            seen.push(index);
            let block = store.read_block(corrected_handle, &padded)?;
            let unpadded = plan.get_unpadded(index).ok_or("missing work unit")?;
            let inner = unpadded.relative_to(padded.start())?;
            store.write_block(filtered_handle, &unpadded, &block_slice(&block, &inner))?;
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);
    let everything = FrameSubset::new_with_shape(vec![10, ROWS, COLS]);
    assert_eq!(
        store.read_block(filtered_handle, &everything)?,
        store.read_block(corrected_handle, &everything)?
    );

    // Reconstruction: sinogram to volume with a two-parameter sweep.
    let recon_parameters: Configuration = [
        ("method".to_string(), "FBP;CGLS".into()),
        ("iterations".to_string(), "1;2;3".into()),
    ]
    .into_iter()
    .collect();
    let sweep = expand(&recon_parameters)?;
    assert_eq!(sweep.extra_dims(), &[2, 3]);
    {
        let mut context = StageContext::new(&mut registry, vec!["filtered".to_string()], &sweep);
        let volume = context.create_output_dataset(
            "volume",
            &TransformSpec::VolumeRemap {
                rotation_dim: 0,
                detector_row_dim: 1,
                detector_col_dim: 2,
            },
        )?;
        assert_eq!(volume.shape(), &[COLS, ROWS, COLS, 2, 3]);
        assert_eq!(volume.axis_labels().index_of("voxel_x")?, 0);
        let xz = volume.patterns().get("VOLUME_XZ")?;
        assert_eq!(xz.core_dims(), &[0, 2]);
        assert_eq!(xz.slice_dims(), &[1, 3, 4]);
    }
    let volume_handle = store.allocate(
        &[COLS, ROWS, COLS, 2, 3],
        DataType::Float32,
        &Configuration::new(),
    )?;
    let view = StageData::new(registry.get("filtered")?, "SINOGRAM", 2, false)?;
    let plan = view.slice_list()?;
    assert_eq!(plan.len(), 3);
    for combination in sweep.combinations() {
        let selected = sweep.select(&combination).ok_or("bad combination")?;
        let &ParamValue::Int(iterations) = selected[1].1 else {
            return Err("iterations should be integers".into());
        };
        for index in 0..plan.len() {
            let unit = plan.get(index).ok_or("missing work unit")?;
            let sinogram = store.read_block(filtered_handle, &unit)?;
            let rows = unit.to_ranges()[1].clone();
            let height = (rows.end - rows.start) as usize;
            // reconstruction placeholder: one slab per sweep combination,
            // seeded from the sinogram so the data dependency is visible
            let seed = sinogram[[0, 0, 0]];
            let slab = ArrayD::from_elem(
                IxDyn(&[COLS as usize, height, COLS as usize, 1, 1]),
                seed + (combination[0] * 1000) as f32 + iterations as f32,
            );
            store.write_block(
                volume_handle,
                &FrameSubset::from([
                    0..COLS,
                    rows.clone(),
                    0..COLS,
                    combination[0]..combination[0] + 1,
                    combination[1]..combination[1] + 1,
                ]),
                &slab,
            )?;
        }
    }

    // every voxel of every sweep hyperplane was written
    let volume = store.read_block(
        volume_handle,
        &FrameSubset::new_with_shape(vec![COLS, ROWS, COLS, 2, 3]),
    )?;
    assert!(volume.iter().all(|&value| value > 0.0));
    // the CGLS hyperplanes sit 1000 above the FBP ones for the same rows
    let fbp = volume[[0, 0, 0, 0, 0]];
    let cgls = volume[[0, 0, 0, 1, 0]];
    assert_eq!(cgls - fbp, 1000.0);
    // iterations=3 adds 2 over iterations=1 within a method
    assert_eq!(volume[[0, 0, 0, 0, 2]] - volume[[0, 0, 0, 0, 0]], 2.0);
    Ok(())
}
