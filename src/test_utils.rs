use ndarray::{s, Array2, Array3, ArrayView3, Axis};

use crate::durations::AccumDuration;
use crate::grids::{ThresholdGrid, Thresholds};

/// A deterministic, irregular hourly accumulation field for property-style tests.
///
/// Values cycle through 0.0 to 5.0 in steps of 0.5 with different strides along each
/// axis, so neighboring cells and hours differ.
pub(crate) fn patterned_accum(nrow: usize, ncol: usize, nhours: usize) -> Array3<f32> {
    Array3::from_shape_fn((nrow, ncol, nhours), |(i, j, h)| {
        ((i * 7 + j * 3 + h * 5) % 11) as f32 * 0.5
    })
}

/// Static thresholds with one uniform value per duration.
pub(crate) fn uniform_thresholds(nrow: usize, ncol: usize, values: &[(AccumDuration, f32)]) -> Thresholds {
    values
        .iter()
        .map(|&(d, v)| (d, ThresholdGrid::Static(Array2::from_elem((nrow, ncol), v))))
        .collect()
}

/// Sum consecutive, non-overlapping blocks of `block` hours, as a native multi-hour
/// analysis would report them.
pub(crate) fn block_totals(hourly: ArrayView3<f32>, block: usize) -> Array3<f32> {
    let (nrow, ncol, nhours) = hourly.dim();
    let nblocks = nhours / block;
    let mut totals = Array3::zeros((nrow, ncol, nblocks));
    for b in 0..nblocks {
        let sum = hourly.slice(s![.., .., b * block..(b + 1) * block]).sum_axis(Axis(2));
        totals.index_axis_mut(Axis(2), b).assign(&sum);
    }
    totals
}
