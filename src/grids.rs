//! In-memory grid types consumed by the aggregator.
//!
//! All grids are indexed `(row, column, time)` where the time axis is either hours
//! (1-hour accumulations, per-hour thresholds) or buckets of some longer duration.
use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis, Zip};
use num_traits::Float;

use crate::durations::AccumDuration;
use crate::error::AggregationError;

/// Threshold grids keyed by the duration they apply to.
pub type Thresholds = BTreeMap<AccumDuration, ThresholdGrid>;

/// Pre-aggregated accumulations (e.g. native 6-hour precipitation analyses), keyed by
/// duration. Each array is `(row, column, bucket)`.
pub type BucketAccumulations = BTreeMap<AccumDuration, Array3<f32>>;

/// The precipitation amount above which flooding is declared for one duration.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdGrid {
    /// One value per cell, fixed over the whole window (e.g. recurrence-interval precipitation).
    Static(Array2<f32>),
    /// One plane per bucket of the duration (e.g. flash flood guidance issued every 6 hours,
    /// expanded onto 1- or 3-hour buckets).
    PerBucket(Array3<f32>),
}

impl ThresholdGrid {
    pub fn spatial_shape(&self) -> (usize, usize) {
        match self {
            Self::Static(arr) => arr.dim(),
            Self::PerBucket(arr) => {
                let (nrow, ncol, _) = arr.dim();
                (nrow, ncol)
            }
        }
    }

    /// Number of buckets provided, `None` for a static threshold (which covers any number).
    pub fn n_buckets(&self) -> Option<usize> {
        match self {
            Self::Static(_) => None,
            Self::PerBucket(arr) => Some(arr.len_of(Axis(2))),
        }
    }

    /// The threshold plane for bucket `ibucket`.
    ///
    /// # Panics
    /// If this is a per-bucket grid and `ibucket` is out of bounds. Callers should
    /// check [`ThresholdGrid::n_buckets`] first.
    pub fn bucket(&self, ibucket: usize) -> ArrayView2<'_, f32> {
        match self {
            Self::Static(arr) => arr.view(),
            Self::PerBucket(arr) => arr.index_axis(Axis(2), ibucket),
        }
    }
}

/// Spatial (row, column) extent of a time-stacked grid.
pub fn spatial_shape<T>(arr: ArrayView3<'_, T>) -> (usize, usize) {
    let (nrow, ncol, _) = arr.dim();
    (nrow, ncol)
}

/// Return an error if `actual` does not match the `expected` spatial shape.
pub fn check_spatial_shape(grid: &str, expected: (usize, usize), actual: (usize, usize)) -> Result<(), AggregationError> {
    if expected != actual {
        Err(AggregationError::shape_mismatch(grid, expected, actual))
    } else {
        Ok(())
    }
}

/// Copy of `arr` with every NaN replaced by zero.
pub fn zero_missing<F: Float>(arr: ArrayView3<'_, F>) -> Array3<F> {
    arr.mapv(|v| if v.is_nan() { F::zero() } else { v })
}

/// Sum accumulations over all buckets, giving a single-bucket `(row, column, 1)` array.
///
/// Missing values count as zero, so a cell is only missing in the total if it was
/// missing in every bucket, and then it is zero.
pub fn sum_buckets(accum: ArrayView3<'_, f32>) -> Array3<f32> {
    let total = zero_missing(accum).sum_axis(Axis(2));
    total.insert_axis(Axis(2))
}

/// Set every cell outside the `mask` (where `mask` is `false`) to `false` for all hours.
pub fn apply_mask(mut grid: ArrayViewMut3<'_, bool>, mask: ArrayView2<'_, bool>) -> Result<(), AggregationError> {
    check_spatial_shape("mask", spatial_shape(grid.view()), mask.dim())?;
    for mut plane in grid.axis_iter_mut(Axis(2)) {
        Zip::from(&mut plane).and(&mask).for_each(|v, &inside| {
            *v = *v && inside;
        });
    }
    Ok(())
}

/// Collapse the hour axis of a boolean grid: `true` where any hour is `true`.
pub fn any_over_time(grid: ArrayView3<'_, bool>) -> Array2<bool> {
    grid.fold_axis(Axis(2), false, |&acc, &v| acc || v)
}
