//! The windowed threshold aggregator.
//!
//! For one verification window, this determines for every grid cell whether the
//! precipitation accumulated over any sliding window of each requested duration
//! exceeded that duration's threshold, then unions the per-duration results into one
//! "flood occurred" grid.
//!
//! For each duration `D`, the window is split into buckets closed by the focus hours
//! (see [`VerificationWindow::focus_indices`]). For every focus hour, all `D` hour
//! windows starting between `lookback` hours before the focus and the focus itself are
//! summed and compared against the bucket's threshold; a bucket exceeds if any of them
//! does. If a pre-aggregated accumulation for `D` is supplied, its bucket value is
//! compared too. Each bucket's result is then copied to every hour in that bucket so
//! all durations share the hourly time axis and can be ORed together.
//!
//! Missing accumulations count as zero precipitation. A missing threshold never
//! exceeds. Comparisons are strictly greater-than.
use std::collections::BTreeMap;

use log::debug;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;

use crate::criteria::{DurationRule, FloodCriteria};
use crate::durations::{candidate_windows, AccumDuration, VerificationWindow};
use crate::error::AggregationError;
use crate::grids::{
    any_over_time, apply_mask, check_spatial_shape, spatial_shape, zero_missing, BucketAccumulations, ThresholdGrid,
    Thresholds,
};

/// Result of aggregating one verification window.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodObs {
    window: VerificationWindow,
    exceedances: BTreeMap<AccumDuration, Array3<bool>>,
    flood: Array3<bool>,
}

impl FloodObs {
    pub fn window(&self) -> &VerificationWindow {
        &self.window
    }

    /// The hourly exceedance grid for one duration, if that duration was evaluated.
    pub fn exceedance(&self, duration: AccumDuration) -> Option<ArrayView3<'_, bool>> {
        self.exceedances.get(&duration).map(|arr| arr.view())
    }

    pub fn exceedances(&self) -> impl Iterator<Item = (AccumDuration, ArrayView3<'_, bool>)> {
        self.exceedances.iter().map(|(&d, arr)| (d, arr.view()))
    }

    /// The union of all durations' exceedances, `(row, column, hour)`.
    pub fn flood_grid(&self) -> ArrayView3<'_, bool> {
        self.flood.view()
    }

    pub fn into_flood_grid(self) -> Array3<bool> {
        self.flood
    }

    /// One plane for the whole window: `true` where flooding occurred in any hour.
    pub fn window_summary(&self) -> Array2<bool> {
        any_over_time(self.flood.view())
    }

    /// Number of cells that exceeded at any hour, per duration.
    pub fn exceeded_counts(&self) -> BTreeMap<AccumDuration, usize> {
        self.exceedances
            .iter()
            .map(|(&d, arr)| (d, any_over_time(arr.view()).iter().filter(|&&v| v).count()))
            .collect()
    }

    /// Number of cells where flooding occurred at any hour.
    pub fn flood_cell_count(&self) -> usize {
        self.window_summary().iter().filter(|&&v| v).count()
    }

    /// Remove exceedances outside the domain `mask` from the flood grid and every duration.
    pub fn apply_mask(&mut self, mask: ArrayView2<'_, bool>) -> Result<(), AggregationError> {
        apply_mask(self.flood.view_mut(), mask)?;
        for arr in self.exceedances.values_mut() {
            apply_mask(arr.view_mut(), mask)?;
        }
        Ok(())
    }
}

/// Compute per-duration exceedance grids and the unioned flood grid for one window.
///
/// # Inputs
/// - `window`: the verification window; its length must match the hour axis of `hourly_accum`.
/// - `hourly_accum`: 1-hour accumulations, `(row, column, hour)`.
/// - `bucket_accum`: optional pre-aggregated accumulations for some durations, `(row, column, bucket)`.
/// - `thresholds`: a threshold grid for every duration in `criteria`.
/// - `criteria`: which durations to evaluate and how.
///
/// # Errors
/// - [`AggregationError::ShapeMismatch`] if any threshold or bucket accumulation has a different
///   spatial extent than `hourly_accum`.
/// - [`AggregationError::InvalidWindow`] if the hour axis does not match the window or is not 1 to 24 hours.
/// - [`AggregationError::MissingThreshold`] if a duration in `criteria` has no threshold.
/// - [`AggregationError::TooFewBuckets`] if a per-bucket threshold or bucket accumulation does not
///   cover every bucket of the window.
pub fn aggregate_exceedance(
    window: &VerificationWindow,
    hourly_accum: ArrayView3<'_, f32>,
    bucket_accum: &BucketAccumulations,
    thresholds: &Thresholds,
    criteria: &FloodCriteria,
) -> Result<FloodObs, AggregationError> {
    let (nrow, ncol, nhours) = hourly_accum.dim();
    VerificationWindow::new(window.first_valid_hour(), nhours)?;
    if nhours != window.n_hours() {
        return Err(AggregationError::invalid_window(
            window.n_hours(),
            format!("hourly accumulation has {nhours} hours"),
        ));
    }

    let shape = (nrow, ncol);
    let accum = zero_missing(hourly_accum);
    let mut exceedances = BTreeMap::new();
    let mut flood = Array3::from_elem((nrow, ncol, nhours), false);

    for rule in criteria.rules() {
        let threshold = thresholds
            .get(&rule.duration)
            .ok_or(AggregationError::MissingThreshold(rule.duration))?;
        check_spatial_shape(
            &format!("{} threshold", rule.duration),
            shape,
            threshold.spatial_shape(),
        )?;

        let bucketed = bucket_accum.get(&rule.duration).map(|arr| arr.view());
        if let Some(arr) = bucketed {
            check_spatial_shape(
                &format!("{} accumulation", rule.duration),
                shape,
                spatial_shape(arr),
            )?;
        }

        let exceed = duration_exceedance(window, accum.view(), bucketed, threshold, rule)?;
        Zip::from(&mut flood).and(&exceed).for_each(|f, &e| *f = *f || e);
        exceedances.insert(rule.duration, exceed);
    }

    Ok(FloodObs { window: *window, exceedances, flood })
}

/// All inputs for one verification window, owned so that windows can be processed independently.
#[derive(Debug, Clone)]
pub struct WindowInputs {
    pub window: VerificationWindow,
    pub hourly_accum: Array3<f32>,
    pub bucket_accum: BucketAccumulations,
    pub thresholds: Thresholds,
}

impl WindowInputs {
    pub fn aggregate(&self, criteria: &FloodCriteria) -> Result<FloodObs, AggregationError> {
        aggregate_exceedance(
            &self.window,
            self.hourly_accum.view(),
            &self.bucket_accum,
            &self.thresholds,
            criteria,
        )
    }
}

/// Aggregate many independent windows in parallel. Results are in the same order as `inputs`.
pub fn aggregate_windows(
    inputs: &[WindowInputs],
    criteria: &FloodCriteria,
) -> Vec<Result<FloodObs, AggregationError>> {
    inputs.par_iter().map(|inp| inp.aggregate(criteria)).collect()
}

/// Whether `amount` exceeds `threshold`; a missing threshold never does.
pub fn exceeds(amount: f32, threshold: f32) -> bool {
    !threshold.is_nan() && amount > threshold
}

fn duration_exceedance(
    window: &VerificationWindow,
    accum: ArrayView3<'_, f32>,
    bucketed: Option<ArrayView3<'_, f32>>,
    threshold: &ThresholdGrid,
    rule: &DurationRule,
) -> Result<Array3<bool>, AggregationError> {
    let (nrow, ncol, nhours) = accum.dim();
    let duration = rule.duration;
    let mut exceed = Array3::from_elem((nrow, ncol, nhours), false);

    let focus = window.focus_indices(duration);
    if focus.is_empty() {
        debug!("{duration} duration has no complete buckets in a {nhours} hour window, skipping");
        return Ok(exceed);
    }

    if let Some(n) = threshold.n_buckets() {
        if n < focus.len() {
            return Err(AggregationError::too_few_buckets("threshold", duration, focus.len(), n));
        }
    }

    let bucketed = if let Some(arr) = bucketed {
        let n = arr.len_of(Axis(2));
        if n < focus.len() {
            return Err(AggregationError::too_few_buckets("bucket accumulation", duration, focus.len(), n));
        }
        Some(zero_missing(arr))
    } else {
        None
    };

    let mut by_bucket = Array3::from_elem((nrow, ncol, focus.len()), false);
    for (ibucket, &ifocus) in focus.iter().enumerate() {
        let bucket_threshold = threshold.bucket(ibucket);
        let mut hit = by_bucket.index_axis_mut(Axis(2), ibucket);

        if rule.sliding {
            for span in candidate_windows(ifocus, duration.hours(), rule.effective_lookback(), nhours) {
                let total = accum.slice(s![.., .., span]).sum_axis(Axis(2));
                or_exceeds(hit.view_mut(), total.view(), bucket_threshold);
            }
        }

        if let Some(arr) = &bucketed {
            or_exceeds(hit.view_mut(), arr.index_axis(Axis(2), ibucket), bucket_threshold);
        }
    }

    for (ihour, bucket) in window.bucket_map(duration).into_iter().enumerate() {
        if let Some(ibucket) = bucket {
            exceed
                .index_axis_mut(Axis(2), ihour)
                .assign(&by_bucket.index_axis(Axis(2), ibucket));
        }
    }

    debug!(
        "{duration} duration: {} of {} buckets had an exceedance",
        by_bucket.axis_iter(Axis(2)).filter(|b| b.iter().any(|&v| v)).count(),
        focus.len()
    );
    Ok(exceed)
}

fn or_exceeds(mut hit: ArrayViewMut2<'_, bool>, amount: ArrayView2<'_, f32>, threshold: ArrayView2<'_, f32>) {
    Zip::from(&mut hit)
        .and(&amount)
        .and(&threshold)
        .for_each(|h, &a, &t| {
            if exceeds(a, t) {
                *h = true;
            }
        });
}
