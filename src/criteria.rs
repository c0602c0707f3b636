//! Which durations make up a flood criterion, and how to assemble their thresholds.
//!
//! The ERO verification uses two observational flood proxies: stage IV precipitation
//! exceeding flash flood guidance (ST4 > FFG) and stage IV precipitation exceeding the
//! average recurrence interval precipitation (ST4 > ARI). Both are the same windowed
//! comparison with different durations and thresholds, so both are expressed as a
//! [`FloodCriteria`] plus a [`Thresholds`] map.
use itertools::Itertools;
use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::durations::AccumDuration;
use crate::error::AggregationError;
use crate::grids::{ThresholdGrid, Thresholds};

/// How one duration is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRule {
    pub duration: AccumDuration,

    /// Backward-look span for candidate windows; `None` uses [`AccumDuration::default_lookback`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback: Option<usize>,

    /// Whether to evaluate sliding windows over the 1-hour accumulation. When `false`, only
    /// the pre-aggregated bucket accumulation for this duration (if any) is compared.
    #[serde(default = "default_sliding")]
    pub sliding: bool,
}

fn default_sliding() -> bool {
    true
}

impl DurationRule {
    pub fn sliding(duration: AccumDuration) -> Self {
        Self { duration, lookback: None, sliding: true }
    }

    pub fn bucket_only(duration: AccumDuration) -> Self {
        Self { duration, lookback: None, sliding: false }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn effective_lookback(&self) -> usize {
        self.lookback.unwrap_or_else(|| self.duration.default_lookback())
    }
}

/// The set of durations whose exceedances are unioned into the flood grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FloodCriteria {
    rules: Vec<DurationRule>,
}

impl FloodCriteria {
    /// Create criteria from a list of rules. Rules are kept in ascending duration order;
    /// listing a duration twice is an error.
    pub fn new(mut rules: Vec<DurationRule>) -> Result<Self, AggregationError> {
        rules.sort_by_key(|r| r.duration);
        if let Some((dup, _)) = rules.iter().tuple_windows().find(|(a, b)| a.duration == b.duration) {
            return Err(AggregationError::DuplicateDuration(dup.duration));
        }
        Ok(Self { rules })
    }

    /// Convenience constructor for sliding-window rules with default spans.
    pub fn from_durations(durations: &[AccumDuration]) -> Result<Self, AggregationError> {
        let rules = durations.iter().map(|&d| DurationRule::sliding(d)).collect();
        Self::new(rules)
    }

    /// ST4 > FFG: 1, 3 and 6 hour sliding windows.
    pub fn ffg() -> Self {
        Self {
            rules: vec![
                DurationRule::sliding(AccumDuration::OneHour),
                DurationRule::sliding(AccumDuration::ThreeHour),
                DurationRule::sliding(AccumDuration::SixHour),
            ],
        }
    }

    /// ST4 > ARI over a full day: 1 through 12 hour sliding windows, plus the 24 hour
    /// total compared directly (it is not slid).
    pub fn ari_daily() -> Self {
        Self {
            rules: vec![
                DurationRule::sliding(AccumDuration::OneHour),
                DurationRule::sliding(AccumDuration::ThreeHour),
                DurationRule::sliding(AccumDuration::SixHour),
                DurationRule::sliding(AccumDuration::TwelveHour),
                DurationRule::bucket_only(AccumDuration::TwentyFourHour),
            ],
        }
    }

    /// ST4 > ARI for a 6 hour window: 1, 3 and 6 hour sliding windows.
    pub fn ari_six_hour() -> Self {
        Self::ffg()
    }

    pub fn rules(&self) -> &[DurationRule] {
        &self.rules
    }

    pub fn durations(&self) -> impl Iterator<Item = AccumDuration> + '_ {
        self.rules.iter().map(|r| r.duration)
    }
}

impl<'de> Deserialize<'de> for FloodCriteria {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            rules: Vec<DurationRule>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.rules).map_err(serde::de::Error::custom)
    }
}

/// Named criteria that can be selected in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CriteriaPreset {
    Ffg,
    AriDaily,
    AriSixHour,
}

impl CriteriaPreset {
    /// Name of the flood proxy this preset computes, e.g. "ST4gFFG" for Stage IV > FFG.
    pub fn proxy_name(&self) -> &'static str {
        match self {
            CriteriaPreset::Ffg => "ST4gFFG",
            CriteriaPreset::AriDaily => "ST4gARI",
            CriteriaPreset::AriSixHour => "ST4gARI_6hr",
        }
    }
}

impl From<CriteriaPreset> for FloodCriteria {
    fn from(value: CriteriaPreset) -> Self {
        match value {
            CriteriaPreset::Ffg => FloodCriteria::ffg(),
            CriteriaPreset::AriDaily => FloodCriteria::ari_daily(),
            CriteriaPreset::AriSixHour => FloodCriteria::ari_six_hour(),
        }
    }
}

/// Split a stack of recurrence-interval precipitation grids into static thresholds.
///
/// `stack` is `(row, column, duration)` with the durations in 1, 3, 6, 12, 24 hour order;
/// a stack with fewer planes covers only the shortest durations (e.g. three planes for the
/// 6-hour verification); planes past the fifth are ignored. Negative values are the
/// products' missing marker and become NaN.
pub fn ari_thresholds(stack: ArrayView3<'_, f32>) -> Result<Thresholds, AggregationError> {
    let nplanes = stack.len_of(Axis(2));
    if nplanes == 0 {
        return Err(AggregationError::MissingThreshold(AccumDuration::OneHour));
    }

    let thresholds = AccumDuration::ALL
        .iter()
        .zip(stack.axis_iter(Axis(2)))
        .map(|(&d, plane)| {
            let plane = plane.mapv(|v| if v < 0.0 { f32::NAN } else { v });
            (d, ThresholdGrid::Static(plane))
        })
        .collect();
    Ok(thresholds)
}

/// Repeat each plane of `issued` `repeat` times along the time axis.
///
/// Guidance is issued every 6 hours; the 1 hour guidance applies to each of the six hours
/// after issuance and the 3 hour guidance to both 3 hour periods.
pub fn expand_issuances(issued: ArrayView3<'_, f32>, repeat: usize) -> Array3<f32> {
    let (nrow, ncol, nissued) = issued.dim();
    let mut expanded = Array3::zeros((nrow, ncol, nissued * repeat));
    for (i, plane) in issued.axis_iter(Axis(2)).enumerate() {
        for j in 0..repeat {
            expanded.index_axis_mut(Axis(2), i * repeat + j).assign(&plane);
        }
    }
    expanded
}

/// Assemble per-bucket flash flood guidance thresholds from the 6-hourly issuances of
/// the 1, 3 and 6 hour guidance.
pub fn ffg_thresholds(
    ffg_01hr: ArrayView3<'_, f32>,
    ffg_03hr: ArrayView3<'_, f32>,
    ffg_06hr: ArrayView3<'_, f32>,
) -> Thresholds {
    let mut thresholds = Thresholds::new();
    thresholds.insert(AccumDuration::OneHour, ThresholdGrid::PerBucket(expand_issuances(ffg_01hr, 6)));
    thresholds.insert(AccumDuration::ThreeHour, ThresholdGrid::PerBucket(expand_issuances(ffg_03hr, 2)));
    thresholds.insert(AccumDuration::SixHour, ThresholdGrid::PerBucket(ffg_06hr.to_owned()));
    thresholds
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_criteria_sorted_and_unique() {
        let criteria = FloodCriteria::from_durations(&[
            AccumDuration::SixHour,
            AccumDuration::OneHour,
            AccumDuration::ThreeHour,
        ])
        .unwrap();
        assert_eq!(criteria, FloodCriteria::ffg());

        let err = FloodCriteria::from_durations(&[AccumDuration::SixHour, AccumDuration::SixHour]).unwrap_err();
        assert_eq!(err, AggregationError::DuplicateDuration(AccumDuration::SixHour));
    }

    #[test]
    fn test_effective_lookback() {
        let rule = DurationRule::sliding(AccumDuration::SixHour);
        assert_eq!(rule.effective_lookback(), 10);
        assert_eq!(rule.with_lookback(5).effective_lookback(), 5);
    }

    #[test]
    fn test_presets() {
        let daily = FloodCriteria::ari_daily();
        let durations: Vec<_> = daily.durations().collect();
        assert_eq!(durations, AccumDuration::ALL.to_vec());
        assert!(!daily.rules().last().unwrap().sliding);
        assert_eq!(FloodCriteria::from(CriteriaPreset::AriSixHour), FloodCriteria::ffg());
    }

    #[test]
    fn test_deserialize_criteria() {
        let toml_str = r#"
        [[rules]]
        duration = 12
        lookback = 11

        [[rules]]
        duration = 1

        [[rules]]
        duration = 24
        sliding = false
        "#;
        let criteria: FloodCriteria = toml::from_str(toml_str).unwrap();
        assert_eq!(
            criteria.rules(),
            &[
                DurationRule::sliding(AccumDuration::OneHour),
                DurationRule::sliding(AccumDuration::TwelveHour).with_lookback(11),
                DurationRule::bucket_only(AccumDuration::TwentyFourHour),
            ]
        );

        let bad = "[[rules]]\nduration = 2\n";
        assert!(toml::from_str::<FloodCriteria>(bad).is_err());
    }

    #[test]
    fn test_ari_thresholds() {
        let mut stack = Array3::<f32>::zeros((2, 2, 5));
        for (i, mut plane) in stack.axis_iter_mut(Axis(2)).enumerate() {
            plane.fill(i as f32 + 1.0);
        }
        stack[[0, 0, 2]] = -9999.0;

        let thresholds = ari_thresholds(stack.view()).unwrap();
        assert_eq!(thresholds.len(), 5);
        let six = &thresholds[&AccumDuration::SixHour];
        assert!(six.bucket(0)[[0, 0]].is_nan());
        assert_eq!(six.bucket(0)[[1, 1]], 3.0);
        assert_eq!(
            thresholds[&AccumDuration::TwentyFourHour],
            ThresholdGrid::Static(Array2::from_elem((2, 2), 5.0))
        );

        let short = ari_thresholds(stack.slice(ndarray::s![.., .., ..3])).unwrap();
        assert_eq!(short.keys().copied().collect::<Vec<_>>(), vec![
            AccumDuration::OneHour,
            AccumDuration::ThreeHour,
            AccumDuration::SixHour
        ]);
    }

    #[test]
    fn test_ffg_thresholds() {
        let mut ffg_01 = Array3::<f32>::zeros((1, 1, 4));
        let mut ffg_03 = Array3::<f32>::zeros((1, 1, 4));
        let ffg_06 = Array3::<f32>::from_elem((1, 1, 4), 3.0);
        for i in 0..4 {
            ffg_01[[0, 0, i]] = i as f32;
            ffg_03[[0, 0, i]] = 10.0 + i as f32;
        }

        let thresholds = ffg_thresholds(ffg_01.view(), ffg_03.view(), ffg_06.view());
        assert_eq!(thresholds[&AccumDuration::OneHour].n_buckets(), Some(24));
        assert_eq!(thresholds[&AccumDuration::ThreeHour].n_buckets(), Some(8));
        assert_eq!(thresholds[&AccumDuration::SixHour].n_buckets(), Some(4));

        let one = &thresholds[&AccumDuration::OneHour];
        assert_eq!(one.bucket(5)[[0, 0]], 0.0);
        assert_eq!(one.bucket(6)[[0, 0]], 1.0);
        assert_eq!(one.bucket(23)[[0, 0]], 3.0);

        let three = &thresholds[&AccumDuration::ThreeHour];
        assert_eq!(three.bucket(2)[[0, 0]], 11.0);
        assert_eq!(three.bucket(3)[[0, 0]], 11.0);
    }

    #[test]
    fn test_empty_ari_stack() {
        let stack = Array3::<f32>::zeros((2, 2, 0));
        let err = ari_thresholds(stack.view()).unwrap_err();
        assert_eq!(err, AggregationError::MissingThreshold(AccumDuration::OneHour));
    }
}
