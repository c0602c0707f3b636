//! Common errors across the ero-vx crate
use crate::durations::AccumDuration;

/// Errors raised while computing exceedance/flood grids.
///
/// All of these indicate a problem with how the aggregator was called (or with
/// the upstream regridding), not with the data values themselves. Missing data
/// (NaNs) is never an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("The {grid} grid has spatial shape {actual:?}, expected {expected:?} to match the hourly accumulation")]
    ShapeMismatch{grid: String, expected: (usize, usize), actual: (usize, usize)},
    #[error("Accumulation duration of {0} hours is not supported (must be 1, 3, 6, 12, or 24)")]
    UnsupportedDuration(u32),
    #[error("Verification window of {n_hours} hours is invalid: {reason}")]
    InvalidWindow{n_hours: usize, reason: String},
    #[error("No threshold grid was given for the {0} duration")]
    MissingThreshold(AccumDuration),
    #[error("The {0} duration was listed more than once in the flood criteria")]
    DuplicateDuration(AccumDuration),
    #[error("The {grid} grid for the {duration} duration has {actual} buckets, but the window needs {needed}")]
    TooFewBuckets{grid: String, duration: AccumDuration, needed: usize, actual: usize},
}

impl AggregationError {
    pub(crate) fn shape_mismatch<S: ToString>(grid: S, expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch { grid: grid.to_string(), expected, actual }
    }

    pub(crate) fn invalid_window<S: ToString>(n_hours: usize, reason: S) -> Self {
        Self::InvalidWindow { n_hours, reason: reason.to_string() }
    }

    pub(crate) fn too_few_buckets<S: ToString>(grid: S, duration: AccumDuration, needed: usize, actual: usize) -> Self {
        Self::TooFewBuckets { grid: grid.to_string(), duration, needed, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AggregationError::DuplicateDuration(AccumDuration::SixHour);
        assert_eq!(err.to_string(), "The 6-hour duration was listed more than once in the flood criteria");

        let err = AggregationError::MissingThreshold(AccumDuration::OneHour);
        assert_eq!(err.to_string(), "No threshold grid was given for the 1-hour duration");

        let err = AggregationError::too_few_buckets("FFG", AccumDuration::ThreeHour, 8, 4);
        assert_eq!(err.to_string(), "The FFG grid for the 3-hour duration has 4 buckets, but the window needs 8");

        let err = AggregationError::invalid_window(0, "must contain at least one hour");
        assert_eq!(err.to_string(), "Verification window of 0 hours is invalid: must contain at least one hour");
    }
}
