//! Accumulation durations and the hour/bucket bookkeeping for a verification window.
//!
//! Flood criteria are evaluated for a fixed set of accumulation durations. Each
//! duration `D` divides the verification window into "buckets" that end on valid
//! hours divisible by `D` (the "focus" hours). Everything in this module is about
//! mapping between the hour index along the accumulation grids' time axis, the
//! valid hour that index represents, and the bucket it belongs to for a given
//! duration.
use std::fmt::Display;
use std::ops::Range;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

/// Longest verification window the aggregator supports, in hours.
pub const MAX_WINDOW_HOURS: usize = 24;

/// The closed set of accumulation durations flood criteria can be defined for.
///
/// Serializes as the number of hours (e.g. `6`), and converting any other
/// number of hours gives [`AggregationError::UnsupportedDuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AccumDuration {
    OneHour,
    ThreeHour,
    SixHour,
    TwelveHour,
    TwentyFourHour,
}

impl AccumDuration {
    /// All supported durations, shortest first.
    pub const ALL: [AccumDuration; 5] = [
        Self::OneHour,
        Self::ThreeHour,
        Self::SixHour,
        Self::TwelveHour,
        Self::TwentyFourHour,
    ];

    pub fn hours(&self) -> usize {
        match self {
            Self::OneHour => 1,
            Self::ThreeHour => 3,
            Self::SixHour => 6,
            Self::TwelveHour => 12,
            Self::TwentyFourHour => 24,
        }
    }

    /// How many hours before a focus hour the first candidate sliding window may start.
    ///
    /// These reproduce the spans used operationally for the ERO verification (4, 10 and 22
    /// hours for the 3, 6 and 12 hour windows). That is `2D - 2`: every `D` hour window that
    /// overlaps the bucket ending at the focus hour by at least one hour. The 24 hour value
    /// follows the same pattern.
    pub fn default_lookback(&self) -> usize {
        match self {
            Self::OneHour => 0,
            Self::ThreeHour => 4,
            Self::SixHour => 10,
            Self::TwelveHour => 22,
            Self::TwentyFourHour => 46,
        }
    }

    /// Short name used in variable names and log messages, e.g. "06h".
    pub fn short_name(&self) -> String {
        format!("{:02}h", self.hours())
    }
}

impl Display for AccumDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-hour", self.hours())
    }
}

impl TryFrom<u32> for AccumDuration {
    type Error = AggregationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::OneHour),
            3 => Ok(Self::ThreeHour),
            6 => Ok(Self::SixHour),
            12 => Ok(Self::TwelveHour),
            24 => Ok(Self::TwentyFourHour),
            _ => Err(AggregationError::UnsupportedDuration(value)),
        }
    }
}

impl From<AccumDuration> for u32 {
    fn from(value: AccumDuration) -> Self {
        value.hours() as u32
    }
}

/// A contiguous run of hourly time steps over which flood occurrence is determined.
///
/// Valid hours are counted so that hour 1 is the hour ending at 01Z on the first day of
/// the data. The operational day-1 ERO window (12Z to 12Z) is therefore valid hours 13
/// through 36.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationWindow {
    first_valid_hour: u32,
    n_hours: usize,
}

impl VerificationWindow {
    pub fn new(first_valid_hour: u32, n_hours: usize) -> Result<Self, AggregationError> {
        if n_hours == 0 {
            return Err(AggregationError::invalid_window(n_hours, "must contain at least one hour"));
        }
        if n_hours > MAX_WINDOW_HOURS {
            return Err(AggregationError::invalid_window(
                n_hours,
                format!("cannot be longer than {MAX_WINDOW_HOURS} hours"),
            ));
        }
        if first_valid_hour.checked_add(n_hours as u32).is_none() {
            return Err(AggregationError::invalid_window(
                n_hours,
                format!("valid hours starting at {first_valid_hour} overflow"),
            ));
        }
        Ok(Self { first_valid_hour, n_hours })
    }

    /// The 12Z to 12Z window for ERO day `valid_day` (1-based).
    pub fn day(valid_day: u32) -> Result<Self, AggregationError> {
        let first_valid_hour = valid_day
            .saturating_sub(1)
            .checked_mul(24)
            .and_then(|h| h.checked_add(13))
            .ok_or_else(|| AggregationError::invalid_window(MAX_WINDOW_HOURS, format!("day {valid_day} is out of range")))?;
        Self::new(first_valid_hour, MAX_WINDOW_HOURS)
    }

    pub fn first_valid_hour(&self) -> u32 {
        self.first_valid_hour
    }

    pub fn n_hours(&self) -> usize {
        self.n_hours
    }

    pub fn valid_hours(&self) -> impl Iterator<Item = u32> {
        let first = self.first_valid_hour;
        (0..self.n_hours as u32).map(move |i| first + i)
    }

    /// Indices (along the hour axis) of the hours that close a bucket for `duration`.
    ///
    /// Normally these are the hours whose valid hour is divisible by the duration. If
    /// the duration is exactly as long as the window, the whole window is one bucket
    /// closed by the last hour, whatever its valid hour. Durations longer than the
    /// window have no buckets.
    pub fn focus_indices(&self, duration: AccumDuration) -> Vec<usize> {
        let d = duration.hours();
        if d > self.n_hours {
            return vec![];
        }
        if d == self.n_hours {
            return vec![self.n_hours - 1];
        }

        self.valid_hours()
            .enumerate()
            .filter_map(|(i, vhr)| if vhr % d as u32 == 0 { Some(i) } else { None })
            .collect()
    }

    pub fn n_buckets(&self, duration: AccumDuration) -> usize {
        self.focus_indices(duration).len()
    }

    /// For each hour index, the bucket it belongs to for `duration`.
    ///
    /// Hours are assigned to the bucket ending at the next focus hour at or after
    /// them. Hours after the last focus hour are in an incomplete trailing bucket,
    /// which is `None`.
    pub fn bucket_map(&self, duration: AccumDuration) -> Vec<Option<usize>> {
        let focus = self.focus_indices(duration);
        (0..self.n_hours)
            .map(|i| {
                let bucket = focus.iter().take_while(|&&f| f < i).count();
                if bucket < focus.len() {
                    Some(bucket)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Start and end times of the window, given the time that valid hour 0 represents.
    /// `None` if either falls outside the range chrono can represent.
    pub fn period(&self, hour_zero: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = hour_zero.checked_add_signed(Duration::hours(self.first_valid_hour as i64 - 1))?;
        let end = start.checked_add_signed(Duration::hours(self.n_hours as i64))?;
        Some((start, end))
    }

    /// File stem `<name>_s<YYYYMMDDHH>_e<YYYYMMDDHH>` for products covering this window.
    pub fn file_stem(&self, name: &str, hour_zero: NaiveDateTime) -> Option<String> {
        let (start, end) = self.period(hour_zero)?;
        Some(format!("{name}_s{}_e{}", start.format("%Y%m%d%H"), end.format("%Y%m%d%H")))
    }
}

/// Index ranges of the candidate sliding windows for one focus hour.
///
/// Windows start every hour from `focus - lookback` to `focus` inclusive and are
/// `duration` hours long. Starts before the beginning of the data are clipped to 0
/// (so the window is truncated, not shifted) and ends past the data are clipped to
/// `n_hours`. Windows that end at or before index 0 contain no data and are skipped.
pub fn candidate_windows(focus: usize, duration: usize, lookback: usize, n_hours: usize) -> Vec<Range<usize>> {
    let focus = focus as i64;
    let duration = duration as i64;
    let n_hours = n_hours as i64;

    let mut windows = vec![];
    for start in (focus - lookback as i64)..=focus {
        let end = start + duration;
        if end <= 0 {
            continue;
        }

        let start = start.max(0);
        let end = end.min(n_hours);
        if start >= end {
            continue;
        }
        windows.push(start as usize..end as usize);
    }
    windows
}
