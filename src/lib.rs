pub mod error;
pub mod durations;
pub mod grids;
pub mod criteria;
pub mod aggregator;
pub mod products;
pub mod points;
pub mod config;
pub mod logging;
#[cfg(feature = "netcdf")]
pub mod nc_utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aggregator::{aggregate_exceedance, aggregate_windows, FloodObs, WindowInputs};
pub use durations::{AccumDuration, VerificationWindow};
pub use error::AggregationError;
