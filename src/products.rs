//! Identification of CSU-MLP probabilistic forecast products and their probability binning.
//!
//! The machine-learning excessive rainfall forecasts come in several versions
//! (2017 through 2020, operational and reforecast runs). The version is encoded
//! in the file name and determines the label the gridded probabilities are stored
//! under, so it is resolved once when the file is opened rather than re-checked at
//! every use.
//!
//! This is library API for the forecast side of the verification. `calc_flood_obs`
//! only produces the observed flooding and does not read forecast files.
use std::fmt::Display;

/// Probability levels that forecast probabilities are binned onto, matching the
/// excessive rainfall outlook risk categories.
pub const PROBABILITY_BINS: [f32; 5] = [0.0, 0.05, 0.1, 0.2, 0.5];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("File name '{0}' does not contain a known CSU-MLP version marker")]
    UnknownVersion(String),
}

/// A version of the CSU-MLP excessive rainfall forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum ProductVersion {
    Operational2017,
    Reforecast2017,
    Operational2018,
    Reforecast2018,
    Operational2019,
    Operational2020,
}

impl ProductVersion {
    /// Identify the product version from a file name (or path) by its version marker.
    pub fn from_file_name(name: &str) -> Result<Self, ProductError> {
        use strum::IntoEnumIterator;
        Self::iter()
            .find(|v| name.contains(v.file_marker()))
            .ok_or_else(|| ProductError::UnknownVersion(name.to_string()))
    }

    /// The substring that identifies this version in file names.
    pub fn file_marker(&self) -> &'static str {
        match self {
            ProductVersion::Operational2017 => "_PROBS_GEFSO_V1_",
            ProductVersion::Reforecast2017 => "_PROBS_GEFSR_V1_",
            ProductVersion::Operational2018 => "_PROBS_GEFSO_V2018FFAIR_",
            ProductVersion::Reforecast2018 => "_PROBS_GEFSR_V2018FFAIR_",
            ProductVersion::Operational2019 => "_PROBS_GEFSO_V2019bFFAIR_",
            ProductVersion::Operational2020 => "_PROBS_V2020FFAIR_P0_GEFSO_",
        }
    }

    /// The variable name the binned probabilities are written under.
    pub fn label(&self) -> &'static str {
        match self {
            ProductVersion::Operational2017 => "CSUMLP_op_v2017",
            ProductVersion::Reforecast2017 => "CSUMLP_re_v2017",
            ProductVersion::Operational2018 => "CSUMLP_op_v2018",
            ProductVersion::Reforecast2018 => "CSUMLP_re_v2018",
            ProductVersion::Operational2019 => "CSUMLP_op_v2019",
            ProductVersion::Operational2020 => "CSUMLP_op_v2020",
        }
    }

    /// `true` for versions driven by the GEFS reforecast rather than the operational GEFS.
    pub fn is_reforecast(&self) -> bool {
        matches!(self, ProductVersion::Reforecast2017 | ProductVersion::Reforecast2018)
    }
}

impl Display for ProductVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Bin a forecast probability down to the nearest of [`PROBABILITY_BINS`].
///
/// Values below the lowest nonzero bin and missing values become 0; anything at or
/// above 0.5 becomes 0.5.
pub fn bin_probability(p: f32) -> f32 {
    if p.is_nan() {
        return 0.0;
    }

    PROBABILITY_BINS
        .iter()
        .rev()
        .copied()
        .find(|&lower| p >= lower)
        .unwrap_or(0.0)
}
