//! Run configuration for the flood observation driver.
//!
//! A [`RunConfig`] describes which flood criteria to apply, which variables in the
//! regridded input files hold the accumulations and thresholds, and what to write
//! out. It is loaded from a TOML file, with any value overridable by an environment
//! variable prefixed with `ERO_VX_` (nested keys separated by `__`, for example
//! `ERO_VX_OUTPUT__NAME=ST4gFFG`).
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::criteria::{CriteriaPreset, DurationRule, FloodCriteria};
use crate::durations::AccumDuration;

/// Prefix for environment variables that override configuration values.
pub const ENV_PREFIX: &str = "ERO_VX_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Could not load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub criteria: CriteriaConfig,
    #[serde(default)]
    pub window: WindowConfig,
    pub inputs: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Load a configuration from `toml_file`, applying any `ERO_VX_` environment overrides.
    pub fn load(toml_file: &Path) -> Result<Self, ConfigError> {
        if !toml_file.exists() {
            return Err(ConfigError::NotFound(toml_file.to_path_buf()));
        }

        Self::figment(Toml::file(toml_file)).extract().map_err(ConfigError::from)
    }

    /// Parse a configuration from a TOML string. Environment overrides are not applied.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::from(Toml::string(toml_str)).extract().map_err(ConfigError::from)
    }

    fn figment(toml: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            .merge(toml)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn flood_criteria(&self) -> FloodCriteria {
        self.criteria.build()
    }

    /// Name of the flood proxy: the configured `output.name` if given, otherwise the
    /// preset's name, or for custom rules a name based on the threshold source.
    pub fn output_name(&self) -> String {
        if let Some(name) = &self.output.name {
            return name.clone();
        }

        match (&self.criteria, &self.inputs.thresholds) {
            (CriteriaConfig::Preset { preset }, _) => preset.proxy_name().to_string(),
            (CriteriaConfig::Custom(_), ThresholdSource::Ffg { .. }) => CriteriaPreset::Ffg.proxy_name().to_string(),
            (CriteriaConfig::Custom(_), _) => CriteriaPreset::AriDaily.proxy_name().to_string(),
        }
    }

    /// Lines of explanation written as comments at the top of the template file.
    pub fn template_comments() -> &'static [&'static str] {
        &[
            "Example configuration for calc_flood_obs.",
            "",
            "[criteria] selects the durations that make up the flood proxy. Either give",
            "a preset (one of 'ffg', 'ari_daily' or 'ari_six_hour') or a list of [[criteria.rules]],",
            "each with a 'duration' in hours (1, 3, 6, 12 or 24), an optional 'lookback' span",
            "in hours and an optional 'sliding' flag (set false to compare only the",
            "pre-aggregated accumulation for that duration).",
            "",
            "[window] gives the valid hour of the first time step in each input file. The",
            "default, 13, is the first hour of a 12Z to 12Z day.",
            "",
            "[inputs] names the variables in the input netCDF files. Thresholds are given",
            "one of three ways: 'ari_stack' (one variable with the 1/3/6/12/24 hour",
            "recurrence interval amounts stacked on the last dimension), 'ffg_01hr',",
            "'ffg_03hr' and 'ffg_06hr' (flash flood guidance issued every 6 hours), or",
            "a list of [[inputs.thresholds.per_duration]] entries.",
            "",
            "[output] name sets the output variable name and file name prefix. If omitted it",
            "follows the preset: ST4gFFG, ST4gARI or ST4gARI_6hr.",
            "",
            "Any value can be overridden by an environment variable, e.g. ERO_VX_OUTPUT__NAME.",
        ]
    }

    /// An example configuration for ST4 > ARI over one day.
    pub fn template_example() -> Self {
        Self {
            criteria: CriteriaConfig::Preset { preset: CriteriaPreset::AriDaily },
            window: WindowConfig::default(),
            inputs: InputConfig {
                hourly_accum: "ST4_01hr".to_string(),
                mask: Some("CONUSmask".to_string()),
                lat: default_lat(),
                lon: default_lon(),
                bucket_accum: vec![BucketVariable {
                    duration: AccumDuration::SixHour,
                    varname: "ST4_06hr".to_string(),
                    window_total_as: Some(AccumDuration::TwentyFourHour),
                }],
                thresholds: ThresholdSource::AriStack { ari_stack: "ARI".to_string() },
            },
            output: OutputConfig::default(),
        }
    }

    /// Render the template example, with comments, as TOML.
    pub fn template_toml() -> Result<String, ConfigError> {
        let mut s: String = Self::template_comments()
            .iter()
            .map(|line| if line.is_empty() { "#\n".to_string() } else { format!("# {line}\n") })
            .collect();
        s.push('\n');
        s.push_str(&toml::to_string_pretty(&Self::template_example())?);
        Ok(s)
    }
}

/// Flood criteria, either a named preset or an explicit list of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriteriaConfig {
    Preset { preset: CriteriaPreset },
    Custom(FloodCriteria),
}

impl CriteriaConfig {
    pub fn build(&self) -> FloodCriteria {
        match self {
            CriteriaConfig::Preset { preset } => (*preset).into(),
            CriteriaConfig::Custom(criteria) => criteria.clone(),
        }
    }

    pub fn rules(&self) -> Vec<DurationRule> {
        self.build().rules().to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Valid hour (hours since 00Z of the first day) of the first time step.
    #[serde(default = "default_first_valid_hour")]
    pub first_valid_hour: u32,

    /// Global attribute of the input files holding the time of valid hour 0, formatted
    /// "%Y-%m-%d %H:%M:%S". When present, output files are named after the window period.
    #[serde(default = "default_hour_zero_attribute")]
    pub hour_zero_attribute: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { first_valid_hour: default_first_valid_hour(), hour_zero_attribute: default_hour_zero_attribute() }
    }
}

fn default_first_valid_hour() -> u32 {
    13
}

fn default_hour_zero_attribute() -> String {
    "hour_zero".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Variable holding 1-hour accumulations, dimensioned (lat, lon, hour).
    pub hourly_accum: String,

    /// Optional (lat, lon) variable, nonzero inside the verification domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,

    #[serde(default = "default_lat")]
    pub lat: String,

    #[serde(default = "default_lon")]
    pub lon: String,

    /// Variables holding pre-aggregated accumulations, dimensioned (lat, lon, bucket).
    #[serde(default)]
    pub bucket_accum: Vec<BucketVariable>,

    pub thresholds: ThresholdSource,
}

fn default_lat() -> String {
    "lat".to_string()
}

fn default_lon() -> String {
    "lon".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketVariable {
    pub duration: AccumDuration,
    pub varname: String,

    /// If set, the sum of all buckets is also used as the single bucket of this duration
    /// (e.g. four 6-hour totals as the 24-hour total).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_total_as: Option<AccumDuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSource {
    AriStack { ari_stack: String },
    Ffg { ffg_01hr: String, ffg_03hr: String, ffg_06hr: String },
    PerDuration { per_duration: Vec<ThresholdVariable> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVariable {
    pub duration: AccumDuration,
    pub varname: String,

    /// `true` if the variable has one plane per bucket, `false` for a single (lat, lon) plane.
    #[serde(default)]
    pub per_bucket: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Name of the flood proxy, used as the output variable name and file name prefix.
    /// Defaults to a name derived from the criteria; see [`RunConfig::output_name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Also write the per-duration exceedance grids.
    #[serde(default)]
    pub per_duration: bool,

    /// Write a text list of the flooded points alongside each output file.
    #[serde(default = "default_true")]
    pub write_points: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { name: None, per_duration: false, write_points: true }
    }
}

fn default_true() -> bool {
    true
}
