//! Command line interface definitions
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Debug, Parser)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,

    /// Also write log messages to this file.
    #[clap(long, global = true)]
    pub(crate) log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Compute observed flooding for one or more regridded input files
    Run(RunCli),
    /// Create an example of the run configuration file
    Template(TemplateCli),
    /// Print out the parsed representation of a TOML configuration file.
    Debug(DebugCli),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct RunCli {
    /// Path to a TOML file containing the run configuration.
    pub(crate) config_file: PathBuf,

    /// Input netCDF files, one per verification window. Glob patterns
    /// (e.g. "inputs/*.nc") are expanded, so they can be quoted to avoid
    /// shell argument limits.
    #[clap(required = true)]
    pub(crate) inputs: Vec<String>,

    /// Directory to write the flood observation files to. It will be
    /// created if needed.
    #[clap(short = 'o', long)]
    pub(crate) output_dir: PathBuf,

    /// Number of input files to process in parallel. The default uses
    /// all available cores.
    #[clap(short = 'j', long)]
    pub(crate) threads: Option<usize>,

    /// Do not print the table of exceedance counts at the end.
    #[clap(long)]
    pub(crate) no_summary: bool,
}

/// Create an example of the run configuration file
#[derive(Debug, Clone, Args)]
pub(crate) struct TemplateCli {
    /// Path to write the template to
    pub(crate) template_file: PathBuf,
}

/// Print out the parsed representation of a TOML configuration file.
/// This can help confirm you've created the right configuration, including
/// any overrides from ERO_VX_ environment variables.
#[derive(Debug, Clone, Args)]
pub(crate) struct DebugCli {
    /// Path to the configuration file to parse
    pub(crate) config_file: PathBuf,
}
