use std::{
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use error_stack::ResultExt;
use ero_vx::{
    config::RunConfig,
    criteria::FloodCriteria,
    logging::init_logging,
    nc_utils::{write_flood_obs, GridFile},
    points::{exceeded_points, write_point_list, write_summary_table, WindowSummary},
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

mod cli;

fn main() -> ExitCode {
    let clargs = cli::Cli::parse();
    init_logging(clargs.verbosity.log_level_filter(), clargs.log_file.as_deref());
    if let Err(e) = main_inner(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_inner(clargs: cli::Cli) -> error_stack::Result<(), CliError> {
    match clargs.command {
        cli::Commands::Run(run_cli) => run_driver(run_cli),
        cli::Commands::Template(template_cli) => write_template(&template_cli.template_file),
        cli::Commands::Debug(debug_cli) => {
            let config = load_config(&debug_cli.config_file)?;
            println!("Configuration:\n\n{config:#?}");
            println!("\nFlood criteria:\n\n{:#?}", config.flood_criteria());
            Ok(())
        }
    }
}

/// Process every input file, writing the flood observations and point lists and
/// reporting a summary at the end.
fn run_driver(cli: cli::RunCli) -> error_stack::Result<(), CliError> {
    let config = load_config(&cli.config_file)?;
    let criteria = config.flood_criteria();
    let files = expand_inputs(&cli.inputs)?;

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .change_context_lazy(|| CliError::context(format!("Could not set up {n} worker threads")))?;
    }

    std::fs::create_dir_all(&cli.output_dir).change_context_lazy(|| {
        CliError::context(format!("Error creating output directory {}", cli.output_dir.display()))
    })?;

    log::info!("Processing {} input files with {} durations", files.len(), criteria.rules().len());
    let pb = ProgressBar::new(files.len() as u64);
    let style = ProgressStyle::with_template("{prefix} {wide_bar} [{human_pos}/{human_len}]")
        .change_context_lazy(|| CliError::context("Invalid progress bar template"))?;
    pb.set_style(style);
    pb.set_prefix("Computing flood observations");

    let results: Vec<_> = files
        .par_iter()
        .map(|nc_file| {
            let res = process_file(nc_file, &config, &criteria, &cli.output_dir);
            pb.inc(1);
            (nc_file, res)
        })
        .collect();
    pb.finish_and_clear();

    let nfiles = results.len();
    let mut summaries = vec![];
    let mut nfailed = 0;
    for (nc_file, res) in results {
        match res {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                log::error!("Failed to process {}: {e:?}", nc_file.display());
                nfailed += 1;
            }
        }
    }

    if !cli.no_summary && !summaries.is_empty() {
        let mut stdout = std::io::stdout();
        write_summary_table(&mut stdout, &summaries)
            .change_context_lazy(|| CliError::context("Error writing the summary table"))?;
        stdout.flush().change_context_lazy(|| CliError::context("Error writing the summary table"))?;
    }

    if nfailed > 0 {
        return Err(CliError::FailedFiles { nfailed, nfiles }.into());
    }
    Ok(())
}

/// Aggregate one input file and write its outputs.
fn process_file(
    nc_file: &Path,
    config: &RunConfig,
    criteria: &FloodCriteria,
    output_dir: &Path,
) -> error_stack::Result<WindowSummary, CliError> {
    let grid_file = GridFile::read(nc_file, config)
        .change_context_lazy(|| CliError::context(format!("Error reading inputs from {}", nc_file.display())))?;

    let mut obs = grid_file
        .inputs
        .aggregate(criteria)
        .change_context_lazy(|| CliError::context(format!("Error computing flood grid for {}", nc_file.display())))?;

    if let Some(mask) = &grid_file.mask {
        obs.apply_mask(mask.view())
            .change_context_lazy(|| CliError::context(format!("Error applying domain mask for {}", nc_file.display())))?;
    }

    let name = config.output_name();
    let stem = output_stem(nc_file, &grid_file, &name)?;
    let out_file = output_dir.join(format!("{stem}.nc"));
    write_flood_obs(&out_file, &obs, &name, &grid_file.lat, &grid_file.lon, config.output.per_duration)
        .change_context_lazy(|| CliError::context(format!("Error writing {}", out_file.display())))?;

    if config.output.write_points {
        let points_file = output_dir.join(format!("{stem}.txt"));
        let points = exceeded_points(obs.window_summary().view(), grid_file.lat.view(), grid_file.lon.view())
            .change_context_lazy(|| CliError::context("Error collecting flooded points"))?;
        let mut f = std::fs::File::create(&points_file)
            .change_context_lazy(|| CliError::context(format!("Error creating {}", points_file.display())))?;
        write_point_list(&mut f, &name, &points)
            .change_context_lazy(|| CliError::context(format!("Error writing {}", points_file.display())))?;
    }

    let summary = WindowSummary::new(&stem, &obs);
    log::debug!("{stem}: {} flooded cells", summary.flood_cells);
    Ok(summary)
}

/// Name outputs after the window period if the input gave its time of hour zero,
/// otherwise after the input file.
fn output_stem(nc_file: &Path, grid_file: &GridFile, name: &str) -> error_stack::Result<String, CliError> {
    if let Some(hour_zero) = grid_file.hour_zero {
        grid_file.inputs.window.file_stem(name, hour_zero).ok_or_else(|| {
            CliError::context(format!(
                "Window period for {} is out of range from hour zero {hour_zero}",
                nc_file.display()
            ))
            .into()
        })
    } else {
        let input_stem = nc_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(format!("{name}_{input_stem}"))
    }
}

/// Expand glob patterns among the inputs; plain paths are kept as given.
fn expand_inputs(inputs: &[String]) -> error_stack::Result<Vec<PathBuf>, CliError> {
    let mut files = vec![];
    for pattern in inputs {
        let matches = glob::glob(pattern)
            .change_context_lazy(|| CliError::context(format!("Invalid input pattern: {pattern}")))?;

        let nbefore = files.len();
        for entry in matches {
            let entry = entry.change_context_lazy(|| CliError::context(format!("Error globbing for input files: {pattern}")))?;
            files.push(entry);
        }

        if files.len() == nbefore {
            return Err(CliError::NoInputs(pattern.clone()).into());
        }
    }
    Ok(files)
}

fn load_config(config_file: &Path) -> error_stack::Result<RunConfig, CliError> {
    RunConfig::load(config_file).change_context_lazy(|| {
        CliError::context(format!("Error loading configuration file: {}", config_file.display()))
    })
}

fn write_template(template_file: &Path) -> error_stack::Result<(), CliError> {
    let template = RunConfig::template_toml()
        .change_context_lazy(|| CliError::context("Error serializing the example configuration"))?;
    std::fs::write(template_file, template).change_context_lazy(|| {
        CliError::context(format!("Error writing to template file: {}", template_file.display()))
    })?;
    log::info!("Wrote example configuration to {}", template_file.display());
    Ok(())
}

/// Program error type
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Indicates an input argument matched no files.
    #[error("No input files found matching {0}")]
    NoInputs(String),

    #[error("{nfailed} of {nfiles} input files could not be processed")]
    FailedFiles { nfailed: usize, nfiles: usize },

    /// Wrapper type used to add information to an inner error.
    #[error("{0}")]
    Context(String),
}

impl CliError {
    fn context<S: ToString>(ctx: S) -> Self {
        Self::Context(ctx.to_string())
    }
}
