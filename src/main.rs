use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use log::{error, info};
use prettytable::{row, Table};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use batsim_experiments::batsim::backfill::{contiguous_backfill_samples, read_backfill_series};
use batsim_experiments::batsim::runner::BatsimRunner;
use batsim_experiments::config::{
    ComparisonConfig, ExperimentConfig, PlatformConfig, ResourceBias, WorkloadGeneratorConfig,
};
use batsim_experiments::error::{ExperimentError, Result};
use batsim_experiments::experiment::result_log::{align_by_trial, read_result_log};
use batsim_experiments::experiment::ExperimentDriver;
use batsim_experiments::metrics::analysis::analyze;
use batsim_experiments::metrics::comparison::compare;
use batsim_experiments::metrics::density::{estimate_series_densities, write_densities_csv};
use batsim_experiments::metrics::printer::{
    comparison_table, performance_tables, write_performance_summary,
};
use batsim_experiments::trace::generator::{TopologyGenerator, WorkloadGenerator};

const LOG_FILE_MAX_BYTES: usize = 10 * 1024 * 1024;
const LOG_FILES_KEPT: usize = 5;

#[derive(Parser)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum DensitySource {
    /// Makespans of a result log
    Makespan,
    /// Contiguous backfill counts of a backfill series log
    Backfill,
}

#[derive(Subcommand)]
enum Command {
    /// Run the experiment described by a config file
    Run {
        #[clap(short, long)]
        config_file: PathBuf,
    },
    /// Write a synthetic workload
    GenerateJobs {
        #[clap(short, long)]
        num_jobs: u32,
        #[clap(short, long)]
        max_resource: u32,
        #[clap(short, long, default_value_t = 0)]
        seed: u64,
        /// Bias resource requests and submissions towards small values
        #[clap(long)]
        small_jobs: bool,
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Write a synthetic platform
    GenerateMachines {
        #[clap(short, long)]
        machine_count: u32,
        /// Defaults to machines_<count>.xml in the current directory
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare a candidate result log against a baseline one
    Compare {
        #[clap(long)]
        baseline: PathBuf,
        #[clap(long)]
        candidate: PathBuf,
        #[clap(long, default_value_t = 300.0)]
        filter_threshold: f64,
        #[clap(long, default_value_t = 1e-4)]
        equal_tolerance: f64,
    },
    /// Estimate densities of several series on a common grid
    Density {
        /// Series as label=path
        #[clap(required = true)]
        inputs: Vec<String>,
        #[clap(long, value_enum, default_value_t = DensitySource::Makespan)]
        source: DensitySource,
        #[clap(short, long)]
        output: PathBuf,
        #[clap(long)]
        min_bandwidth: Option<f64>,
        #[clap(long)]
        grid_points: Option<usize>,
    },
    /// Report scheduler performance of one simulation output directory
    Analyze {
        #[clap(short, long)]
        output_dir: PathBuf,
        #[clap(short, long, default_value = "scheduler")]
        algorithm: String,
        #[clap(long)]
        summary_file: Option<PathBuf>,
    },
}

fn init_logger(logs_filepath: Option<&str>) {
    // log level INFO by default
    let mut env_logger_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        env_logger_builder.filter_level(log::LevelFilter::Info);
    }
    if let Some(path) = logs_filepath {
        let log_file = FileRotate::new(
            path,
            AppendCount::new(LOG_FILES_KEPT),
            ContentLimit::Bytes(LOG_FILE_MAX_BYTES),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        env_logger_builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    env_logger_builder.init();
}

fn series_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(config: ExperimentConfig) -> Result<()> {
    let config = Rc::new(config);
    let runner = BatsimRunner::new(config.simulator.clone());
    let mut driver = ExperimentDriver::new(config.clone(), Box::new(runner));
    let results = driver.run()?;

    info!(
        "Experiment {:?} finished, result logs in {:?}",
        config.sim_name, config.output.results_dir
    );
    // every algorithm is compared against the first one
    if let Some((baseline, candidates)) = config.algorithms.split_first() {
        for candidate in candidates {
            let (a, b) = align_by_trial(&results[baseline], &results[candidate]);
            let comparison = compare(
                &a,
                &b,
                config.comparison.filter_threshold,
                config.comparison.equal_tolerance,
            )?;
            comparison_table(baseline, candidate, &comparison).printstd();
        }
    }
    Ok(())
}

fn generate_jobs(
    num_jobs: u32,
    max_resource: u32,
    seed: u64,
    small_jobs: bool,
    output: &Path,
) -> Result<()> {
    let generator = WorkloadGenerator::new(WorkloadGeneratorConfig {
        resource_bias: if small_jobs {
            ResourceBias::SmallJobs
        } else {
            ResourceBias::Uniform
        },
        ..Default::default()
    });
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let workload = generator.generate(&mut rng, num_jobs, max_resource)?;
    workload.write_to_file(output)?;
    info!("Created {:?} with {}", output, workload.description);
    Ok(())
}

fn generate_machines(machine_count: u32, output: Option<PathBuf>) -> Result<()> {
    let topology = TopologyGenerator::new(PlatformConfig::default()).generate(machine_count)?;
    let output = output.unwrap_or_else(|| PathBuf::from(topology.file_name()));
    topology.write_to_file(&output)?;
    info!("Created {:?} with {} machines", output, topology.machine_count);
    Ok(())
}

fn compare_logs(
    baseline: &Path,
    candidate: &Path,
    filter_threshold: f64,
    equal_tolerance: f64,
) -> Result<()> {
    let baseline_label = series_label(baseline);
    let candidate_label = series_label(candidate);
    let baseline_results = read_result_log(&baseline_label, baseline)?;
    let candidate_results = read_result_log(&candidate_label, candidate)?;

    let (a, b) = align_by_trial(&baseline_results, &candidate_results);
    info!("{} trials succeeded in both logs", a.len());
    let comparison = compare(&a, &b, filter_threshold, equal_tolerance)?;
    comparison_table(&baseline_label, &candidate_label, &comparison).printstd();
    Ok(())
}

fn density(
    inputs: &[String],
    source: DensitySource,
    output: &Path,
    min_bandwidth: Option<f64>,
    grid_points: Option<usize>,
) -> Result<()> {
    let mut config = match source {
        DensitySource::Makespan => ComparisonConfig::default(),
        DensitySource::Backfill => ComparisonConfig::for_backfill_counts(),
    };
    if let Some(min_bandwidth) = min_bandwidth {
        config.min_bandwidth = min_bandwidth;
    }
    if let Some(grid_points) = grid_points {
        config.grid_points = grid_points;
    }

    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for input in inputs {
        let (label, path) = input.split_once('=').ok_or_else(|| {
            ExperimentError::InvalidArgument(format!("expected label=path, got {}", input))
        })?;
        let path = Path::new(path);
        let values = match source {
            DensitySource::Makespan => read_result_log(label, path)?
                .into_iter()
                .filter_map(|result| result.makespan)
                .collect(),
            DensitySource::Backfill => contiguous_backfill_samples(&read_backfill_series(path)?),
        };
        series.insert(label.to_string(), values);
    }

    let densities = estimate_series_densities(&series, &config)?;
    write_densities_csv(&densities, output)?;

    let mut table = Table::new();
    table.add_row(row!["Series", "Samples", "Bandwidth", "Peak at"]);
    for density in densities.densities.iter() {
        let peak = density
            .estimate
            .peak()
            .map(|(x, _)| format!("{:.2}", x))
            .unwrap_or_default();
        table.add_row(row![
            density.label,
            density.sample_count,
            format!("{:.2}", density.bandwidth),
            peak
        ]);
    }
    table.printstd();
    info!("Densities written to {:?}", output);
    Ok(())
}

fn analyze_run(output_dir: &Path, algorithm: &str, summary_file: Option<PathBuf>) -> Result<()> {
    let report = analyze(algorithm, output_dir)?;
    let (summary_table, distribution_table) = performance_tables(&report);
    summary_table.printstd();
    distribution_table.printstd();
    if let Some(summary_file) = summary_file {
        write_performance_summary(&report, &summary_file)?;
        info!("Performance summary saved to {:?}", summary_file);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match &args.command {
        Command::Run { config_file } => match ExperimentConfig::from_file(config_file) {
            Ok(config) => Some(config),
            Err(err) => {
                init_logger(None);
                error!("Could not load config {:?}: {}", config_file, err);
                std::process::exit(1);
            }
        },
        _ => None,
    };
    init_logger(
        config
            .as_ref()
            .and_then(|config| config.logs_filepath.as_deref()),
    );

    let result = match args.command {
        Command::Run { .. } => config.map_or(Ok(()), run),
        Command::GenerateJobs {
            num_jobs,
            max_resource,
            seed,
            small_jobs,
            output,
        } => generate_jobs(num_jobs, max_resource, seed, small_jobs, &output),
        Command::GenerateMachines {
            machine_count,
            output,
        } => generate_machines(machine_count, output),
        Command::Compare {
            baseline,
            candidate,
            filter_threshold,
            equal_tolerance,
        } => compare_logs(&baseline, &candidate, filter_threshold, equal_tolerance),
        Command::Density {
            inputs,
            source,
            output,
            min_bandwidth,
            grid_points,
        } => density(&inputs, source, &output, min_bandwidth, grid_points),
        Command::Analyze {
            output_dir,
            algorithm,
            summary_file,
        } => analyze_run(&output_dir, &algorithm, summary_file),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}
