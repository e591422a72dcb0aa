//! Config fields definitions for batsim experiments

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ExperimentError, Result};
use crate::metrics::printer::MetricsPrinterConfig;

#[derive(Debug, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    pub sim_name: String,
    pub seed: u64,
    pub num_sims: usize,
    pub num_jobs: u32,
    pub num_machines: u32,
    /// Invoked in this order within every trial. Each name maps to `lib<name>.so`.
    pub algorithms: Vec<String>,
    /// If not set default output of logs is stdout/stderr
    pub logs_filepath: Option<String>,
    #[serde(default)]
    pub workload: WorkloadGeneratorConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    pub metrics_printer: Option<MetricsPrinterConfig>,
}

#[derive(Clone, Copy, Default, Debug, Deserialize, PartialEq)]
pub enum ResourceBias {
    /// Resource requests drawn from the whole `[1, max_resource]` range.
    #[default]
    Uniform,
    /// Resource requests drawn from `[1, min(3, max_resource)]`, submissions packed near zero.
    SmallJobs,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkloadGeneratorConfig {
    pub resource_bias: ResourceBias,
    pub walltime_min: u64,
    pub walltime_max: u64,
    /// Upper bound of submission times. When unset it depends on `resource_bias`.
    pub submission_max: Option<u64>,
}

impl Default for WorkloadGeneratorConfig {
    fn default() -> Self {
        Self {
            resource_bias: ResourceBias::Uniform,
            walltime_min: 5,
            walltime_max: 30,
            submission_max: None,
        }
    }
}

impl WorkloadGeneratorConfig {
    pub fn submission_max(&self) -> u64 {
        match (self.submission_max, self.resource_bias) {
            (Some(max), _) => max,
            (None, ResourceBias::Uniform) => 100,
            (None, ResourceBias::SmallJobs) => 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    /// SimGrid speed rating of every compute node.
    pub node_speed: String,
    /// SimGrid speed rating of the controller host.
    pub master_speed: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            node_speed: "10Gf".to_string(),
            master_speed: "100Mf".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulator executable, resolved through PATH when not a path.
    pub binary: PathBuf,
    /// Directory holding `lib<algorithm>.so` files.
    pub library_dir: PathBuf,
    /// Root of per-trial working directories.
    pub work_dir: PathBuf,
    /// Name of the log file the scheduler library writes into its working directory.
    pub backfill_log: Option<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("batsim"),
            library_dir: PathBuf::from("build"),
            work_dir: PathBuf::from("out/trials"),
            backfill_log: Some("conservative_backfill_log.txt".to_string()),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Per-algorithm makespan logs are written here as `<algorithm>.txt`.
    pub results_dir: PathBuf,
    /// Per-algorithm backfill series, skipped when unset.
    pub backfill_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("res/makespan"),
            backfill_dir: Some(PathBuf::from("res/backfill")),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Paired samples with any value not above this are dropped as simulation artifacts.
    pub filter_threshold: f64,
    /// Relative tolerance under which two makespans count as equal.
    pub equal_tolerance: f64,
    /// Floor for the Silverman bandwidth.
    pub min_bandwidth: f64,
    pub grid_points: usize,
    pub grid_lower_clamp: Option<f64>,
    pub grid_upper_clamp: Option<f64>,
    /// Multiplier applied to the largest sample to get the grid upper bound.
    pub grid_upper_margin: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            filter_threshold: 300.0,
            equal_tolerance: 1e-4,
            min_bandwidth: 5.0,
            grid_points: 500,
            grid_lower_clamp: None,
            grid_upper_clamp: None,
            grid_upper_margin: 1.1,
        }
    }
}

impl ComparisonConfig {
    /// Grid settings used for contiguous backfill counts.
    pub fn for_backfill_counts() -> Self {
        Self {
            grid_lower_clamp: Some(50.0),
            grid_upper_clamp: Some(450.0),
            ..Default::default()
        }
    }
}

/// Algorithm names become file and directory names, so they must stay a single path component.
pub fn check_algorithm_name(algorithm: &str) -> Result<()> {
    if algorithm.trim().is_empty() {
        return Err(ExperimentError::InvalidArgument(
            "algorithm name must not be empty".to_string(),
        ));
    }
    if algorithm.contains(['/', '\\']) || algorithm == "." || algorithm == ".." {
        return Err(ExperimentError::InvalidArgument(format!(
            "algorithm name {:?} is not a plain file name",
            algorithm
        )));
    }
    Ok(())
}

impl ExperimentConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ExperimentError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        let config: ExperimentConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ExperimentError::InvalidArgument(msg.to_string()));

        if self.num_sims == 0 {
            return invalid("num_sims must be > 0");
        }
        if self.num_jobs == 0 {
            return invalid("num_jobs must be > 0");
        }
        if self.num_machines == 0 {
            return invalid("num_machines must be > 0");
        }
        if self.algorithms.is_empty() {
            return invalid("at least one algorithm is required");
        }
        for algorithm in self.algorithms.iter() {
            check_algorithm_name(algorithm)?;
        }
        if self.workload.walltime_min == 0
            || self.workload.walltime_min > self.workload.walltime_max
        {
            return invalid("walltime range must satisfy 1 <= walltime_min <= walltime_max");
        }
        if !(self.comparison.min_bandwidth > 0.0) {
            return invalid("min_bandwidth must be > 0");
        }
        if self.comparison.grid_points < 2 {
            return invalid("grid_points must be >= 2");
        }
        if !(self.comparison.equal_tolerance >= 0.0) {
            return invalid("equal_tolerance must be >= 0");
        }
        if !(self.comparison.filter_threshold >= 0.0) {
            return invalid("filter_threshold must be >= 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{check_algorithm_name, ExperimentConfig, ResourceBias};
    use crate::error::ExperimentError;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = ExperimentConfig::from_str(
            r#"
    sim_name: "contiguity"
    seed: 7
    num_sims: 4
    num_jobs: 128
    num_machines: 5
    algorithms: [basic, best_cont]
    "#,
        )
        .unwrap();

        assert_eq!(config.workload.resource_bias, ResourceBias::Uniform);
        assert_eq!(config.workload.walltime_min, 5);
        assert_eq!(config.workload.walltime_max, 30);
        assert_eq!(config.workload.submission_max(), 100);
        assert_eq!(config.platform.node_speed, "10Gf");
        assert_eq!(config.platform.master_speed, "100Mf");
        assert_eq!(config.comparison.filter_threshold, 300.0);
        assert_eq!(config.comparison.min_bandwidth, 5.0);
        assert!(config.metrics_printer.is_none());
    }

    #[test]
    fn test_small_jobs_bias_tightens_submissions() {
        let config = ExperimentConfig::from_str(
            r#"
    sim_name: "small"
    seed: 7
    num_sims: 1
    num_jobs: 10
    num_machines: 2
    algorithms: [fcfs]
    workload:
      resource_bias: SmallJobs
    "#,
        )
        .unwrap();

        assert_eq!(config.workload.resource_bias, ResourceBias::SmallJobs);
        assert_eq!(config.workload.submission_max(), 10);
    }

    #[test]
    fn test_zero_sims_rejected() {
        let err = ExperimentConfig::from_str(
            r#"
    sim_name: "broken"
    seed: 7
    num_sims: 0
    num_jobs: 10
    num_machines: 2
    algorithms: [fcfs]
    "#,
        )
        .unwrap_err();

        assert!(matches!(err, ExperimentError::InvalidArgument(_)));
    }

    #[test]
    fn test_negative_filter_threshold_rejected() {
        let err = ExperimentConfig::from_str(
            r#"
    sim_name: "broken"
    seed: 7
    num_sims: 1
    num_jobs: 10
    num_machines: 2
    algorithms: [fcfs]
    comparison:
      filter_threshold: -1.0
    "#,
        )
        .unwrap_err();

        assert!(matches!(err, ExperimentError::InvalidArgument(_)));
    }

    #[test]
    fn test_algorithm_names_must_be_file_names() {
        for name in ["../escape", "nested/basic", "..", "back\\slash"] {
            assert!(matches!(
                check_algorithm_name(name),
                Err(ExperimentError::InvalidArgument(_))
            ));
        }
        assert!(check_algorithm_name("best_cont").is_ok());
        assert!(check_algorithm_name("easy..bf").is_ok());

        let err = ExperimentConfig::from_str(
            r#"
    sim_name: "broken"
    seed: 7
    num_sims: 1
    num_jobs: 10
    num_machines: 2
    algorithms: [fcfs, "../fcfs"]
    "#,
        )
        .unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_walltime_range_rejected() {
        let err = ExperimentConfig::from_str(
            r#"
    sim_name: "broken"
    seed: 7
    num_sims: 1
    num_jobs: 10
    num_machines: 2
    algorithms: [fcfs]
    workload:
      walltime_min: 20
      walltime_max: 10
    "#,
        )
        .unwrap_err();

        assert!(matches!(err, ExperimentError::InvalidArgument(_)));
    }
}
