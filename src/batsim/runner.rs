//! Runs one simulation trial of one scheduling algorithm as an external simulator process.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::batsim::backfill::{self, BackfillRecord};
use crate::batsim::output::{read_makespan, SCHEDULE_FILE};
use crate::config::{check_algorithm_name, SimulatorConfig};
use crate::error::{ExperimentError, Result};
use crate::trace::platform::Topology;
use crate::trace::workload::WorkloadSet;

/// Directory, relative to the simulator working directory, where it exports its csv files.
pub const SIMULATOR_OUTPUT_DIR: &str = "out";

const WORKLOAD_FILE: &str = "workload.json";
const PLATFORM_FILE: &str = "platform.xml";
const SIMULATOR_LOG_FILE: &str = "simulator.log";
const DIAGNOSTIC_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutput {
    pub makespan: f64,
    pub backfill: Option<BackfillRecord>,
}

pub trait SimulationRunner {
    /// Runs `algorithm` on the given scenario. Launches at most one simulator process and never
    /// retries; an error means the trial failed.
    fn run(
        &mut self,
        trial_index: usize,
        algorithm: &str,
        workload: &WorkloadSet,
        topology: &Topology,
    ) -> Result<TrialOutput>;
}

/// Runs the simulator binary with `lib<algorithm>.so` loaded as the scheduler.
///
/// Each call works in its own directory `<work_dir>/trial_<index>/<algorithm>`, so the files the
/// simulator exports are never overwritten by a later trial.
pub struct BatsimRunner {
    config: SimulatorConfig,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

impl BatsimRunner {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn trial_dir(&self, trial_index: usize, algorithm: &str) -> PathBuf {
        self.config
            .work_dir
            .join(format!("trial_{}", trial_index))
            .join(algorithm)
    }

    pub fn library_path(&self, algorithm: &str) -> Result<PathBuf> {
        absolute(&self.config.library_dir.join(format!("lib{}.so", algorithm)))
    }

    fn command(
        &self,
        library: &Path,
        platform: &Path,
        workload: &Path,
        trial_dir: &Path,
    ) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("-l")
            .arg(library)
            .arg("0")
            .arg("")
            .arg("-p")
            .arg(platform)
            .arg("-w")
            .arg(workload)
            .current_dir(trial_dir);
        command
    }
}

impl SimulationRunner for BatsimRunner {
    fn run(
        &mut self,
        trial_index: usize,
        algorithm: &str,
        workload: &WorkloadSet,
        topology: &Topology,
    ) -> Result<TrialOutput> {
        check_algorithm_name(algorithm)?;
        let trial_dir = absolute(&self.trial_dir(trial_index, algorithm))?;
        // results of an earlier experiment must never be read back as this trial's
        if trial_dir.exists() {
            debug!("Clearing previous trial directory {:?}", trial_dir);
            std::fs::remove_dir_all(&trial_dir)?;
        }
        std::fs::create_dir_all(&trial_dir)?;

        let workload_path = trial_dir.join(WORKLOAD_FILE);
        let platform_path = trial_dir.join(PLATFORM_FILE);
        workload.write_to_file(&workload_path)?;
        topology.write_to_file(&platform_path)?;

        let library = self.library_path(algorithm)?;
        let mut command = self.command(&library, &platform_path, &workload_path, &trial_dir);
        debug!("Running simulator: {:?}", command);

        let output = command
            .output()
            .map_err(|err| ExperimentError::ExternalProcessFailure {
                algorithm: algorithm.to_string(),
                status: None,
                diagnostics: format!("could not launch {:?}: {}", self.config.binary, err),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        std::fs::write(
            trial_dir.join(SIMULATOR_LOG_FILE),
            format!("{}{}", stdout, stderr),
        )?;

        if !output.status.success() {
            let diagnostics = if stderr.trim().is_empty() {
                tail(&stdout, DIAGNOSTIC_TAIL_LINES)
            } else {
                tail(&stderr, DIAGNOSTIC_TAIL_LINES)
            };
            return Err(ExperimentError::ExternalProcessFailure {
                algorithm: algorithm.to_string(),
                status: output.status.code(),
                diagnostics,
            });
        }

        let makespan = read_makespan(&trial_dir.join(SIMULATOR_OUTPUT_DIR).join(SCHEDULE_FILE))?;
        let backfill = self
            .config
            .backfill_log
            .as_ref()
            .and_then(|log_name| backfill::extract(&trial_dir.join(log_name)));

        Ok(TrialOutput { makespan, backfill })
    }
}
