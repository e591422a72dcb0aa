//! Repeated simulation trials of several scheduling algorithms on shared synthetic scenarios.

pub mod callbacks;
pub mod result_log;

use std::collections::{BTreeMap, BTreeSet};
use std::{cell::RefCell, rc::Rc};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::batsim::backfill::format_series_line;
use crate::batsim::runner::SimulationRunner;
use crate::config::{check_algorithm_name, ExperimentConfig};
use crate::error::{ExperimentError, Result};
use crate::experiment::callbacks::{ExperimentCallbacks, ProgressCallbacks};
use crate::experiment::result_log::ResultLog;
use crate::metrics::collector::MetricsCollector;
use crate::trace::generator::{TopologyGenerator, WorkloadGenerator};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    /// Starts from 1.
    pub trial_index: usize,
    pub algorithm: String,
    /// None marks a failed trial.
    pub makespan: Option<f64>,
}

impl TrialResult {
    pub fn succeeded(trial_index: usize, algorithm: &str, makespan: f64) -> Self {
        Self {
            trial_index,
            algorithm: algorithm.to_string(),
            makespan: Some(makespan),
        }
    }

    pub fn failed(trial_index: usize, algorithm: &str) -> Self {
        Self {
            trial_index,
            algorithm: algorithm.to_string(),
            makespan: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.makespan.is_none()
    }
}

/// Trial results of every algorithm, each series ordered by trial index.
pub type ExperimentResults = BTreeMap<String, Vec<TrialResult>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentPlan {
    pub algorithms: Vec<String>,
    pub num_sims: usize,
    pub num_jobs: u32,
    pub num_machines: u32,
}

impl ExperimentPlan {
    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExperimentError::InvalidArgument(msg));

        if self.algorithms.is_empty() {
            return invalid("at least one algorithm is required".to_string());
        }
        let mut seen = BTreeSet::new();
        for algorithm in self.algorithms.iter() {
            check_algorithm_name(algorithm)?;
            if !seen.insert(algorithm.as_str()) {
                return invalid(format!("algorithm {} is listed twice", algorithm));
            }
        }
        if self.num_sims == 0 {
            return invalid("num_sims must be >= 1".to_string());
        }
        if self.num_jobs == 0 {
            return invalid("num_jobs must be >= 1".to_string());
        }
        if self.num_machines == 0 {
            return invalid("num_machines must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Output logs of one algorithm.
struct AlgorithmLogs {
    algorithm: String,
    results: ResultLog,
    backfill: Option<ResultLog>,
}

struct NoCallbacks;

impl ExperimentCallbacks for NoCallbacks {}

pub struct ExperimentDriver {
    config: Rc<ExperimentConfig>,
    runner: Box<dyn SimulationRunner>,
    rng: ChaCha8Rng,
    workload_generator: WorkloadGenerator,
    topology_generator: TopologyGenerator,

    pub metrics_collector: Rc<RefCell<MetricsCollector>>,
}

impl ExperimentDriver {
    pub fn new(config: Rc<ExperimentConfig>, runner: Box<dyn SimulationRunner>) -> Self {
        info!(
            "Creating experiment {:?} with config: {:?}",
            config.sim_name, config
        );

        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            workload_generator: WorkloadGenerator::new(config.workload.clone()),
            topology_generator: TopologyGenerator::new(config.platform.clone()),
            metrics_collector: Rc::new(RefCell::new(MetricsCollector::new())),
            config,
            runner,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Runs the experiment described by the config, logging progress and printing metrics.
    pub fn run(&mut self) -> Result<ExperimentResults> {
        let config = self.config.clone();
        self.run_experiment_with_callbacks(
            &config.algorithms,
            config.num_sims,
            config.num_jobs,
            config.num_machines,
            &mut ProgressCallbacks::new(),
        )
    }

    pub fn run_experiment(
        &mut self,
        algorithms: &[String],
        num_sims: usize,
        num_jobs: u32,
        num_machines: u32,
    ) -> Result<ExperimentResults> {
        self.run_experiment_with_callbacks(
            algorithms,
            num_sims,
            num_jobs,
            num_machines,
            &mut NoCallbacks,
        )
    }

    /// Runs `num_sims` trials. Every trial generates one workload and one topology that all
    /// algorithms are run on, in the given order.
    ///
    /// Only invalid arguments and output log errors are returned. A failed trial is recorded as
    /// a failure and the experiment goes on.
    pub fn run_experiment_with_callbacks(
        &mut self,
        algorithms: &[String],
        num_sims: usize,
        num_jobs: u32,
        num_machines: u32,
        callbacks: &mut dyn ExperimentCallbacks,
    ) -> Result<ExperimentResults> {
        let plan = ExperimentPlan {
            algorithms: algorithms.to_vec(),
            num_sims,
            num_jobs,
            num_machines,
        };
        plan.validate()?;

        let mut logs = self.create_logs(&plan)?;
        let mut results: ExperimentResults = BTreeMap::new();
        for algorithm in plan.algorithms.iter() {
            self.metrics_collector
                .borrow_mut()
                .register_algorithm(algorithm);
            results.insert(algorithm.clone(), Vec::with_capacity(num_sims));
        }

        callbacks.on_experiment_start(self, &plan);

        for trial_index in 1..=num_sims {
            let workload =
                self.workload_generator
                    .generate(&mut self.rng, num_jobs, num_machines)?;
            let topology = self.topology_generator.generate(num_machines)?;
            self.metrics_collector.borrow_mut().increment_scenarios();
            debug!(
                "Trial {}: {} on {} machines",
                trial_index, workload.description, topology.machine_count
            );

            callbacks.on_trial_start(self, trial_index);

            let mut trial_results = Vec::with_capacity(logs.len());
            for algorithm_logs in logs.iter_mut() {
                let algorithm = algorithm_logs.algorithm.as_str();
                let (result, backfill) =
                    match self.runner.run(trial_index, algorithm, &workload, &topology) {
                        Ok(output) => (
                            TrialResult::succeeded(trial_index, algorithm, output.makespan),
                            Some(output.backfill),
                        ),
                        Err(err) => {
                            warn!("Trial {} of {} failed: {}", trial_index, algorithm, err);
                            (TrialResult::failed(trial_index, algorithm), None)
                        }
                    };

                algorithm_logs.results.append_trial(&result)?;
                if let Some(backfill_log) = algorithm_logs.backfill.as_mut() {
                    let record = backfill.map(|reported| reported.unwrap_or_default());
                    backfill_log.append_line(&format_series_line(trial_index, record.as_ref()))?;
                }

                self.metrics_collector
                    .borrow_mut()
                    .record_trial(&result, backfill.flatten().as_ref());
                if let Some(series) = results.get_mut(algorithm) {
                    series.push(result.clone());
                }
                trial_results.push(result);
            }

            callbacks.on_trial_finish(self, trial_index, &trial_results);
        }

        callbacks.on_experiment_finish(self, &results)?;
        Ok(results)
    }

    fn create_logs(&self, plan: &ExperimentPlan) -> Result<Vec<AlgorithmLogs>> {
        let mut logs = Vec::with_capacity(plan.algorithms.len());
        for algorithm in plan.algorithms.iter() {
            let results_path = self
                .config
                .output
                .results_dir
                .join(format!("{}.txt", algorithm));
            let results = ResultLog::create(
                &results_path,
                &[
                    format!("Makespan values for {} algorithm", algorithm),
                    format!(
                        "Number of jobs: {}, Number of machines: {}",
                        plan.num_jobs, plan.num_machines
                    ),
                    "Format: simulation_number, makespan".to_string(),
                ],
            )?;
            debug!("Result log of {}: {:?}", algorithm, results.path());

            let backfill = match self.config.output.backfill_dir.as_ref() {
                Some(backfill_dir) => Some(ResultLog::create(
                    &backfill_dir.join(format!("{}.txt", algorithm)),
                    &[
                        format!("Backfill statistics for {} algorithm", algorithm),
                        "Format: simulation_number (total, contiguous, basic)".to_string(),
                    ],
                )?),
                None => None,
            };

            logs.push(AlgorithmLogs {
                algorithm: algorithm.clone(),
                results,
                backfill,
            });
        }
        Ok(logs)
    }
}
