use std::collections::BTreeSet;
use std::{cell::RefCell, rc::Rc};

use crate::batsim::backfill::BackfillRecord;
use crate::batsim::runner::{SimulationRunner, TrialOutput};
use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::trace::platform::Topology;
use crate::trace::workload::WorkloadSet;

pub fn default_test_experiment_config(with_suffix: Option<&str>) -> ExperimentConfig {
    let mut default = r#"
    sim_name: "test_batsim_experiments"
    seed: 123
    num_sims: 3
    num_jobs: 5
    num_machines: 3
    algorithms: [A, B]
    "#
    .to_string();

    if let Some(suffix) = with_suffix {
        default.push_str(suffix);
    }

    ExperimentConfig::from_str(&default).unwrap()
}

/// A call made to [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerCall {
    pub trial_index: usize,
    pub algorithm: String,
    pub workload: WorkloadSet,
    pub machine_count: u32,
}

/// Runner stub that fails on chosen (trial, algorithm) pairs and succeeds otherwise.
///
/// The makespan of a successful trial is the sum of job walltimes, so algorithms given the same
/// workload report the same makespan.
pub struct ScriptedRunner {
    failures: BTreeSet<(usize, String)>,
    backfill: Option<BackfillRecord>,
    calls: Rc<RefCell<Vec<RunnerCall>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            failures: Default::default(),
            backfill: Some(BackfillRecord {
                total_backfills: 5,
                contiguous_backfills: 2,
                basic_backfills: 3,
            }),
            calls: Default::default(),
        }
    }

    pub fn fail_on(mut self, trial_index: usize, algorithm: &str) -> Self {
        self.failures.insert((trial_index, algorithm.to_string()));
        self
    }

    pub fn without_backfill(mut self) -> Self {
        self.backfill = None;
        self
    }

    /// Shared handle to the recorded calls, stays valid after the runner is boxed.
    pub fn calls(&self) -> Rc<RefCell<Vec<RunnerCall>>> {
        self.calls.clone()
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationRunner for ScriptedRunner {
    fn run(
        &mut self,
        trial_index: usize,
        algorithm: &str,
        workload: &WorkloadSet,
        topology: &Topology,
    ) -> Result<TrialOutput> {
        self.calls.borrow_mut().push(RunnerCall {
            trial_index,
            algorithm: algorithm.to_string(),
            workload: workload.clone(),
            machine_count: topology.machine_count,
        });

        if self
            .failures
            .contains(&(trial_index, algorithm.to_string()))
        {
            return Err(ExperimentError::ExternalProcessFailure {
                algorithm: algorithm.to_string(),
                status: Some(1),
                diagnostics: "scripted failure".to_string(),
            });
        }

        Ok(TrialOutput {
            makespan: workload.jobs.iter().map(|job| job.walltime as f64).sum(),
            backfill: self.backfill,
        })
    }
}
