//! Experiment callbacks interface and implementations to define what happens on experiment start,
//! around every trial and on experiment finish.

use log::info;

use crate::error::Result;
use crate::experiment::{ExperimentDriver, ExperimentPlan, ExperimentResults, TrialResult};
use crate::metrics::printer::print_metrics;

pub trait ExperimentCallbacks {
    /// Runs after arguments are validated and result logs are created.
    fn on_experiment_start(&mut self, _driver: &ExperimentDriver, _plan: &ExperimentPlan) {}

    /// Runs once the scenario of the trial is generated, before the first algorithm.
    fn on_trial_start(&mut self, _driver: &ExperimentDriver, _trial_index: usize) {}

    /// Runs after every algorithm finished the trial, `results` in algorithm order.
    fn on_trial_finish(
        &mut self,
        _driver: &ExperimentDriver,
        _trial_index: usize,
        _results: &[TrialResult],
    ) {
    }

    /// Runs upon the completion of the last trial.
    fn on_experiment_finish(
        &mut self,
        _driver: &ExperimentDriver,
        _results: &ExperimentResults,
    ) -> Result<()> {
        Ok(())
    }
}

/// Logs progress of every trial and prints collected metrics when configured.
#[derive(Default)]
pub struct ProgressCallbacks {
    num_sims: usize,
}

impl ProgressCallbacks {
    pub fn new() -> Self {
        Self { num_sims: 0 }
    }
}

fn assert_and_print(driver: &ExperimentDriver) -> Result<()> {
    for (algorithm, metrics) in driver.metrics_collector.borrow().algorithms.iter() {
        assert_eq!(
            metrics.trials,
            metrics.succeeded + metrics.failed,
            "inconsistent counters of {}",
            algorithm
        );
        info!(
            "{}: {} of {} trials succeeded",
            algorithm, metrics.succeeded, metrics.trials
        );
    }

    if let Some(printer_config) = driver.config().metrics_printer.as_ref() {
        print_metrics(driver.metrics_collector.clone(), printer_config)?;
        info!("Metrics written to {:?}", printer_config.output_file);
    }
    Ok(())
}

impl ExperimentCallbacks for ProgressCallbacks {
    fn on_experiment_start(&mut self, _driver: &ExperimentDriver, plan: &ExperimentPlan) {
        self.num_sims = plan.num_sims;
        info!(
            "Starting {} simulations of {:?} with {} jobs on {} machines",
            plan.num_sims, plan.algorithms, plan.num_jobs, plan.num_machines
        );
    }

    fn on_trial_finish(
        &mut self,
        _driver: &ExperimentDriver,
        trial_index: usize,
        results: &[TrialResult],
    ) {
        let failed: Vec<&str> = results
            .iter()
            .filter(|result| result.is_failed())
            .map(|result| result.algorithm.as_str())
            .collect();
        if failed.is_empty() {
            info!("Simulation {}/{} completed", trial_index, self.num_sims);
        } else {
            info!(
                "Simulation {}/{} completed, failed: {:?}",
                trial_index, self.num_sims, failed
            );
        }
    }

    fn on_experiment_finish(
        &mut self,
        driver: &ExperimentDriver,
        _results: &ExperimentResults,
    ) -> Result<()> {
        assert_and_print(driver)
    }
}
