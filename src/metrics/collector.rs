//! Implements centralized storage for experiment metrics. The driver reports every trial result
//! here, printers read the aggregated values at the end of an experiment.

use std::collections::BTreeMap;

use average::{concatenate, Estimate, Max, Mean, Min, Variance};

use crate::batsim::backfill::BackfillRecord;
use crate::experiment::TrialResult;

concatenate!(
    Estimator,
    [Min, min],
    [Max, max],
    [Mean, mean],
    [Variance, population_variance]
);

#[derive(Debug, Default)]
pub struct EstimatorWrapper {
    estimator: Estimator,
    count: u64,
}

impl std::fmt::Debug for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Estimator")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("mean", &self.mean)
            .field("population_variance", &self.population_variance)
            .finish()
    }
}

impl EstimatorWrapper {
    pub fn new() -> Self {
        Self {
            estimator: Estimator::new(),
            count: 0,
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        let mut wrapper = Self::new();
        for value in values {
            wrapper.add(*value);
        }
        wrapper
    }

    pub fn add(&mut self, value: f64) {
        self.estimator.add(value);
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> f64 {
        self.estimator.min()
    }

    pub fn max(&self) -> f64 {
        self.estimator.max()
    }

    pub fn mean(&self) -> f64 {
        self.estimator.mean()
    }

    pub fn population_variance(&self) -> f64 {
        self.estimator.population_variance()
    }

    pub fn std_dev(&self) -> f64 {
        self.population_variance().sqrt()
    }
}

impl PartialEq for EstimatorWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.min() == other.min()
            && self.max() == other.max()
            && self.mean() == other.mean()
            && self.population_variance() == other.population_variance()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct AlgorithmMetrics {
    /// The number of trials run for the algorithm, failed ones included.
    pub trials: u64,
    pub succeeded: u64,
    /// Equals to trials - succeeded.
    pub failed: u64,
    /// Estimations over makespans of successful trials.
    pub makespan_stats: EstimatorWrapper,
    /// Estimations over contiguous backfills of successful trials that reported counters.
    pub contiguous_backfill_stats: EstimatorWrapper,
    pub total_backfills: u64,
}

#[derive(Default)]
pub struct MetricsCollector {
    /// Per algorithm metrics, registered before the first trial.
    pub algorithms: BTreeMap<String, AlgorithmMetrics>,
    /// The number of scenarios (workload + platform pairs) generated.
    pub scenarios_generated: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            algorithms: Default::default(),
            scenarios_generated: 0,
        }
    }

    pub fn register_algorithm(&mut self, algorithm: &str) {
        self.algorithms.entry(algorithm.to_string()).or_default();
    }

    pub fn increment_scenarios(&mut self) {
        self.scenarios_generated += 1;
    }

    pub fn record_trial(&mut self, result: &TrialResult, backfill: Option<&BackfillRecord>) {
        let metrics = self.algorithms.entry(result.algorithm.clone()).or_default();
        metrics.trials += 1;
        match result.makespan {
            Some(makespan) => {
                metrics.succeeded += 1;
                metrics.makespan_stats.add(makespan);
                if let Some(record) = backfill {
                    metrics
                        .contiguous_backfill_stats
                        .add(record.contiguous_backfills as f64);
                    metrics.total_backfills += record.total_backfills;
                }
            }
            None => metrics.failed += 1,
        }
    }
}
