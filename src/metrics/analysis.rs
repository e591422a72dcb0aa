//! Scheduler performance report of a single simulation run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::batsim::output::{
    read_jobs, read_schedule_summary, JobRecord, ScheduleSummary, JOBS_FILE, SCHEDULE_FILE,
};
use crate::error::{ExperimentError, Result};
use crate::metrics::collector::EstimatorWrapper;
use crate::metrics::density::percentile_sorted;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingTimeStats {
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub algorithm: String,
    pub total_jobs: usize,
    pub summary: ScheduleSummary,
    /// Share of machine time spent computing, in percent.
    pub utilization_percent: f64,
    pub avg_resources_per_job: f64,
    pub avg_execution_time: f64,
    pub avg_waiting_time: f64,
    pub avg_stretch: f64,
    /// Number of jobs per requested resource count.
    pub resource_distribution: BTreeMap<u32, usize>,
    pub waiting_time: WaitingTimeStats,
}

pub fn build_report(
    algorithm: &str,
    summary: ScheduleSummary,
    jobs: &[JobRecord],
) -> Result<PerformanceReport> {
    if jobs.is_empty() {
        return Err(ExperimentError::InvalidArgument(
            "cannot analyze a run without jobs".to_string(),
        ));
    }

    let machine_time = summary.makespan * summary.nb_computing_machines as f64;
    let utilization_percent = if machine_time > 0.0 {
        summary.time_computing / machine_time * 100.0
    } else {
        0.0
    };

    let mut resources = EstimatorWrapper::new();
    let mut execution = EstimatorWrapper::new();
    let mut stretch = EstimatorWrapper::new();
    let mut resource_distribution: BTreeMap<u32, usize> = BTreeMap::new();
    for job in jobs {
        resources.add(job.requested_number_of_resources as f64);
        execution.add(job.execution_time);
        stretch.add(job.stretch);
        *resource_distribution
            .entry(job.requested_number_of_resources)
            .or_insert(0) += 1;
    }

    let mut waiting: Vec<f64> = jobs.iter().map(|job| job.waiting_time).collect();
    let waiting_stats = EstimatorWrapper::from_values(&waiting);
    waiting.sort_by(|a, b| a.total_cmp(b));

    Ok(PerformanceReport {
        algorithm: algorithm.to_string(),
        total_jobs: jobs.len(),
        summary,
        utilization_percent,
        avg_resources_per_job: resources.mean(),
        avg_execution_time: execution.mean(),
        avg_waiting_time: waiting_stats.mean(),
        avg_stretch: stretch.mean(),
        resource_distribution,
        waiting_time: WaitingTimeStats {
            min: waiting_stats.min(),
            median: percentile_sorted(&waiting, 50.0),
            mean: waiting_stats.mean(),
            max: waiting_stats.max(),
        },
    })
}

/// Reads `schedule.csv` and `jobs.csv` from the simulator output directory of one run.
pub fn analyze(algorithm: &str, output_dir: &Path) -> Result<PerformanceReport> {
    let summary = read_schedule_summary(&output_dir.join(SCHEDULE_FILE))?;
    let jobs = read_jobs(&output_dir.join(JOBS_FILE))?;
    build_report(algorithm, summary, &jobs)
}

#[cfg(test)]
mod tests {
    use super::build_report;
    use crate::batsim::output::{JobRecord, ScheduleSummary};

    fn job(id: &str, resources: u32, execution_time: f64, waiting_time: f64) -> JobRecord {
        JobRecord {
            job_id: id.to_string(),
            submission_time: 0.0,
            requested_number_of_resources: resources,
            starting_time: waiting_time,
            execution_time,
            finish_time: waiting_time + execution_time,
            waiting_time,
            stretch: (waiting_time + execution_time) / execution_time,
        }
    }

    #[test]
    fn test_report_figures() {
        let summary = ScheduleSummary {
            makespan: 100.0,
            mean_waiting_time: 12.5,
            mean_turnaround_time: 30.0,
            mean_slowdown: 2.0,
            max_slowdown: 4.0,
            time_computing: 300.0,
            time_idle: 100.0,
            nb_computing_machines: 4,
        };
        let jobs = vec![
            job("job1", 1, 10.0, 0.0),
            job("job2", 2, 20.0, 10.0),
            job("job3", 2, 10.0, 30.0),
            job("job4", 3, 30.0, 10.0),
        ];

        let report = build_report("basic", summary, &jobs).unwrap();

        assert_eq!(report.total_jobs, 4);
        assert_eq!(report.utilization_percent, 75.0);
        assert!((report.avg_resources_per_job - 2.0).abs() < 1e-9);
        assert!((report.avg_execution_time - 17.5).abs() < 1e-9);
        assert_eq!(report.resource_distribution.get(&2), Some(&2));
        assert_eq!(report.resource_distribution.get(&3), Some(&1));
        assert_eq!(report.waiting_time.min, 0.0);
        assert_eq!(report.waiting_time.median, 10.0);
        assert!((report.waiting_time.mean - 12.5).abs() < 1e-9);
        assert_eq!(report.waiting_time.max, 30.0);
    }

    #[test]
    fn test_no_jobs_rejected() {
        let summary = ScheduleSummary {
            makespan: 0.0,
            mean_waiting_time: 0.0,
            mean_turnaround_time: 0.0,
            mean_slowdown: 0.0,
            max_slowdown: 0.0,
            time_computing: 0.0,
            time_idle: 0.0,
            nb_computing_machines: 1,
        };
        assert!(build_report("basic", summary, &[]).is_err());
    }
}
