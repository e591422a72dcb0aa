use prettytable::{row, Table};
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap, fs::File, io::Write, path::Path, rc::Rc};

use crate::error::Result;
use crate::metrics::analysis::PerformanceReport;
use crate::metrics::collector::{EstimatorWrapper, MetricsCollector};
use crate::metrics::comparison::PairwiseComparison;

#[derive(Debug, Default, Deserialize, PartialEq)]
pub enum OutputFormat {
    #[default]
    JSON,
    PrettyTable,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct MetricsPrinterConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub output_file: std::path::PathBuf,
}

pub fn print_metrics(
    collector: Rc<RefCell<MetricsCollector>>,
    config: &MetricsPrinterConfig,
) -> Result<()> {
    match config.format {
        OutputFormat::PrettyTable => print_metrics_as_pretty_table(collector, &config.output_file),
        OutputFormat::JSON => print_metrics_as_json(collector, &config.output_file),
    }
}

pub fn metrics_tables(metrics: &MetricsCollector) -> (Table, Table) {
    let mut counters_table = Table::new();
    counters_table.add_row(row!["Algorithm", "Trials", "Succeeded", "Failed", "Total backfills"]);
    for (algorithm, metrics) in metrics.algorithms.iter() {
        counters_table.add_row(row![
            algorithm,
            metrics.trials,
            metrics.succeeded,
            metrics.failed,
            metrics.total_backfills
        ]);
    }

    let mut stats_table = Table::new();
    stats_table.add_row(row!["Metric", "Algorithm", "Min", "Max", "Mean", "Variance"]);
    for (algorithm, metrics) in metrics.algorithms.iter() {
        stats_table.add_row(row![
            "Makespan",
            algorithm,
            metrics.makespan_stats.min(),
            metrics.makespan_stats.max(),
            metrics.makespan_stats.mean(),
            metrics.makespan_stats.population_variance()
        ]);
    }
    for (algorithm, metrics) in metrics.algorithms.iter() {
        if metrics.contiguous_backfill_stats.count() == 0 {
            continue;
        }
        stats_table.add_row(row![
            "Contiguous backfills",
            algorithm,
            metrics.contiguous_backfill_stats.min(),
            metrics.contiguous_backfill_stats.max(),
            metrics.contiguous_backfill_stats.mean(),
            metrics.contiguous_backfill_stats.population_variance()
        ]);
    }

    (counters_table, stats_table)
}

pub fn print_metrics_as_pretty_table(
    collector: Rc<RefCell<MetricsCollector>>,
    output_file: &std::path::PathBuf,
) -> Result<()> {
    let metrics = collector.borrow();
    let mut metrics_file = File::create(output_file)?;

    let (counters_table, stats_table) = metrics_tables(&metrics);
    counters_table.print(&mut metrics_file)?;
    stats_table.print(&mut metrics_file)?;
    Ok(())
}

#[derive(Serialize)]
struct MetricsJSON {
    scenarios_generated: u64,
    algorithms: BTreeMap<String, AlgorithmJSON>,
}

#[derive(Serialize)]
struct AlgorithmJSON {
    counters: Counters,
    makespan: Stats,
    contiguous_backfills: Option<Stats>,
}

#[derive(Serialize)]
struct Counters {
    trials: u64,
    succeeded: u64,
    failed: u64,
    total_backfills: u64,
}

#[derive(Serialize)]
struct Stats {
    min: f64,
    max: f64,
    mean: f64,
    variance: f64,
}

impl From<&EstimatorWrapper> for Stats {
    fn from(stats: &EstimatorWrapper) -> Self {
        Self {
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            variance: stats.population_variance(),
        }
    }
}

pub fn print_metrics_as_json(
    collector: Rc<RefCell<MetricsCollector>>,
    output_file: &std::path::PathBuf,
) -> Result<()> {
    let metrics = collector.borrow();
    let mut metrics_file = File::create(output_file)?;

    let metrics = MetricsJSON {
        scenarios_generated: metrics.scenarios_generated,
        algorithms: metrics
            .algorithms
            .iter()
            .map(|(algorithm, metrics)| {
                let contiguous_backfills = if metrics.contiguous_backfill_stats.count() > 0 {
                    Some(Stats::from(&metrics.contiguous_backfill_stats))
                } else {
                    None
                };
                (
                    algorithm.clone(),
                    AlgorithmJSON {
                        counters: Counters {
                            trials: metrics.trials,
                            succeeded: metrics.succeeded,
                            failed: metrics.failed,
                            total_backfills: metrics.total_backfills,
                        },
                        makespan: Stats::from(&metrics.makespan_stats),
                        contiguous_backfills,
                    },
                )
            })
            .collect(),
    };

    let serialized_json = serde_json::to_string_pretty(&metrics)?;
    metrics_file.write_all(serialized_json.as_bytes())?;
    Ok(())
}

pub fn comparison_table(
    baseline: &str,
    candidate: &str,
    comparison: &PairwiseComparison,
) -> Table {
    let direction = if comparison.mean_percent_difference > 0.0 {
        "higher"
    } else {
        "lower"
    };
    let mut table = Table::new();
    table.add_row(row![format!("{} vs {}", candidate, baseline), "Value"]);
    table.add_row(row![
        "Performance difference",
        format!(
            "{:.1}% ({} than {})",
            comparison.mean_percent_difference.abs(),
            direction,
            baseline
        )
    ]);
    table.add_row(row!["Better", comparison.better_count]);
    table.add_row(row!["Worse", comparison.worse_count]);
    table.add_row(row!["Equal", comparison.equal_count]);
    table
}

pub fn performance_tables(report: &PerformanceReport) -> (Table, Table) {
    let mut summary_table = Table::new();
    summary_table.add_row(row!["Metric", "Value"]);
    summary_table.add_row(row!["Total jobs", report.total_jobs]);
    summary_table.add_row(row!["Makespan", format!("{:.2}", report.summary.makespan)]);
    summary_table.add_row(row![
        "Mean waiting time",
        format!("{:.2}", report.summary.mean_waiting_time)
    ]);
    summary_table.add_row(row![
        "Mean turnaround time",
        format!("{:.2}", report.summary.mean_turnaround_time)
    ]);
    summary_table.add_row(row!["Mean slowdown", format!("{:.2}", report.summary.mean_slowdown)]);
    summary_table.add_row(row!["Max slowdown", format!("{:.2}", report.summary.max_slowdown)]);
    summary_table.add_row(row![
        "Resource utilization",
        format!("{:.2}%", report.utilization_percent)
    ]);
    summary_table.add_row(row![
        "Average resources per job",
        format!("{:.2}", report.avg_resources_per_job)
    ]);
    summary_table.add_row(row![
        "Average execution time",
        format!("{:.2}", report.avg_execution_time)
    ]);
    summary_table.add_row(row![
        "Average waiting time",
        format!("{:.2}", report.avg_waiting_time)
    ]);
    summary_table.add_row(row!["Average stretch", format!("{:.2}", report.avg_stretch)]);
    summary_table.add_row(row!["Waiting time min", report.waiting_time.min]);
    summary_table.add_row(row!["Waiting time median", report.waiting_time.median]);
    summary_table.add_row(row!["Waiting time max", report.waiting_time.max]);

    let mut distribution_table = Table::new();
    distribution_table.add_row(row!["Resources", "Jobs", "Share"]);
    for (resources, count) in report.resource_distribution.iter() {
        distribution_table.add_row(row![
            resources,
            count,
            format!("{:.1}%", *count as f64 / report.total_jobs as f64 * 100.0)
        ]);
    }

    (summary_table, distribution_table)
}

/// Writes the report tables as a text summary.
pub fn write_performance_summary(report: &PerformanceReport, path: &Path) -> Result<()> {
    let mut summary_file = File::create(path)?;
    writeln!(summary_file, "=== SCHEDULER PERFORMANCE SUMMARY: {} ===", report.algorithm)?;
    let (summary_table, distribution_table) = performance_tables(report);
    summary_table.print(&mut summary_file)?;
    writeln!(summary_file, "\nResource Request Distribution:")?;
    distribution_table.print(&mut summary_file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::{print_metrics, MetricsPrinterConfig, OutputFormat};
    use crate::experiment::TrialResult;
    use crate::metrics::collector::MetricsCollector;

    #[test]
    fn test_print_metrics_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let output_file = dir.path().join("metrics.json");

        let collector = Rc::new(RefCell::new(MetricsCollector::new()));
        collector
            .borrow_mut()
            .record_trial(&TrialResult::succeeded(1, "basic", 420.0), None);
        collector
            .borrow_mut()
            .record_trial(&TrialResult::failed(2, "basic"), None);

        print_metrics(
            collector,
            &MetricsPrinterConfig {
                format: OutputFormat::JSON,
                output_file: output_file.clone(),
            },
        )
        .unwrap();

        let printed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output_file).unwrap()).unwrap();
        assert_eq!(printed["algorithms"]["basic"]["counters"]["trials"], 2);
        assert_eq!(printed["algorithms"]["basic"]["counters"]["failed"], 1);
        assert_eq!(printed["algorithms"]["basic"]["makespan"]["mean"], 420.0);
        assert!(printed["algorithms"]["basic"]["contiguous_backfills"].is_null());
    }

    #[test]
    fn test_print_metrics_as_table() {
        let dir = tempfile::tempdir().unwrap();
        let output_file = dir.path().join("metrics.txt");

        let collector = Rc::new(RefCell::new(MetricsCollector::new()));
        collector
            .borrow_mut()
            .record_trial(&TrialResult::succeeded(1, "best_cont", 420.0), None);

        print_metrics(
            collector,
            &MetricsPrinterConfig {
                format: OutputFormat::PrettyTable,
                output_file: output_file.clone(),
            },
        )
        .unwrap();

        let printed = std::fs::read_to_string(output_file).unwrap();
        assert!(printed.contains("best_cont"));
        assert!(printed.contains("Makespan"));
    }
}
