//! Backfill counters reported by the scheduler libraries.
//!
//! The scheduler appends a cumulative summary line of three integers
//! (`total contiguous basic`) to its log; the last such line is the final count.

use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::error::{ExperimentError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillRecord {
    pub total_backfills: u64,
    pub contiguous_backfills: u64,
    pub basic_backfills: u64,
}

/// Returns the last well-formed summary line of the log, `None` if the log is missing or has none.
pub fn extract(log_path: &Path) -> Option<BackfillRecord> {
    if !log_path.exists() {
        return None;
    }
    let bytes = match std::fs::read(log_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Could not read backfill log {:?}: {}", log_path, err);
            return None;
        }
    };
    String::from_utf8_lossy(&bytes)
        .lines()
        .rev()
        .find_map(parse_summary_line)
}

fn parse_summary_line(line: &str) -> Option<BackfillRecord> {
    let mut tokens = line.split_whitespace();
    let record = BackfillRecord {
        total_backfills: tokens.next()?.parse().ok()?,
        contiguous_backfills: tokens.next()?.parse().ok()?,
        basic_backfills: tokens.next()?.parse().ok()?,
    };
    match tokens.next() {
        Some(_) => None,
        None => Some(record),
    }
}

/// Line of a backfill series log: `<trial> (<total>, <contiguous>, <basic>)` or `<trial> FAILED`.
pub fn format_series_line(trial_index: usize, record: Option<&BackfillRecord>) -> String {
    match record {
        Some(record) => format!(
            "{} ({}, {}, {})",
            trial_index,
            record.total_backfills,
            record.contiguous_backfills,
            record.basic_backfills
        ),
        None => format!("{} FAILED", trial_index),
    }
}

fn parse_series_line(line: &str) -> Option<(usize, BackfillRecord)> {
    let (index, rest) = line.trim().split_once(' ')?;
    let trial_index = index.parse().ok()?;
    let inner = rest.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut values = inner.split(',').map(|value| value.trim().parse::<u64>());
    let record = BackfillRecord {
        total_backfills: values.next()?.ok()?,
        contiguous_backfills: values.next()?.ok()?,
        basic_backfills: values.next()?.ok()?,
    };
    if values.next().is_some() {
        return None;
    }
    Some((trial_index, record))
}

pub fn read_backfill_series_from_str(series: &str) -> Vec<(usize, BackfillRecord)> {
    series
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(parse_series_line)
        .collect()
}

/// Reads the successful trials of a series log. Failed and unparseable lines are skipped.
pub fn read_backfill_series(path: &Path) -> Result<Vec<(usize, BackfillRecord)>> {
    if !path.exists() {
        return Err(ExperimentError::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(read_backfill_series_from_str(&content))
}

/// Contiguous backfill counts of the trials that reported any backfill.
///
/// Trials whose log had no counters are written as `(0, 0, 0)` and are left out.
pub fn contiguous_backfill_samples(series: &[(usize, BackfillRecord)]) -> Vec<f64> {
    series
        .iter()
        .filter(|(_, record)| record.total_backfills > 0)
        .map(|(_, record)| record.contiguous_backfills as f64)
        .collect()
}
