//! Append-only per-algorithm result logs.
//!
//! A log starts with `#` comment lines followed by one line per trial: `<trial_index> <makespan>`
//! or `<trial_index> FAILED`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ExperimentError, Result};
use crate::experiment::TrialResult;

pub const FAILED_MARKER: &str = "FAILED";

pub struct ResultLog {
    path: PathBuf,
    file: File,
}

impl ResultLog {
    /// Creates (or truncates) the log and writes `header` as comment lines.
    pub fn create(path: &Path, header: &[String]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        for line in header {
            writeln!(file, "# {}", line)?;
        }
        file.flush()?;

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn append_trial(&mut self, result: &TrialResult) -> Result<()> {
        self.append_line(&format_trial_line(result))
    }
}

pub fn format_trial_line(result: &TrialResult) -> String {
    match result.makespan {
        Some(makespan) => format!("{} {}", result.trial_index, makespan),
        None => format!("{} {}", result.trial_index, FAILED_MARKER),
    }
}

fn parse_trial_line(algorithm: &str, line: &str) -> Option<TrialResult> {
    let mut tokens = line.split_whitespace();
    let trial_index: usize = tokens.next()?.parse().ok()?;
    let value = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    if value == FAILED_MARKER {
        return Some(TrialResult::failed(trial_index, algorithm));
    }
    let makespan: f64 = value.parse().ok()?;
    Some(TrialResult::succeeded(trial_index, algorithm, makespan))
}

pub fn read_result_log_from_str(algorithm: &str, log: &str) -> Vec<TrialResult> {
    log.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| parse_trial_line(algorithm, line))
        .collect()
}

pub fn read_result_log(algorithm: &str, path: &Path) -> Result<Vec<TrialResult>> {
    if !path.exists() {
        return Err(ExperimentError::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(read_result_log_from_str(algorithm, &content))
}

/// Pairs the makespans of two series on trial indices where both succeeded, ordered by index.
pub fn align_by_trial(a: &[TrialResult], b: &[TrialResult]) -> (Vec<f64>, Vec<f64>) {
    let b_by_trial: BTreeMap<usize, f64> = b
        .iter()
        .filter_map(|result| result.makespan.map(|makespan| (result.trial_index, makespan)))
        .collect();
    let a_by_trial: BTreeMap<usize, f64> = a
        .iter()
        .filter_map(|result| result.makespan.map(|makespan| (result.trial_index, makespan)))
        .collect();

    a_by_trial
        .into_iter()
        .filter_map(|(trial_index, a_value)| {
            b_by_trial
                .get(&trial_index)
                .map(|b_value| (a_value, *b_value))
        })
        .unzip()
}
