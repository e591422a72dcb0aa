//! Readers for the csv files the simulator exports after a run.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};

pub const SCHEDULE_FILE: &str = "schedule.csv";
pub const JOBS_FILE: &str = "jobs.csv";

/// One-row summary of a whole simulation run (`schedule.csv`).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ScheduleSummary {
    pub makespan: f64,
    pub mean_waiting_time: f64,
    pub mean_turnaround_time: f64,
    pub mean_slowdown: f64,
    pub max_slowdown: f64,
    pub time_computing: f64,
    pub time_idle: f64,
    pub nb_computing_machines: u32,
}

/// Per-job detail record (`jobs.csv`).
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub submission_time: f64,
    pub requested_number_of_resources: u32,
    pub starting_time: f64,
    pub execution_time: f64,
    pub finish_time: f64,
    pub waiting_time: f64,
    pub stretch: f64,
}

#[derive(Debug, Deserialize)]
struct MakespanRow {
    makespan: f64,
}

fn first_row<T: DeserializeOwned>(csv_str: &str) -> std::result::Result<Option<T>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_str.as_bytes());

    csv_reader.deserialize().next().transpose()
}

fn read_existing(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ExperimentError::MissingInput(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn malformed(path: &Path, reason: String) -> ExperimentError {
    ExperimentError::MalformedResult {
        path: path.to_path_buf(),
        reason,
    }
}

fn read_first_row<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_existing(path)?;
    match first_row(&content) {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(malformed(path, "no records".to_string())),
        Err(err) => Err(malformed(path, err.to_string())),
    }
}

/// Makespan of the first record, the only field a trial needs.
pub fn read_makespan(path: &Path) -> Result<f64> {
    let row: MakespanRow = read_first_row(path)?;
    Ok(row.makespan)
}

pub fn read_schedule_summary(path: &Path) -> Result<ScheduleSummary> {
    read_first_row(path)
}

fn read_jobs_from_str(jobs_str: &str) -> std::result::Result<Vec<JobRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(jobs_str.as_bytes());

    csv_reader.deserialize().collect()
}

pub fn read_jobs(path: &Path) -> Result<Vec<JobRecord>> {
    let content = read_existing(path)?;
    read_jobs_from_str(&content).map_err(|err| malformed(path, err.to_string()))
}
