//! Error type shared by generators, runner, driver and comparison code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Malformed parameters: non-positive counts, mismatched series, bad bandwidth, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Required upstream file is absent at the time it is consumed.
    #[error("missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// Simulator could not be launched or exited with non-zero status.
    #[error("simulator failed for algorithm {algorithm} (status {status:?}): {diagnostics}")]
    ExternalProcessFailure {
        algorithm: String,
        status: Option<i32>,
        diagnostics: String,
    },

    /// File exists but does not parse as expected.
    #[error("malformed result in {}: {reason}", path.display())]
    MalformedResult { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not (de)serialize json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
