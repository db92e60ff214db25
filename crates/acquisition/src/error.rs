//! Error types for acquisition runs.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use netcdf_io::NetCdfError;
use thiserror::Error;

use crate::family::DatasetFamily;

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Catalog navigation exhausted its horizon
    #[error("No reachable {family} dataset in lookback window ({detail})")]
    NotFound { family: DatasetFamily, detail: String },

    /// The dataset does not carry the requested variable
    #[error("Variable '{variable}' not found in {url}")]
    VariableNotFound { variable: String, url: String },

    /// A read kept failing after every retry
    #[error("Fetch of '{variable}' from {url} failed after {attempts} attempts: {last_error}")]
    FetchFailed {
        variable: String,
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// The region selects no grid points along an axis
    #[error("No {axis} values inside the requested region")]
    EmptySelection { axis: &'static str },

    /// The region cannot be expressed as one contiguous window
    #[error("Region does not map to one contiguous window: {0}")]
    DisjointSelection(String),

    #[error("Failed to write archive {path}: {source}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: NetCdfError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded its time limit of {0:?}")]
    TimedOut(Duration),

    /// A blocking task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Stage of a run at which an error surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    Resolution,
    GridDiscovery,
    Fetch {
        variable: Option<String>,
        step: usize,
    },
    Write,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Resolution => f.write_str("resolution"),
            RunStage::GridDiscovery => f.write_str("grid discovery"),
            RunStage::Fetch {
                variable: Some(v),
                step,
            } => write!(f, "fetch of '{}' at step {}", v, step),
            RunStage::Fetch { variable: None, step } => write!(f, "fetch at step {}", step),
            RunStage::Write => f.write_str("write"),
        }
    }
}

/// Failure of a whole run, tagged with the stage that failed.
#[derive(Error, Debug)]
#[error("{family} run failed during {stage}: {source}")]
pub struct RunError {
    pub family: DatasetFamily,
    pub stage: RunStage,
    #[source]
    pub source: AcquisitionError,
}

impl RunError {
    pub fn new(family: DatasetFamily, stage: RunStage, source: AcquisitionError) -> Self {
        Self {
            family,
            stage,
            source,
        }
    }

    pub fn error(&self) -> &AcquisitionError {
        &self.source
    }
}
