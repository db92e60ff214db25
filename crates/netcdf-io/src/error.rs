//! Error types for NetCDF reads and archive writes.

use thiserror::Error;

/// Result type for NetCDF operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF access.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Dataset could not be opened (missing file, unreachable DAP endpoint)
    #[error("Failed to open {location}: {message}")]
    OpenFailed { location: String, message: String },

    /// Requested variable is not present in the dataset
    #[error("Variable '{variable}' not found in {location}")]
    VariableNotFound { location: String, variable: String },

    /// Reading values from an open dataset failed
    #[error("Failed to read '{variable}': {message}")]
    ReadFailed { variable: String, message: String },

    /// Missing required dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Dimension, variable or attribute declaration failed
    #[error("Failed to declare {item}: {message}")]
    Declaration { item: String, message: String },

    /// Copying buffer contents into a declared variable failed
    #[error("Failed to write '{variable}': {message}")]
    WriteFailed { variable: String, message: String },
}

impl NetCdfError {
    /// Whether this error means the variable is absent rather than unreadable.
    pub fn is_variable_not_found(&self) -> bool {
        matches!(self, NetCdfError::VariableNotFound { .. })
    }

    pub(crate) fn declaration(item: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Declaration {
            item: item.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write_failed(variable: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            variable: variable.into(),
            message: err.to_string(),
        }
    }
}
