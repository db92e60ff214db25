//! Remote dataset access.
//!
//! [`DatasetSource`] is the seam between the acquisition logic and the
//! transport. [`OpendapSource`] talks to the real catalog through libnetcdf;
//! tests substitute an in-memory catalog.

use std::ops::Range;

use async_trait::async_trait;
use netcdf_io::{CoordinateVector, NetCdfError};
use thiserror::Error;

/// Failure of a single remote operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The dataset exists but does not carry the variable. Never retried.
    #[error("variable '{0}' not present")]
    VariableNotFound(String),

    /// Anything else: unreachable dataset, dropped connection, server error.
    #[error("{0}")]
    Transport(String),
}

impl From<NetCdfError> for SourceError {
    fn from(e: NetCdfError) -> Self {
        match e {
            NetCdfError::VariableNotFound { variable, .. } => SourceError::VariableNotFound(variable),
            other => SourceError::Transport(other.to_string()),
        }
    }
}

/// Read access to datasets addressed by URL.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Open the dataset and close it again.
    async fn probe(&self, url: &str) -> Result<(), SourceError>;

    /// Read a whole 1-D variable (`lon`, `lat`, `time`).
    async fn read_vector(&self, url: &str, variable: &str) -> Result<CoordinateVector, SourceError>;

    /// Read a `[time, lat, lon]` hyperslab, `[start, end)` per dimension.
    async fn read_slice(
        &self,
        url: &str,
        variable: &str,
        ranges: [Range<usize>; 3],
    ) -> Result<Vec<f32>, SourceError>;
}

/// Catalog access over OPeNDAP through libnetcdf.
///
/// libnetcdf calls block, so each one runs on tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct OpendapSource;

impl OpendapSource {
    pub fn new() -> Self {
        netcdf_io::silence_hdf5_errors();
        Self
    }
}

async fn blocking<T, F>(f: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, NetCdfError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::Transport(format!("read task failed: {}", e)))?
        .map_err(SourceError::from)
}

#[async_trait]
impl DatasetSource for OpendapSource {
    async fn probe(&self, url: &str) -> Result<(), SourceError> {
        let url = url.to_string();
        blocking(move || netcdf_io::probe(&url)).await
    }

    async fn read_vector(&self, url: &str, variable: &str) -> Result<CoordinateVector, SourceError> {
        let url = url.to_string();
        let variable = variable.to_string();
        blocking(move || netcdf_io::read_vector(&url, &variable)).await
    }

    async fn read_slice(
        &self,
        url: &str,
        variable: &str,
        ranges: [Range<usize>; 3],
    ) -> Result<Vec<f32>, SourceError> {
        let url = url.to_string();
        let variable = variable.to_string();
        blocking(move || netcdf_io::read_slice(&url, &variable, &ranges)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = NetCdfError::VariableNotFound {
            location: "http://host/dods/fnl/fnl20220526/fnlflx_00z".to_string(),
            variable: "tmp2m".to_string(),
        };
        assert_eq!(
            SourceError::from(missing),
            SourceError::VariableNotFound("tmp2m".to_string())
        );

        let dropped = NetCdfError::ReadFailed {
            variable: "tmp2m".to_string(),
            message: "NetCDF: DAP failure".to_string(),
        };
        assert!(matches!(SourceError::from(dropped), SourceError::Transport(_)));
    }

    #[tokio::test]
    async fn test_probe_unreachable_local_path() {
        let source = OpendapSource::new();
        let err = source.probe("/nonexistent/fnlflx_00z").await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
    }
}
