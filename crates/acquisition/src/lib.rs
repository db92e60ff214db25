//! Acquisition of GFS forecast and FNL analysis fields from a GrADS-DODS
//! OPeNDAP catalog.
//!
//! A run resolves the newest published catalog entry ([`catalog`]), maps the
//! configured region onto the global grid once ([`subset`]), fetches every
//! variable for every time step with bounded retries ([`fetch`]) and writes
//! one NetCDF archive ([`orchestrator`], [`archive`]).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use acquisition::{AcquisitionConfig, OpendapSource, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Arc::new(AcquisitionConfig::load("config/acquisition.yaml".as_ref())?);
//! let orchestrator = Orchestrator::new(
//!     config,
//!     Arc::new(OpendapSource::new()),
//!     "/tmp/forcing",
//!     CancellationToken::new(),
//! );
//! let outcome = orchestrator.run_forecast(date).await?;
//! ```

pub mod archive;
pub mod buffers;
pub mod catalog;
pub mod config;
pub mod cycle;
pub mod error;
pub mod family;
pub mod fetch;
pub mod orchestrator;
pub mod source;
pub mod subset;

pub use catalog::{Catalog, DatasetReference, Navigator};
pub use config::{AcquisitionConfig, VariableSpec};
pub use cycle::ModelCycle;
pub use error::{AcquisitionError, Result, RunError, RunStage};
pub use family::{DatasetFamily, SteppingMode};
pub use fetch::{Fetcher, RetryPolicy};
pub use orchestrator::{
    forecast_file_name, reanalysis_file_name, reanalysis_window, Orchestrator, RunOutcome,
    RunState, RunTracker,
};
pub use source::{DatasetSource, OpendapSource, SourceError};
pub use subset::{compute_window, BoundingBox, GridWindow, LonSegment};
