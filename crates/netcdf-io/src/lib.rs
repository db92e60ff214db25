//! NetCDF access for forcing acquisition.
//!
//! This crate wraps the `netcdf` library for the three things the acquisition
//! pipeline needs from it:
//!
//! - blocking reads against local files or OPeNDAP URLs ([`probe`],
//!   [`read_vector`], [`read_slice`]);
//! - writing a finished archive from an [`ArchiveSchema`] ([`write_archive`]);
//! - rewriting the GrADS `days since 0001-01-01` time axis to epoch seconds
//!   ([`fix_time_units`]).
//!
//! # System requirements
//!
//! libnetcdf must be built with DAP support for URL reads
//! (`nc-config --has-dap` reports `yes`).

pub mod error;
pub mod native;
pub mod schema;
pub mod timeunits;
pub mod writer;

pub use error::{NetCdfError, NetCdfResult};
pub use native::{probe, read_slice, read_vector, silence_hdf5_errors, CoordinateVector};
pub use schema::{
    ArchiveSchema, ArrayData, AttrValue, AttributeKey, DimensionSize, DimensionSpec, NumericType,
    VariableDecl,
};
pub use timeunits::{fix_time_units, TimeFix};
pub use writer::write_archive;
