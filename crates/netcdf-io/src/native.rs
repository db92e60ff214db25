//! Native NetCDF reads using the netcdf library.
//!
//! libnetcdf accepts either a local path or an OPeNDAP URL in `open`, so the
//! same calls serve local archives and the remote GrADS-DODS catalog. All
//! functions here are blocking; async callers should run them on the
//! blocking pool.
//!
//! # Notes
//!
//! Each call opens the dataset, reads what it needs and drops the handle
//! before returning. A DAP session that died halfway through a previous read
//! is therefore never reused.

use std::ops::Range;
use std::sync::Once;

use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// It only needs to be called once per process, but is safe to call multiple
/// times. Every entry point in this crate calls it before touching libnetcdf.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// A 1-D coordinate variable together with its time/axis descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateVector {
    pub values: Vec<f64>,
    pub units: Option<String>,
    pub calendar: Option<String>,
}

/// Open a dataset (local path or DAP URL).
pub(crate) fn open_dataset(location: &str) -> NetCdfResult<netcdf::File> {
    silence_hdf5_errors();

    netcdf::open(location).map_err(|e| NetCdfError::OpenFailed {
        location: location.to_string(),
        message: e.to_string(),
    })
}

/// Existence probe: open the dataset and immediately close it.
pub fn probe(location: &str) -> NetCdfResult<()> {
    let file = open_dataset(location)?;
    drop(file);
    debug!(location = %location, "Dataset reachable");
    Ok(())
}

/// Read an entire 1-D variable as `f64`, with its `units`/`calendar` attributes.
pub fn read_vector(location: &str, variable: &str) -> NetCdfResult<CoordinateVector> {
    let file = open_dataset(location)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| NetCdfError::VariableNotFound {
            location: location.to_string(),
            variable: variable.to_string(),
        })?;

    let values: Vec<f64> = var.get_values(..).map_err(|e| NetCdfError::ReadFailed {
        variable: variable.to_string(),
        message: e.to_string(),
    })?;

    Ok(CoordinateVector {
        values,
        units: get_text_attr(&var, "units"),
        calendar: get_text_attr(&var, "calendar"),
    })
}

/// Read a hyperslab of a 3-D variable as `f32`.
///
/// `ranges` are `[start, end)` in the variable's native dimension order
/// (time, latitude, longitude for the GrADS catalog). Values come back in
/// row-major order of that slab.
pub fn read_slice(location: &str, variable: &str, ranges: &[Range<usize>; 3]) -> NetCdfResult<Vec<f32>> {
    let file = open_dataset(location)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| NetCdfError::VariableNotFound {
            location: location.to_string(),
            variable: variable.to_string(),
        })?;

    let rank = var.dimensions().len();
    if rank != ranges.len() {
        return Err(NetCdfError::InvalidFormat(format!(
            "variable '{}' has {} dimensions, expected {}",
            variable,
            rank,
            ranges.len()
        )));
    }

    let extents: Vec<netcdf::Extent> = ranges.iter().cloned().map(netcdf::Extent::from).collect();
    let data: Vec<f32> = var
        .get_values(extents.as_slice())
        .map_err(|e| NetCdfError::ReadFailed {
            variable: variable.to_string(),
            message: e.to_string(),
        })?;

    debug!(
        variable = %variable,
        time = ?ranges[0],
        lat = ?ranges[1],
        lon = ?ranges[2],
        values = data.len(),
        "Read slab"
    );

    Ok(data)
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Helper to get a text attribute.
pub(crate) fn get_text_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
