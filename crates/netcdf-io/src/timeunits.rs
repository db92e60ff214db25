//! Time-axis fix-up for finished archives.
//!
//! GrADS-DODS servers describe `time` as `days since 0001-01-01 00:00:00`, an
//! epoch many CF readers reject, and their values run one day ahead of the
//! valid time. [`fix_time_units`] rewrites such an axis in place to
//! `seconds since 1970-01-01 00:00:00`.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_text_attr, silence_hdf5_errors};

pub const EPOCH_SECONDS_UNITS: &str = "seconds since 1970-01-01 00:00:00";
pub const GRADS_DAYS_UNITS: &str = "days since 0001-01-01 00:00:00";

/// Unit strings whose values are GrADS day numbers. Archives written without
/// served units carry the `0000-01-01` label but hold the same values.
const GRADS_UNIT_PREFIXES: [&str; 3] = [
    "days since 0001-01-01",
    "days since 1-1-1",
    "days since 0000-01-01",
];

/// Days from 0001-01-01 to 1970-01-01 in the mixed Julian/Gregorian calendar.
const MIXED_CALENDAR_EPOCH_DAYS: f64 = 719_164.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Outcome of [`fix_time_units`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFix {
    /// Values and units were rewritten.
    Rewritten { steps: usize },
    /// The axis already used epoch seconds; the file was left untouched.
    AlreadyEpoch,
}

/// Convert a `days since 0001-01-01` value to Unix epoch seconds, including
/// the one-day correction.
pub fn days_since_year_one_to_epoch_seconds(days: f64) -> f64 {
    (days - MIXED_CALENDAR_EPOCH_DAYS - 1.0) * SECONDS_PER_DAY
}

/// Rewrite the `time` variable of the archive at `path`.
///
/// Idempotent: a second call returns [`TimeFix::AlreadyEpoch`].
pub fn fix_time_units(path: &Path) -> NetCdfResult<TimeFix> {
    silence_hdf5_errors();

    let mut file = netcdf::append(path).map_err(|e| NetCdfError::OpenFailed {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut var = file
        .variable_mut("time")
        .ok_or_else(|| NetCdfError::VariableNotFound {
            location: path.display().to_string(),
            variable: "time".to_string(),
        })?;

    let units = get_text_attr(&var, "units").unwrap_or_default();
    if units == EPOCH_SECONDS_UNITS {
        return Ok(TimeFix::AlreadyEpoch);
    }
    if !GRADS_UNIT_PREFIXES.iter().any(|p| units.starts_with(p)) {
        return Err(NetCdfError::InvalidFormat(format!(
            "cannot convert time units '{}'",
            units
        )));
    }

    let steps = var.dimensions().first().map(|d| d.len()).unwrap_or(0);
    let extents = [netcdf::Extent::from(0..steps)];
    let days: Vec<f64> = var
        .get_values(&extents[..])
        .map_err(|e| NetCdfError::ReadFailed {
            variable: "time".to_string(),
            message: e.to_string(),
        })?;

    let seconds: Vec<f64> = days
        .iter()
        .map(|&d| days_since_year_one_to_epoch_seconds(d))
        .collect();

    var.put_values(seconds.as_slice(), &extents[..])
        .map_err(|e| NetCdfError::write_failed("time", e))?;
    var.put_attribute("units", EPOCH_SECONDS_UNITS)
        .map_err(|e| NetCdfError::declaration("units of 'time'", e))?;
    var.put_attribute("calendar", "gregorian")
        .map_err(|e| NetCdfError::declaration("calendar of 'time'", e))?;

    let first_valid: Option<DateTime<Utc>> = seconds
        .first()
        .and_then(|s| DateTime::from_timestamp(*s as i64, 0));

    info!(
        path = %path.display(),
        steps = steps,
        first_valid = ?first_valid,
        "Rewrote time axis to {}", EPOCH_SECONDS_UNITS
    );

    Ok(TimeFix::Rewritten { steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_conversion_matches_calendar_date() {
        // GrADS serves 2022-05-28 00Z (ordinal 738_303) two days later.
        let served = 738_303.0 + 2.0;
        let expected = Utc.with_ymd_and_hms(2022, 5, 28, 0, 0, 0).unwrap().timestamp() as f64;
        assert_eq!(days_since_year_one_to_epoch_seconds(served), expected);
    }

    #[test]
    fn test_quarter_day_steps() {
        let a = days_since_year_one_to_epoch_seconds(738_305.0);
        let b = days_since_year_one_to_epoch_seconds(738_305.25);
        assert_eq!(b - a, 6.0 * 3600.0);
    }
}
