//! Synthetic coordinate axes and fields.
//!
//! These generators create predictable, verifiable data shaped like the
//! GrADS-DODS GFS catalog: longitudes `0 ..< 360` eastward, latitudes
//! `-90 ..= 90` northward, fields in `[time, lat, lon]` row-major order.

/// Global longitude axis `0, res, 2*res, ... < 360`.
///
/// # Example
///
/// ```
/// use test_utils::global_lon_axis;
///
/// let lon = global_lon_axis(90.0);
/// assert_eq!(lon, vec![0.0, 90.0, 180.0, 270.0]);
/// ```
pub fn global_lon_axis(resolution: f64) -> Vec<f64> {
    let n = (360.0 / resolution).round() as usize;
    (0..n).map(|i| i as f64 * resolution).collect()
}

/// Global latitude axis `-90 ..= 90` (south to north).
///
/// ```
/// use test_utils::global_lat_axis;
///
/// let lat = global_lat_axis(45.0);
/// assert_eq!(lat, vec![-90.0, -45.0, 0.0, 45.0, 90.0]);
/// ```
pub fn global_lat_axis(resolution: f64) -> Vec<f64> {
    let n = (180.0 / resolution).round() as usize + 1;
    (0..n).map(|j| -90.0 + j as f64 * resolution).collect()
}

/// Value stored by [`create_test_field`] at a given index.
///
/// `step * 1_000_000 + lat_index * 1000 + lon_index`, which lets a test tell
/// from a single value exactly which cell of which step it came from.
pub fn test_field_value(step: usize, lat_index: usize, lon_index: usize) -> f32 {
    (step * 1_000_000 + lat_index * 1000 + lon_index) as f32
}

/// Creates a `[steps, nlat, nlon]` field filled with [`test_field_value`].
///
/// # Example
///
/// ```
/// use test_utils::create_test_field;
///
/// let field = create_test_field(2, 3, 4);
/// assert_eq!(field.len(), 24);
/// assert_eq!(field[1], 1.0);        // step 0, lat 0, lon 1
/// assert_eq!(field[4], 1000.0);     // step 0, lat 1, lon 0
/// assert_eq!(field[12], 1_000_000.0); // step 1
/// ```
pub fn create_test_field(steps: usize, nlat: usize, nlon: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(steps * nlat * nlon);
    for t in 0..steps {
        for j in 0..nlat {
            for i in 0..nlon {
                data.push(test_field_value(t, j, i));
            }
        }
    }
    data
}

/// GrADS-style time value (days since 0001-01-01) of a 6-hourly step.
///
/// `start_days` is the value of step 0.
pub fn grads_time_axis(start_days: f64, steps: usize) -> Vec<f64> {
    (0..steps).map(|t| start_days + t as f64 * 0.25).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_degree_axes() {
        let lon = global_lon_axis(0.25);
        let lat = global_lat_axis(0.25);
        assert_eq!(lon.len(), 1440);
        assert_eq!(lat.len(), 721);
        assert_eq!(lon[1439], 359.75);
        assert_eq!(lat[720], 90.0);
    }

    #[test]
    fn test_field_value_layout() {
        let field = create_test_field(3, 5, 7);
        let idx = 2 * 35 + 4 * 7 + 6;
        assert_eq!(field[idx], test_field_value(2, 4, 6));
    }

    #[test]
    fn test_grads_time_axis() {
        let t = grads_time_axis(738_305.0, 4);
        assert_eq!(t, vec![738_305.0, 738_305.25, 738_305.5, 738_305.75]);
    }
}
