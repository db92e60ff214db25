//! Common test fixtures for forcing-downloader tests.
//!
//! This module provides pre-defined regions, grid layouts and dates that represent
//! common scenarios of an acquisition run.

/// Bounding boxes as `(lon_min, lon_max, lat_min, lat_max)`.
pub mod region {
    /// Southern South America, the default operational region.
    pub const PATAGONIA: (f64, f64, f64, f64) = (-76.0, -50.0, -58.0, -30.0);

    /// Straddles the 0/360 seam.
    pub const SEAM: (f64, f64, f64, f64) = (-5.0, 5.0, -5.0, 5.0);

    /// Entirely in the eastern hemisphere, no wraparound.
    pub const EASTERN: (f64, f64, f64, f64) = (10.0, 40.0, 30.0, 60.0);

    /// Crosses the antimeridian in -180..180 notation.
    pub const PACIFIC: (f64, f64, f64, f64) = (170.0, 190.0, -10.0, 10.0);

    /// Latitude band outside the globe.
    pub const OFF_GLOBE: (f64, f64, f64, f64) = (0.0, 10.0, 95.0, 100.0);
}

/// Catalog grid layouts.
pub mod grid {
    /// Global grid specification (regular lon/lat).
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub resolution: f64,
        pub nlon: usize,
        pub nlat: usize,
    }

    /// `gfs_0p25`
    pub const GFS_0P25: GridSpec = GridSpec {
        resolution: 0.25,
        nlon: 1440,
        nlat: 721,
    };

    /// `gfs_0p50` and `gfs_hd`
    pub const GFS_0P50: GridSpec = GridSpec {
        resolution: 0.5,
        nlon: 720,
        nlat: 361,
    };

    /// `fnl`
    pub const FNL_1P00: GridSpec = GridSpec {
        resolution: 1.0,
        nlon: 360,
        nlat: 181,
    };

    /// Coarse grid for fast tests
    pub const COARSE_10: GridSpec = GridSpec {
        resolution: 10.0,
        nlon: 36,
        nlat: 19,
    };
}

/// Dates and cycles.
pub mod time {
    /// Reanalysis window used by the end-to-end scenario (9 six-hourly steps).
    pub const REANALYSIS_START: (i32, u32, u32) = (2022, 5, 26);
    pub const REANALYSIS_END: (i32, u32, u32) = (2022, 5, 28);

    /// GrADS time value (days since 0001-01-01) of 2022-05-26 00Z.
    pub const GRADS_2022_05_26: f64 = 738_303.0;
}
