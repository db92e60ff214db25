//! Grid subsetting: bounding box to index window on a global lon/lat grid.
//!
//! Catalog longitudes run `0 ..< 360`. A requested box may be given in
//! `-180 .. 180` and may straddle the 0/360 seam, so the selection is done in
//! an *unwrapped* index space where index `i - n` stands for `lon[i] - 360`
//! and `i + n` for `lon[i] + 360` (`n` = number of longitudes). Any box no
//! wider than the globe then maps to one contiguous unwrapped range, which a
//! fetch reads as at most two native segments and stitches back together.

use std::ops::Range;

use tracing::debug;

use crate::error::{AcquisitionError, Result};

/// Region of interest in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// The box grown by `margin` degrees on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            lon_min: self.lon_min - margin,
            lon_max: self.lon_max + margin,
            lat_min: self.lat_min - margin,
            lat_max: self.lat_max + margin,
        }
    }

    fn contains_lon(&self, lon: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max
    }

    fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max
    }
}

impl From<(f64, f64, f64, f64)> for BoundingBox {
    fn from((lon_min, lon_max, lat_min, lat_max): (f64, f64, f64, f64)) -> Self {
        Self::new(lon_min, lon_max, lat_min, lat_max)
    }
}

/// Part of a window that is contiguous in the dataset's native index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LonSegment {
    /// Native longitude indices to read
    pub native: Range<usize>,
    /// Column of the window where the segment starts
    pub offset: usize,
}

impl LonSegment {
    pub fn len(&self) -> usize {
        self.native.len()
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_empty()
    }
}

/// Index window of one run, computed once and shared read-only by every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct GridWindow {
    lon_range: Range<i64>,
    lat_range: Range<usize>,
    lon: Vec<f64>,
    lat: Vec<f64>,
    global_nlon: usize,
}

impl GridWindow {
    /// Longitude indices in unwrapped space, `[i0, i1)`.
    pub fn lon_range(&self) -> Range<i64> {
        self.lon_range.clone()
    }

    /// Native latitude indices, `[j0, j1)`.
    pub fn lat_range(&self) -> Range<usize> {
        self.lat_range.clone()
    }

    /// Longitudes of the window in output order (monotonic, may exceed 0..360).
    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }

    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    /// Whether the window straddles the seam of the native grid.
    pub fn wraps(&self) -> bool {
        self.lon_segments().len() > 1
    }

    /// Native segments to read, in window column order (one or two).
    pub fn lon_segments(&self) -> Vec<LonSegment> {
        let n = self.global_nlon as i64;
        let mut segments = Vec::with_capacity(2);
        let mut block = self.lon_range.start.div_euclid(n);

        while block * n < self.lon_range.end {
            let block_start = block * n;
            let start = self.lon_range.start.max(block_start);
            let end = self.lon_range.end.min(block_start + n);
            if start < end {
                segments.push(LonSegment {
                    native: (start - block_start) as usize..(end - block_start) as usize,
                    offset: (start - self.lon_range.start) as usize,
                });
            }
            block += 1;
        }
        segments
    }

    /// Assemble per-segment reads of `steps x nlat x segment_width` into one
    /// `steps x nlat x nlon` array.
    pub fn stitch(&self, parts: &[(LonSegment, Vec<f32>)], steps: usize) -> Vec<f32> {
        if let [(segment, data)] = parts {
            if segment.len() == self.nlon() {
                return data.clone();
            }
        }

        let nlat = self.nlat();
        let nlon = self.nlon();
        let mut out = vec![0.0f32; steps * nlat * nlon];
        for (segment, data) in parts {
            let width = segment.len();
            for row in 0..steps * nlat {
                let src = &data[row * width..(row + 1) * width];
                let dst = row * nlon + segment.offset;
                out[dst..dst + width].copy_from_slice(src);
            }
        }
        out
    }
}

/// Compute the index window of `bbox` (grown by `margin`) on a global grid.
///
/// Longitude candidates are taken from `lon - 360`, `lon` and `lon + 360`, in
/// that order; together they must form a single contiguous run no wider than
/// the grid, otherwise the selection is rejected as disjoint.
pub fn compute_window(lon: &[f64], lat: &[f64], bbox: &BoundingBox, margin: f64) -> Result<GridWindow> {
    let expanded = bbox.expand(margin);
    let n = lon.len() as i64;

    let mut lon_indices: Vec<i64> = Vec::new();
    let mut lon_values: Vec<f64> = Vec::new();
    for (block, shift) in [(-1i64, -360.0), (0, 0.0), (1, 360.0)] {
        for (i, &value) in lon.iter().enumerate() {
            let shifted = value + shift;
            if expanded.contains_lon(shifted) {
                lon_indices.push(i as i64 + block * n);
                lon_values.push(shifted);
            }
        }
    }

    let (Some(&first), Some(&last)) = (lon_indices.first(), lon_indices.last()) else {
        return Err(AcquisitionError::EmptySelection { axis: "longitude" });
    };
    if lon_indices.len() as i64 > n {
        return Err(AcquisitionError::DisjointSelection(format!(
            "{} longitudes selected from a grid of {}",
            lon_indices.len(),
            n
        )));
    }
    if let Some(gap) = first_gap(&lon_indices) {
        return Err(AcquisitionError::DisjointSelection(format!(
            "longitude selection breaks between unwrapped indices {} and {}",
            gap.0, gap.1
        )));
    }

    let lat_indices: Vec<i64> = lat
        .iter()
        .enumerate()
        .filter(|&(_, &v)| expanded.contains_lat(v))
        .map(|(j, _)| j as i64)
        .collect();
    let (Some(&j0), Some(&j_last)) = (lat_indices.first(), lat_indices.last()) else {
        return Err(AcquisitionError::EmptySelection { axis: "latitude" });
    };
    if let Some(gap) = first_gap(&lat_indices) {
        return Err(AcquisitionError::DisjointSelection(format!(
            "latitude selection breaks between indices {} and {}",
            gap.0, gap.1
        )));
    }
    let lat_range = j0 as usize..j_last as usize + 1;

    let window = GridWindow {
        lon_range: first..last + 1,
        lat: lat[lat_range.clone()].to_vec(),
        lat_range,
        lon: lon_values,
        global_nlon: lon.len(),
    };

    debug!(
        lon_range = ?window.lon_range,
        lat_range = ?window.lat_range,
        nlon = window.nlon(),
        nlat = window.nlat(),
        wraps = window.wraps(),
        "Computed grid window"
    );

    Ok(window)
}

fn first_gap(indices: &[i64]) -> Option<(i64, i64)> {
    indices
        .windows(2)
        .find(|pair| pair[1] != pair[0] + 1)
        .map(|pair| (pair[0], pair[1]))
}
