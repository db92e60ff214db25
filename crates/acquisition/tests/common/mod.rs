//! In-memory catalog shared by the acquisition integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acquisition::{
    AcquisitionConfig, Catalog, DatasetFamily, DatasetSource, ModelCycle, SourceError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use netcdf_io::CoordinateVector;
use test_utils::{create_test_field, global_lat_axis, global_lon_axis, test_field_value};

pub const BASE_URL: &str = "http://fake-nomads:9090";
pub const GRADS_UNITS: &str = "days since 1-1-1 00:00:0.0";

/// One dataset of the fake catalog. Fields are `[time, lat, lon]` row-major.
#[derive(Debug, Clone)]
pub struct FakeDataset {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub time: Vec<f64>,
    pub time_units: Option<String>,
    pub fields: HashMap<String, Vec<f32>>,
    /// Virtual latency of every slab read
    pub read_delay: Duration,
}

impl FakeDataset {
    /// Forecast entry with `steps` times; `field[t][j][i] = test_field_value(t, j, i)`.
    pub fn forecast(resolution: f64, steps: usize, first_time: f64, variables: &[&str]) -> Self {
        let lon = global_lon_axis(resolution);
        let lat = global_lat_axis(resolution);
        let field = create_test_field(steps, lat.len(), lon.len());
        Self {
            time: (0..steps).map(|t| first_time + t as f64 * 0.125).collect(),
            time_units: None,
            fields: variables.iter().map(|v| (v.to_string(), field.clone())).collect(),
            lon,
            lat,
            read_delay: Duration::ZERO,
        }
    }

    /// Analysis entry holding global step `step` only.
    pub fn analysis(resolution: f64, step: usize, time: f64, variables: &[&str]) -> Self {
        let lon = global_lon_axis(resolution);
        let lat = global_lat_axis(resolution);
        let mut field = Vec::with_capacity(lon.len() * lat.len());
        for j in 0..lat.len() {
            for i in 0..lon.len() {
                field.push(test_field_value(step, j, i));
            }
        }
        Self {
            time: vec![time],
            time_units: Some(GRADS_UNITS.to_string()),
            fields: variables.iter().map(|v| (v.to_string(), field.clone())).collect(),
            lon,
            lat,
            read_delay: Duration::ZERO,
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }
}

/// Catalog keyed by URL with injectable failures.
#[derive(Default)]
pub struct FakeCatalog {
    datasets: Mutex<HashMap<String, FakeDataset>>,
    /// `url#variable` -> remaining failing reads (`u32::MAX` = never recovers)
    failures: Mutex<HashMap<String, u32>>,
    probes: Mutex<Vec<String>>,
    reads: Mutex<Vec<(String, String)>>,
    /// `url#variable` slabs answered one value short
    short_reads: Mutex<HashSet<String>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, url: impl Into<String>, dataset: FakeDataset) {
        self.datasets.lock().unwrap().insert(url.into(), dataset);
    }

    pub fn fail_reads(&self, url: &str, variable: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{}#{}", url, variable), times);
    }

    pub fn fail_always(&self, url: &str, variable: &str) {
        self.fail_reads(url, variable, u32::MAX);
    }

    pub fn short_reads(&self, url: &str, variable: &str) {
        self.short_reads
            .lock()
            .unwrap()
            .insert(format!("{}#{}", url, variable));
    }

    pub fn probed(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn read_count(&self, variable: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, v)| v == variable)
            .count()
    }

    fn record_read(&self, url: &str, variable: &str) -> Result<FakeDataset, SourceError> {
        self.reads
            .lock()
            .unwrap()
            .push((url.to_string(), variable.to_string()));

        let key = format!("{}#{}", url, variable);
        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&key) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(SourceError::Transport("NetCDF: DAP server error".to_string()));
            }
        }
        drop(failures);

        self.datasets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Transport(format!("404 {}", url)))
    }
}

#[async_trait]
impl DatasetSource for FakeCatalog {
    async fn probe(&self, url: &str) -> Result<(), SourceError> {
        self.probes.lock().unwrap().push(url.to_string());
        if self.datasets.lock().unwrap().contains_key(url) {
            Ok(())
        } else {
            Err(SourceError::Transport(format!("404 {}", url)))
        }
    }

    async fn read_vector(&self, url: &str, variable: &str) -> Result<CoordinateVector, SourceError> {
        let dataset = self.record_read(url, variable)?;
        match variable {
            "lon" => Ok(CoordinateVector {
                values: dataset.lon,
                units: Some("degrees_east".to_string()),
                calendar: None,
            }),
            "lat" => Ok(CoordinateVector {
                values: dataset.lat,
                units: Some("degrees_north".to_string()),
                calendar: None,
            }),
            "time" => Ok(CoordinateVector {
                values: dataset.time,
                units: dataset.time_units,
                calendar: None,
            }),
            other => Err(SourceError::VariableNotFound(other.to_string())),
        }
    }

    async fn read_slice(
        &self,
        url: &str,
        variable: &str,
        ranges: [Range<usize>; 3],
    ) -> Result<Vec<f32>, SourceError> {
        let dataset = self.record_read(url, variable)?;
        if !dataset.read_delay.is_zero() {
            tokio::time::sleep(dataset.read_delay).await;
        }
        let field = dataset
            .fields
            .get(variable)
            .ok_or_else(|| SourceError::VariableNotFound(variable.to_string()))?;

        let (nlat, nlon) = (dataset.lat.len(), dataset.lon.len());
        let [t, j, i] = ranges;
        if t.end > dataset.time.len() || j.end > nlat || i.end > nlon {
            return Err(SourceError::Transport("index out of range".to_string()));
        }

        let mut out = Vec::with_capacity(t.len() * j.len() * i.len());
        for tt in t {
            for jj in j.clone() {
                let row = (tt * nlat + jj) * nlon;
                out.extend_from_slice(&field[row + i.start..row + i.end]);
            }
        }
        if self.short_reads.lock().unwrap().contains(&format!("{}#{}", url, variable)) {
            out.pop();
        }
        Ok(out)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn url(family: DatasetFamily, date: NaiveDate, cycle: ModelCycle) -> String {
    Catalog::new(BASE_URL).reference(family, date, cycle).url
}

/// Config over `region` with `tmp2m` and `ugrd10m`, fast retries unless
/// overridden by `extra` YAML.
pub fn test_config(region: (f64, f64, f64, f64), margin: f64, extra: &str) -> AcquisitionConfig {
    let (lon_min, lon_max, lat_min, lat_max) = region;
    let yaml = format!(
        r#"
catalog:
  base_url: "{BASE_URL}"
  lookback_days: 2
region:
  lon_min: {lon_min}
  lon_max: {lon_max}
  lat_min: {lat_min}
  lat_max: {lat_max}
  margin: {margin}
variables:
  - name: tmp2m
    units: K
    long_name: "2 m temperature"
  - name: ugrd10m
    units: "m/s"
    long_name: "10 m u-wind"
{extra}
"#
    );
    AcquisitionConfig::from_yaml(&yaml).unwrap()
}

/// Files in `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
