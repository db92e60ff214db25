//! Acquisition configuration.
//!
//! Loaded from a single YAML file (see `config/acquisition.yaml`). Every
//! section except `catalog`, `region` and `variables` has defaults.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cycle::ModelCycle;
use crate::error::{AcquisitionError, Result};
use crate::family::{DatasetFamily, SteppingMode};
use crate::fetch::RetryPolicy;
use crate::subset::BoundingBox;

#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    pub catalog: CatalogConfig,
    pub region: RegionConfig,
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub reanalysis: ReanalysisConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// e.g. `https://nomads.ncep.noaa.gov:9090`
    pub base_url: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_lookback_days() -> u32 {
    8
}

/// Requested region in degrees. Longitudes may use either -180..180 or 0..360.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    /// Padding added on every side before selecting grid points
    #[serde(default = "default_margin")]
    pub margin: f64,
}

fn default_margin() -> f64 {
    1.0
}

/// A catalog variable to extract.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub units: String,
    pub long_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Number of final attempts preceded by `retry_delay_secs`
    #[serde(default = "default_delayed_attempts")]
    pub delayed_attempts: u32,
    /// Steps fetched concurrently (1 = sequential)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_delayed_attempts() -> u32 {
    3
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            delayed_attempts: default_delayed_attempts(),
            max_concurrent: default_max_concurrent(),
            run_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReanalysisConfig {
    /// Length of the analysis window in days
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    /// Window end relative to the driver date
    #[serde(default = "default_reanalysis_days_behind")]
    pub days_behind: u32,
}

fn default_history_days() -> u32 {
    6
}

fn default_reanalysis_days_behind() -> u32 {
    2
}

impl Default for ReanalysisConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            days_behind: default_reanalysis_days_behind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_family")]
    pub family: DatasetFamily,
    #[serde(default)]
    pub run_hour: u32,
    #[serde(default = "default_forecast_days_behind")]
    pub days_behind: u32,
    /// Upper bound on the number of forecast steps kept
    #[serde(default)]
    pub step_limit: Option<usize>,
}

fn default_forecast_family() -> DatasetFamily {
    DatasetFamily::Gfs0p25
}

fn default_forecast_days_behind() -> u32 {
    1
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            family: default_forecast_family(),
            run_hour: 0,
            days_behind: default_forecast_days_behind(),
            step_limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Written as `_FillValue` and `missing_value` of every data variable
    #[serde(default = "default_fill_value")]
    pub fill_value: f64,
}

fn default_fill_value() -> f64 {
    9.999e20
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fill_value: default_fill_value(),
        }
    }
}

impl AcquisitionConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AcquisitionError::InvalidConfig(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_yaml(&content)?;
        debug!(
            path = %path.display(),
            variables = config.variables.len(),
            "Loaded acquisition config"
        );
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AcquisitionConfig = serde_yaml::from_str(content)
            .map_err(|e| AcquisitionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AcquisitionError::InvalidConfig(msg));

        if self.catalog.base_url.trim().is_empty() {
            return invalid("catalog.base_url is empty".to_string());
        }

        let r = &self.region;
        if !(r.lon_min < r.lon_max) {
            return invalid(format!(
                "region.lon_min ({}) must be below region.lon_max ({})",
                r.lon_min, r.lon_max
            ));
        }
        if !(r.lat_min < r.lat_max) {
            return invalid(format!(
                "region.lat_min ({}) must be below region.lat_max ({})",
                r.lat_min, r.lat_max
            ));
        }
        if r.lat_min < -90.0 || r.lat_max > 90.0 {
            return invalid("region latitudes must lie within [-90, 90]".to_string());
        }
        if !(r.margin >= 0.0) {
            return invalid(format!("region.margin must be non-negative, got {}", r.margin));
        }

        if self.variables.is_empty() {
            return invalid("no variables configured".to_string());
        }
        let mut seen = HashSet::new();
        for var in &self.variables {
            if var.name.trim().is_empty() {
                return invalid("variable with empty name".to_string());
            }
            if matches!(var.name.as_str(), "time" | "lat" | "lon") {
                return invalid(format!("'{}' is reserved for a coordinate", var.name));
            }
            if !seen.insert(var.name.as_str()) {
                return invalid(format!("variable '{}' listed twice", var.name));
            }
        }

        let f = &self.fetch;
        if f.max_attempts == 0 {
            return invalid("fetch.max_attempts must be at least 1".to_string());
        }
        if f.delayed_attempts > f.max_attempts {
            return invalid(format!(
                "fetch.delayed_attempts ({}) exceeds fetch.max_attempts ({})",
                f.delayed_attempts, f.max_attempts
            ));
        }
        if f.max_concurrent == 0 {
            return invalid("fetch.max_concurrent must be at least 1".to_string());
        }
        if f.run_timeout_secs == Some(0) {
            return invalid("fetch.run_timeout_secs must be positive".to_string());
        }

        if self.reanalysis.history_days == 0 {
            return invalid("reanalysis.history_days must be at least 1".to_string());
        }

        if ModelCycle::from_hour(self.forecast.run_hour).is_none() {
            return invalid(format!(
                "forecast.run_hour must be 0, 6, 12 or 18, got {}",
                self.forecast.run_hour
            ));
        }
        if self.forecast.family.stepping() != SteppingMode::SingleFile {
            return invalid(format!(
                "forecast.family '{}' is not a forecast family",
                self.forecast.family
            ));
        }
        if self.forecast.step_limit == Some(0) {
            return invalid("forecast.step_limit must be positive".to_string());
        }

        // Data variables are stored as f32
        let fill = self.output.fill_value;
        if !fill.is_finite() || fill.abs() > f32::MAX as f64 {
            return invalid(format!("output.fill_value {} does not fit in f32", fill));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch.max_attempts,
            delay: Duration::from_secs(self.fetch.retry_delay_secs),
            delayed_attempts: self.fetch.delayed_attempts,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            lon_min: self.region.lon_min,
            lon_max: self.region.lon_max,
            lat_min: self.region.lat_min,
            lat_max: self.region.lat_max,
        }
    }

    pub fn forecast_cycle(&self) -> ModelCycle {
        ModelCycle::from_hour(self.forecast.run_hour).unwrap_or(ModelCycle::Z00)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.fetch.run_timeout_secs.map(Duration::from_secs)
    }
}
