//! In-memory accumulation of a run before it is written.
//!
//! Buffers are sized for the whole run up front. Each successful fetch fills
//! one time-step slot; the run may only be written once every slot is filled.

use crate::config::VariableSpec;
use crate::error::{AcquisitionError, Result};

/// Time units GrADS implies when a dataset does not declare any.
pub const DEFAULT_TIME_UNITS: &str = "days since 0000-01-01 00:00:00";
pub const DEFAULT_CALENDAR: &str = "ISO_GREGORIAN";

/// One data variable, `[time, lat, lon]` row-major.
#[derive(Debug, Clone)]
pub struct VariableBuffer {
    pub name: String,
    pub units: String,
    pub long_name: String,
    pub fill_value: f32,
    nlat: usize,
    nlon: usize,
    data: Vec<f32>,
    filled: Vec<bool>,
}

impl VariableBuffer {
    pub fn new(spec: &VariableSpec, steps: usize, nlat: usize, nlon: usize, fill_value: f32) -> Self {
        Self {
            name: spec.name.clone(),
            units: spec.units.clone(),
            long_name: spec.long_name.clone(),
            fill_value,
            nlat,
            nlon,
            data: vec![fill_value; steps * nlat * nlon],
            filled: vec![false; steps],
        }
    }

    pub fn steps(&self) -> usize {
        self.filled.len()
    }

    pub fn slot_len(&self) -> usize {
        self.nlat * self.nlon
    }

    /// Copy one step's `nlat x nlon` slice into its slot.
    pub fn write_step(&mut self, step: usize, values: &[f32]) -> Result<()> {
        if step >= self.steps() {
            return Err(AcquisitionError::Task(format!(
                "step {} out of range for '{}' ({} steps)",
                step,
                self.name,
                self.steps()
            )));
        }
        let len = self.slot_len();
        if values.len() != len {
            return Err(AcquisitionError::Task(format!(
                "'{}' step {}: got {} values, expected {}",
                self.name,
                step,
                values.len(),
                len
            )));
        }
        self.data[step * len..(step + 1) * len].copy_from_slice(values);
        self.filled[step] = true;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.filled.iter().all(|f| *f)
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Raw time values of the run with the source's time descriptors.
#[derive(Debug, Clone)]
pub struct TimeAxisBuffer {
    pub units: String,
    pub calendar: String,
    values: Vec<f64>,
    filled: Vec<bool>,
}

impl TimeAxisBuffer {
    /// Missing descriptors fall back to the GrADS defaults.
    pub fn new(steps: usize, units: Option<String>, calendar: Option<String>) -> Self {
        Self {
            units: units.unwrap_or_else(|| DEFAULT_TIME_UNITS.to_string()),
            calendar: calendar.unwrap_or_else(|| DEFAULT_CALENDAR.to_string()),
            values: vec![0.0; steps],
            filled: vec![false; steps],
        }
    }

    pub fn steps(&self) -> usize {
        self.values.len()
    }

    pub fn set(&mut self, step: usize, value: f64) -> Result<()> {
        let steps = self.steps();
        let slot = self.values.get_mut(step).ok_or_else(|| {
            AcquisitionError::Task(format!("time step {} out of range ({} steps)", step, steps))
        })?;
        *slot = value;
        self.filled[step] = true;
        Ok(())
    }

    /// Origin part of `units` (`days since 0000-01-01 00:00:00` gives
    /// `0000-01-01 00:00:00`).
    pub fn time_origin(&self) -> Option<&str> {
        self.units.split_once(" since ").map(|(_, origin)| origin.trim())
    }

    pub fn is_complete(&self) -> bool {
        self.filled.iter().all(|f| *f)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}
