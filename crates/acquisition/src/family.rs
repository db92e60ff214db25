//! Dataset families served by the GrADS-DODS catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AcquisitionError;

/// How successive time steps of a run are laid out in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteppingMode {
    /// One catalog entry holds the whole forecast time axis.
    SingleFile,
    /// One catalog entry per 6-hourly analysis time.
    MultiFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetFamily {
    /// High-resolution GFS forecast
    #[serde(rename = "gfs_hd")]
    GfsHd,
    /// 0.50 degree GFS forecast
    #[serde(rename = "gfs_0p50")]
    Gfs0p50,
    /// 0.25 degree GFS forecast
    #[serde(rename = "gfs_0p25")]
    Gfs0p25,
    /// FNL final analysis
    #[serde(rename = "fnl")]
    Fnl,
}

impl DatasetFamily {
    pub fn all() -> &'static [DatasetFamily] {
        &[
            DatasetFamily::GfsHd,
            DatasetFamily::Gfs0p50,
            DatasetFamily::Gfs0p25,
            DatasetFamily::Fnl,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFamily::GfsHd => "gfs_hd",
            DatasetFamily::Gfs0p50 => "gfs_0p50",
            DatasetFamily::Gfs0p25 => "gfs_0p25",
            DatasetFamily::Fnl => "fnl",
        }
    }

    /// Directory of the family under `/dods/`.
    pub fn family_path(&self) -> &'static str {
        self.as_str()
    }

    /// Prefix of the dated directory (`{prefix}{YYYYMMDD}`).
    pub fn date_prefix(&self) -> &'static str {
        match self {
            DatasetFamily::GfsHd => "gfs_hd",
            DatasetFamily::Gfs0p50 | DatasetFamily::Gfs0p25 => "gfs",
            DatasetFamily::Fnl => "fnl",
        }
    }

    /// Prefix of the run entry (`{prefix}_{RR}z`).
    pub fn file_prefix(&self) -> &'static str {
        match self {
            DatasetFamily::GfsHd => "gfs_hd",
            DatasetFamily::Gfs0p50 => "gfs_0p50",
            DatasetFamily::Gfs0p25 => "gfs_0p25",
            DatasetFamily::Fnl => "fnlflx",
        }
    }

    /// Label used in output file names.
    pub fn label(&self) -> &'static str {
        match self {
            DatasetFamily::GfsHd => "GFS_HD",
            DatasetFamily::Gfs0p50 => "GFS_0P50",
            DatasetFamily::Gfs0p25 => "GFS_0P25",
            DatasetFamily::Fnl => "FNL",
        }
    }

    pub fn stepping(&self) -> SteppingMode {
        match self {
            DatasetFamily::Fnl => SteppingMode::MultiFile,
            _ => SteppingMode::SingleFile,
        }
    }
}

impl fmt::Display for DatasetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFamily {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetFamily::all()
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AcquisitionError::InvalidConfig(format!("unknown dataset family '{}'", s)))
    }
}
