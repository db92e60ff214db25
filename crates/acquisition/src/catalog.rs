//! Catalog addressing and navigation.
//!
//! Datasets live at
//! `{base_url}/dods/{family_path}/{date_prefix}{YYYYMMDD}/{file_prefix}_{RR}z`.
//! Whether a given run has been published can only be learned by probing it,
//! so the [`Navigator`] walks run by run until a probe succeeds.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use metrics::counter;
use tracing::{debug, info, instrument};

use crate::cycle::{next_run, previous_run, run_at_or_after, run_instant, ModelCycle};
use crate::error::{AcquisitionError, Result};
use crate::family::DatasetFamily;
use crate::source::DatasetSource;

/// Root of the GrADS-DODS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    base_url: String,
}

impl Catalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the reference of one run.
    pub fn reference(&self, family: DatasetFamily, date: NaiveDate, cycle: ModelCycle) -> DatasetReference {
        let url = format!(
            "{}/dods/{}/{}{}/{}_{:02}z",
            self.base_url,
            family.family_path(),
            family.date_prefix(),
            date.format("%Y%m%d"),
            family.file_prefix(),
            cycle.hour()
        );
        DatasetReference {
            family,
            date,
            cycle,
            url,
        }
    }
}

/// One catalog entry: a family's run at a date and cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReference {
    pub family: DatasetFamily,
    pub date: NaiveDate,
    pub cycle: ModelCycle,
    pub url: String,
}

impl DatasetReference {
    /// Start of the run.
    pub fn instant(&self) -> NaiveDateTime {
        run_instant(self.date, self.cycle)
    }
}

/// Finds reachable catalog entries by probing.
#[derive(Clone)]
pub struct Navigator {
    catalog: Catalog,
    source: Arc<dyn DatasetSource>,
}

impl Navigator {
    pub fn new(catalog: Catalog, source: Arc<dyn DatasetSource>) -> Self {
        Self { catalog, source }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn is_reachable(&self, reference: &DatasetReference) -> bool {
        counter!("catalog_probes_total", "family" => reference.family.as_str()).increment(1);
        match self.source.probe(&reference.url).await {
            Ok(()) => true,
            Err(e) => {
                debug!(url = %reference.url, error = %e, "Dataset not reachable");
                false
            }
        }
    }

    /// Most recent reachable run at or before `(start_date, preferred)`.
    ///
    /// Walks back one cycle at a time and gives up once the walk reaches a
    /// date earlier than `start_date - lookback_days`.
    #[instrument(skip(self, family), fields(family = %family))]
    pub async fn resolve(
        &self,
        family: DatasetFamily,
        start_date: NaiveDate,
        preferred: ModelCycle,
        lookback_days: u32,
    ) -> Result<DatasetReference> {
        let earliest = start_date - Duration::days(lookback_days as i64);
        let (mut date, mut cycle) = (start_date, preferred);
        let mut probes = 0u32;

        while date >= earliest {
            let reference = self.catalog.reference(family, date, cycle);
            probes += 1;
            if self.is_reachable(&reference).await {
                info!(
                    url = %reference.url,
                    date = %reference.date,
                    cycle = %reference.cycle,
                    probes = probes,
                    "Resolved dataset"
                );
                return Ok(reference);
            }
            (date, cycle) = previous_run(date, cycle);
        }

        counter!("catalog_resolve_failures_total", "family" => family.as_str()).increment(1);
        Err(AcquisitionError::NotFound {
            family,
            detail: format!(
                "{} {} back to {} after {} probes",
                start_date, preferred, earliest, probes
            ),
        })
    }

    /// Earliest reachable run with `start <= instant <= end`.
    #[instrument(skip(self, family), fields(family = %family))]
    pub async fn resolve_forward(
        &self,
        family: DatasetFamily,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<DatasetReference> {
        let (mut date, mut cycle) = run_at_or_after(start);
        let mut probes = 0u32;

        while run_instant(date, cycle) <= end {
            let reference = self.catalog.reference(family, date, cycle);
            probes += 1;
            if self.is_reachable(&reference).await {
                info!(
                    url = %reference.url,
                    date = %reference.date,
                    cycle = %reference.cycle,
                    probes = probes,
                    "Resolved first dataset of window"
                );
                return Ok(reference);
            }
            (date, cycle) = next_run(date, cycle);
        }

        counter!("catalog_resolve_failures_total", "family" => family.as_str()).increment(1);
        Err(AcquisitionError::NotFound {
            family,
            detail: format!("between {} and {} after {} probes", start, end, probes),
        })
    }
}
