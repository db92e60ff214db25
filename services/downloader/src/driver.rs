//! Which runs a daily invocation performs, and for which dates.

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;

use acquisition::{reanalysis_window, AcquisitionConfig};

/// `--only` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunSelection {
    /// Reanalysis then forecast
    All,
    Fnl,
    Forecast,
}

/// A run scheduled by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedRun {
    Reanalysis { start: NaiveDate, end: NaiveDate },
    Forecast { date: NaiveDate },
}

impl PlannedRun {
    pub fn label(&self) -> &'static str {
        match self {
            PlannedRun::Reanalysis { .. } => "fnl",
            PlannedRun::Forecast { .. } => "forecast",
        }
    }
}

/// Runs for the driver `date`, in execution order.
pub fn plan_runs(config: &AcquisitionConfig, date: NaiveDate, only: RunSelection) -> Vec<PlannedRun> {
    let mut runs = Vec::with_capacity(2);

    if matches!(only, RunSelection::All | RunSelection::Fnl) {
        let (start, end) = reanalysis_window(
            date,
            config.reanalysis.days_behind,
            config.reanalysis.history_days,
        );
        runs.push(PlannedRun::Reanalysis { start, end });
    }
    if matches!(only, RunSelection::All | RunSelection::Forecast) {
        runs.push(PlannedRun::Forecast {
            date: date - Duration::days(config.forecast.days_behind as i64),
        });
    }

    runs
}

/// Parse a `YYYYMMDD` driver date.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|e| format!("expected YYYYMMDD, got '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AcquisitionConfig {
        AcquisitionConfig::from_yaml(
            r#"
catalog:
  base_url: "https://nomads.ncep.noaa.gov:9090"
region: { lon_min: -76.0, lon_max: -50.0, lat_min: -58.0, lat_max: -30.0 }
variables:
  - { name: tmp2m, units: K, long_name: "2 m temperature" }
"#,
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_plan() {
        let runs = plan_runs(&config(), date(2022, 5, 28), RunSelection::All);
        assert_eq!(
            runs,
            vec![
                PlannedRun::Reanalysis {
                    start: date(2022, 5, 20),
                    end: date(2022, 5, 26)
                },
                PlannedRun::Forecast {
                    date: date(2022, 5, 27)
                },
            ]
        );
    }

    #[test]
    fn test_single_family_plans() {
        let fnl = plan_runs(&config(), date(2022, 5, 28), RunSelection::Fnl);
        assert_eq!(fnl.len(), 1);
        assert_eq!(fnl[0].label(), "fnl");

        let forecast = plan_runs(&config(), date(2022, 5, 28), RunSelection::Forecast);
        assert_eq!(forecast, vec![PlannedRun::Forecast { date: date(2022, 5, 27) }]);
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/acquisition.yaml");
        let config = AcquisitionConfig::load(&path).unwrap();
        assert_eq!(config.variables.len(), 4);
        assert_eq!(config.run_timeout(), Some(std::time::Duration::from_secs(7200)));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("20220528"), Ok(date(2022, 5, 28)));
        assert!(parse_date("2022-05-28").is_err());
        assert!(parse_date("20221332").is_err());
    }
}
