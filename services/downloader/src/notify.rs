//! Failure notification.

use std::time::Duration;

use acquisition::RunError;
use anyhow::Result;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

/// Body of the failure webhook.
#[derive(Debug, Serialize, PartialEq)]
pub struct FailureReport {
    pub run: String,
    pub family: String,
    pub date: String,
    pub stage: String,
    pub error: String,
}

impl FailureReport {
    pub fn new(run: &str, date: NaiveDate, err: &RunError) -> Self {
        Self {
            run: run.to_string(),
            family: err.family.as_str().to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            stage: err.stage.to_string(),
            error: err.source.to_string(),
        }
    }
}

/// Logs failed runs and optionally posts them to a webhook.
pub struct Notifier {
    client: Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, url })
    }

    pub async fn failure(&self, report: &FailureReport) {
        error!(
            run = %report.run,
            family = %report.family,
            date = %report.date,
            stage = %report.stage,
            error = %report.error,
            "Acquisition failed"
        );

        let Some(url) = &self.url else {
            return;
        };
        match self.client.post(url).json(report).send().await {
            Ok(response) if response.status().is_success() => {
                info!(url = %url, "Failure notification sent");
            }
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Failure notification rejected");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to send failure notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acquisition::{AcquisitionError, DatasetFamily, RunStage};

    #[test]
    fn test_report_payload() {
        let err = RunError::new(
            DatasetFamily::Fnl,
            RunStage::Fetch {
                variable: Some("tmp2m".to_string()),
                step: 4,
            },
            AcquisitionError::Cancelled,
        );
        let report = FailureReport::new("fnl", NaiveDate::from_ymd_opt(2022, 5, 28).unwrap(), &err);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["family"], "fnl");
        assert_eq!(json["date"], "2022-05-28");
        assert_eq!(json["stage"], "fetch of 'tmp2m' at step 4");
        assert_eq!(json["error"], err.source.to_string());
    }

    #[tokio::test]
    async fn test_failure_without_url_only_logs() {
        let notifier = Notifier::new(None).unwrap();
        let err = RunError::new(DatasetFamily::Gfs0p25, RunStage::Resolution, AcquisitionError::Cancelled);
        let report = FailureReport::new("forecast", NaiveDate::from_ymd_opt(2022, 5, 27).unwrap(), &err);
        notifier.failure(&report).await;
    }
}
