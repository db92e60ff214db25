//! Remote reads with bounded retries.
//!
//! The unit of retry is one variable read: a whole coordinate vector, or a
//! whole hyperslab including both halves of a seam-straddling window. After
//! `max_attempts` failures the read fails the run; callers never substitute
//! defaults for missing data.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use netcdf_io::CoordinateVector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::DatasetReference;
use crate::error::{AcquisitionError, Result};
use crate::source::{DatasetSource, SourceError};
use crate::subset::GridWindow;

/// Attempt budget and back-off of a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed wait before each delayed attempt
    pub delay: Duration,
    /// How many of the final attempts are preceded by `delay`
    pub delayed_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(10),
            delayed_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Wait before `attempt` (1-based), if any. The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt > 1 && attempt + self.delayed_attempts > self.max_attempts {
            Some(self.delay)
        } else {
            None
        }
    }

    /// Sum of all waits when every attempt fails.
    pub fn total_delay(&self) -> Duration {
        (1..=self.max_attempts)
            .filter_map(|a| self.delay_before(a))
            .sum()
    }
}

/// Issues reads against a [`DatasetSource`] under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn DatasetSource>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(source: Arc<dyn DatasetSource>, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            source,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Read a whole 1-D variable.
    pub async fn fetch_vector(&self, reference: &DatasetReference, variable: &str) -> Result<CoordinateVector> {
        let source = self.source.as_ref();
        let url = reference.url.as_str();
        self.with_retry(url, variable, move || source.read_vector(url, variable))
            .await
    }

    /// Read `time` steps of `variable` over `window`.
    ///
    /// Returns `time.len() x nlat x nlon` values in window order; a window
    /// that straddles the seam is read in two segments and stitched.
    pub async fn fetch_slice(
        &self,
        reference: &DatasetReference,
        variable: &str,
        time: Range<usize>,
        window: &GridWindow,
    ) -> Result<Vec<f32>> {
        let source = self.source.as_ref();
        let url = reference.url.as_str();
        let lat = window.lat_range();
        let segments = window.lon_segments();
        let segments = segments.as_slice();
        let time_ref = &time;
        let nlat = window.nlat();

        // A short slab is treated like a transport failure and retried
        let parts = self
            .with_retry(url, variable, move || {
                let lat = lat.clone();
                async move {
                    let mut parts = Vec::with_capacity(segments.len());
                    for segment in segments {
                        let ranges = [time_ref.clone(), lat.clone(), segment.native.clone()];
                        let data = source.read_slice(url, variable, ranges).await?;
                        if data.len() != time_ref.len() * nlat * segment.len() {
                            return Err(SourceError::Transport(format!(
                                "server returned {} values for a {}x{}x{} slab",
                                data.len(),
                                time_ref.len(),
                                nlat,
                                segment.len()
                            )));
                        }
                        parts.push((segment.clone(), data));
                    }
                    Ok(parts)
                }
            })
            .await?;

        Ok(window.stitch(&parts, time.len()))
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, variable: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if let Some(delay) = self.policy.delay_before(attempt) {
                debug!(
                    variable = %variable,
                    attempt = attempt,
                    delay_secs = delay.as_secs(),
                    "Waiting before retry"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                return Err(AcquisitionError::Cancelled);
            }

            counter!("fetch_attempts_total").increment(1);
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(variable = %variable, url = %url, attempt = attempt, "Read succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(SourceError::VariableNotFound(name)) => {
                    return Err(AcquisitionError::VariableNotFound {
                        variable: name,
                        url: url.to_string(),
                    });
                }
                Err(SourceError::Transport(message)) => {
                    warn!(
                        variable = %variable,
                        url = %url,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %message,
                        "Read failed"
                    );
                    if attempt < self.policy.max_attempts {
                        counter!("fetch_retries_total").increment(1);
                    }
                    last_error = message;
                }
            }
        }

        counter!("fetch_failures_total").increment(1);
        Err(AcquisitionError::FetchFailed {
            variable: variable.to_string(),
            url: url.to_string(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_delays_final_three_attempts() {
        let policy = RetryPolicy::default();
        let delayed: Vec<u32> = (1..=10).filter(|a| policy.delay_before(*a).is_some()).collect();
        assert_eq!(delayed, vec![8, 9, 10]);
        assert_eq!(policy.total_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 1,
            delay: Duration::from_secs(10),
            delayed_attempts: 1,
        };
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_all_retries_delayed() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            delayed_attempts: 3,
        };
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.total_delay(), Duration::from_secs(1));
    }
}
