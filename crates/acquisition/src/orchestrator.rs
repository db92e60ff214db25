//! End-to-end acquisition runs.
//!
//! A run moves through `Resolving -> GridDiscovered -> Fetching(step) ->
//! Complete`, or ends in `Failed`. Any error aborts the whole run: no archive
//! is written unless every variable was fetched for every step.
//!
//! Steps are fetched through an ordered buffered stream, so up to
//! `fetch.max_concurrent` steps are in flight while results are still applied
//! in step order.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use metrics::counter;
use netcdf_io::{CoordinateVector, NetCdfError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::archive;
use crate::buffers::{TimeAxisBuffer, VariableBuffer};
use crate::catalog::{Catalog, DatasetReference, Navigator};
use crate::config::AcquisitionConfig;
use crate::cycle::{next_run, run_instant, ModelCycle};
use crate::error::{AcquisitionError, RunError, RunStage};
use crate::family::DatasetFamily;
use crate::fetch::Fetcher;
use crate::source::DatasetSource;
use crate::subset::{compute_window, GridWindow};

/// Progress of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Resolving,
    GridDiscovered,
    /// `step` steps of `steps` have been applied
    Fetching { step: usize, steps: usize },
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }

    /// Stage to blame for an interruption while in this state.
    pub fn stage(&self) -> RunStage {
        match self {
            RunState::Resolving => RunStage::Resolution,
            RunState::GridDiscovered => RunStage::GridDiscovery,
            RunState::Fetching { step, .. } => RunStage::Fetch {
                variable: None,
                step: *step,
            },
            RunState::Complete | RunState::Failed => RunStage::Write,
        }
    }
}

/// Per-run state holder; observers may [`subscribe`](RunTracker::subscribe).
#[derive(Debug)]
pub struct RunTracker {
    family: DatasetFamily,
    state: watch::Sender<RunState>,
}

impl RunTracker {
    pub fn new(family: DatasetFamily) -> Self {
        let (state, _) = watch::channel(RunState::Resolving);
        Self { family, state }
    }

    pub fn enter(&self, next: RunState) {
        debug!(family = %self.family, state = ?next, "Run state");
        self.state.send_replace(next);
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn fail(&self, stage: RunStage, source: AcquisitionError) -> RunError {
        RunError::new(self.family, stage, source)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub family: DatasetFamily,
    /// Archive location; exists when the outcome is returned
    pub path: PathBuf,
    pub steps: usize,
    /// First catalog entry the run read from
    pub reference: DatasetReference,
}

/// One step of a run: where to read it and which time index it is.
#[derive(Debug, Clone)]
struct StepPlan {
    step: usize,
    reference: DatasetReference,
    time_index: usize,
    /// Multi-file runs read each step's time value from its own entry
    read_time: bool,
}

struct StepData {
    step: usize,
    time: Option<CoordinateVector>,
    fields: Vec<Vec<f32>>,
}

/// Everything a run fetched, before it is written.
struct Acquired {
    file_name: String,
    reference: DatasetReference,
    window: GridWindow,
    time: TimeAxisBuffer,
    buffers: Vec<VariableBuffer>,
}

/// Drives forecast and reanalysis runs against one catalog.
pub struct Orchestrator {
    config: Arc<AcquisitionConfig>,
    navigator: Navigator,
    fetcher: Fetcher,
    work_dir: PathBuf,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Arc<AcquisitionConfig>,
        source: Arc<dyn DatasetSource>,
        work_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        let catalog = Catalog::new(config.catalog.base_url.as_str());
        let fetcher = Fetcher::new(source.clone(), config.retry_policy(), cancel.clone());
        Self {
            navigator: Navigator::new(catalog, source),
            fetcher,
            config,
            work_dir: work_dir.into(),
            cancel,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        self.navigator.catalog()
    }

    /// Forecast run for `date` at the configured run hour, falling back to
    /// earlier runs when that one is not published.
    #[instrument(skip(self))]
    pub async fn run_forecast(&self, date: NaiveDate) -> Result<RunOutcome, RunError> {
        let tracker = RunTracker::new(self.config.forecast.family);
        let result = async {
            let acquired = self
                .guarded(&tracker, self.acquire_forecast(date, &tracker))
                .await?;
            self.write(&tracker, acquired).await
        }
        .await;
        self.finish(&tracker, result)
    }

    /// Reanalysis run over `[start_date 00Z, end_date 00Z]`, one catalog
    /// entry per 6-hourly step.
    #[instrument(skip(self))]
    pub async fn run_reanalysis(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RunOutcome, RunError> {
        let tracker = RunTracker::new(DatasetFamily::Fnl);
        let result = async {
            let acquired = self
                .guarded(&tracker, self.acquire_reanalysis(start_date, end_date, &tracker))
                .await?;
            self.write(&tracker, acquired).await
        }
        .await;
        self.finish(&tracker, result)
    }

    async fn acquire_forecast(&self, date: NaiveDate, tracker: &RunTracker) -> Result<Acquired, RunError> {
        let family = self.config.forecast.family;
        let cycle = self.config.forecast_cycle();

        tracker.enter(RunState::Resolving);
        let reference = self
            .navigator
            .resolve(family, date, cycle, self.config.catalog.lookback_days)
            .await
            .map_err(|e| tracker.fail(RunStage::Resolution, e))?;

        let window = self
            .discover_grid(&reference)
            .await
            .map_err(|e| tracker.fail(RunStage::GridDiscovery, e))?;
        tracker.enter(RunState::GridDiscovered);

        let time = self
            .fetcher
            .fetch_vector(&reference, "time")
            .await
            .map_err(|e| tracker.fail(RunStage::GridDiscovery, e))?;
        let limit = self.config.forecast.step_limit.unwrap_or(usize::MAX);
        let steps = time.values.len().min(limit);
        if steps == 0 {
            return Err(tracker.fail(
                RunStage::GridDiscovery,
                AcquisitionError::EmptySelection { axis: "time" },
            ));
        }

        let mut time_axis = TimeAxisBuffer::new(steps, time.units.clone(), time.calendar.clone());
        for (step, value) in time.values.iter().take(steps).enumerate() {
            time_axis
                .set(step, *value)
                .map_err(|e| tracker.fail(RunStage::GridDiscovery, e))?;
        }

        info!(
            family = %family,
            url = %reference.url,
            steps = steps,
            available = time.values.len(),
            "Fetching forecast steps"
        );

        let plans: Vec<StepPlan> = (0..steps)
            .map(|step| StepPlan {
                step,
                reference: reference.clone(),
                time_index: step,
                read_time: false,
            })
            .collect();

        let mut time_axis = Some(time_axis);
        let buffers = self
            .fetch_all(tracker, &plans, &window, &mut time_axis)
            .await?;
        let time = time_axis.ok_or_else(|| {
            tracker.fail(
                RunStage::Write,
                AcquisitionError::Task("time axis missing".to_string()),
            )
        })?;

        Ok(Acquired {
            file_name: forecast_file_name(&reference),
            reference,
            window,
            time,
            buffers,
        })
    }

    async fn acquire_reanalysis(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        tracker: &RunTracker,
    ) -> Result<Acquired, RunError> {
        let family = DatasetFamily::Fnl;
        let start = run_instant(start_date, ModelCycle::Z00);
        let end = run_instant(end_date, ModelCycle::Z00);

        tracker.enter(RunState::Resolving);
        let first = self
            .navigator
            .resolve_forward(family, start, end)
            .await
            .map_err(|e| tracker.fail(RunStage::Resolution, e))?;

        let window = self
            .discover_grid(&first)
            .await
            .map_err(|e| tracker.fail(RunStage::GridDiscovery, e))?;
        tracker.enter(RunState::GridDiscovered);

        let plans: Vec<StepPlan> = reanalysis_runs(&first, end)
            .into_iter()
            .enumerate()
            .map(|(step, (date, cycle))| StepPlan {
                step,
                reference: self.catalog().reference(family, date, cycle),
                time_index: 0,
                read_time: true,
            })
            .collect();

        info!(
            family = %family,
            first = %first.url,
            end = %end,
            steps = plans.len(),
            "Fetching reanalysis steps"
        );

        let mut time_axis = None;
        let buffers = self
            .fetch_all(tracker, &plans, &window, &mut time_axis)
            .await?;
        let time = time_axis.ok_or_else(|| {
            tracker.fail(
                RunStage::Write,
                AcquisitionError::Task("time axis missing".to_string()),
            )
        })?;

        Ok(Acquired {
            file_name: reanalysis_file_name(first.date, end_date),
            reference: first,
            window,
            time,
            buffers,
        })
    }

    async fn discover_grid(&self, reference: &DatasetReference) -> Result<GridWindow, AcquisitionError> {
        let lon = self.fetcher.fetch_vector(reference, "lon").await?;
        let lat = self.fetcher.fetch_vector(reference, "lat").await?;
        compute_window(
            &lon.values,
            &lat.values,
            &self.config.bounding_box(),
            self.config.region.margin,
        )
    }

    async fn fetch_all(
        &self,
        tracker: &RunTracker,
        plans: &[StepPlan],
        window: &GridWindow,
        time_axis: &mut Option<TimeAxisBuffer>,
    ) -> Result<Vec<VariableBuffer>, RunError> {
        let steps = plans.len();
        let fill = self.config.output.fill_value as f32;
        let mut buffers: Vec<VariableBuffer> = self
            .config
            .variables
            .iter()
            .map(|spec| VariableBuffer::new(spec, steps, window.nlat(), window.nlon(), fill))
            .collect();

        tracker.enter(RunState::Fetching { step: 0, steps });

        let mut results = stream::iter(plans)
            .map(|plan| self.fetch_step(tracker, plan, window))
            .buffered(self.config.fetch.max_concurrent.max(1));

        while let Some(result) = results.next().await {
            let data = result?;
            let stage = RunStage::Fetch {
                variable: None,
                step: data.step,
            };

            if let Some(time) = data.time {
                let value = time.values.first().copied().ok_or_else(|| {
                    tracker.fail(stage.clone(), AcquisitionError::EmptySelection { axis: "time" })
                })?;
                let axis = time_axis
                    .get_or_insert_with(|| TimeAxisBuffer::new(steps, time.units, time.calendar));
                axis.set(data.step, value)
                    .map_err(|e| tracker.fail(stage.clone(), e))?;
            }

            for (buffer, field) in buffers.iter_mut().zip(data.fields) {
                buffer
                    .write_step(data.step, &field)
                    .map_err(|e| tracker.fail(stage.clone(), e))?;
            }

            tracker.enter(RunState::Fetching {
                step: data.step + 1,
                steps,
            });
        }

        let complete = buffers.iter().all(VariableBuffer::is_complete)
            && time_axis.as_ref().map_or(false, TimeAxisBuffer::is_complete);
        if !complete {
            return Err(tracker.fail(
                RunStage::Fetch {
                    variable: None,
                    step: steps,
                },
                AcquisitionError::Task("run ended with unfilled steps".to_string()),
            ));
        }

        Ok(buffers)
    }

    async fn fetch_step(
        &self,
        tracker: &RunTracker,
        plan: &StepPlan,
        window: &GridWindow,
    ) -> Result<StepData, RunError> {
        let time = if plan.read_time {
            let time = self
                .fetcher
                .fetch_vector(&plan.reference, "time")
                .await
                .map_err(|e| {
                    tracker.fail(
                        RunStage::Fetch {
                            variable: Some("time".to_string()),
                            step: plan.step,
                        },
                        e,
                    )
                })?;
            Some(time)
        } else {
            None
        };

        let mut fields = Vec::with_capacity(self.config.variables.len());
        for spec in &self.config.variables {
            let data = self
                .fetcher
                .fetch_slice(
                    &plan.reference,
                    &spec.name,
                    plan.time_index..plan.time_index + 1,
                    window,
                )
                .await
                .map_err(|e| {
                    tracker.fail(
                        RunStage::Fetch {
                            variable: Some(spec.name.clone()),
                            step: plan.step,
                        },
                        e,
                    )
                })?;
            fields.push(data);
        }

        debug!(step = plan.step, url = %plan.reference.url, "Step fetched");

        Ok(StepData {
            step: plan.step,
            time,
            fields,
        })
    }

    /// Race `work` against cancellation and the configured run timeout.
    async fn guarded<T>(
        &self,
        tracker: &RunTracker,
        work: impl Future<Output = Result<T, RunError>>,
    ) -> Result<T, RunError> {
        let interrupted = async {
            match self.config.run_timeout() {
                Some(limit) => tokio::select! {
                    _ = self.cancel.cancelled() => AcquisitionError::Cancelled,
                    _ = tokio::time::sleep(limit) => AcquisitionError::TimedOut(limit),
                },
                None => {
                    self.cancel.cancelled().await;
                    AcquisitionError::Cancelled
                }
            }
        };

        tokio::select! {
            biased;
            result = work => result,
            reason = interrupted => Err(tracker.fail(tracker.state().stage(), reason)),
        }
    }

    /// Write the archive. Not raced against cancellation, so an interrupted
    /// write can never leave a file behind after the run reported failure.
    async fn write(&self, tracker: &RunTracker, acquired: Acquired) -> Result<RunOutcome, RunError> {
        tracker.enter(RunState::Complete);

        let path = self.work_dir.join(&acquired.file_name);
        tokio::fs::create_dir_all(&self.work_dir).await.map_err(|e| {
            tracker.fail(
                RunStage::Write,
                AcquisitionError::ArchiveWrite {
                    path: path.clone(),
                    source: NetCdfError::IoError(e),
                },
            )
        })?;

        let steps = acquired.time.steps();
        let reference = acquired.reference.clone();
        let contents = archive::assemble(
            &acquired.reference,
            &acquired.window,
            acquired.time,
            acquired.buffers,
        );

        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || {
            netcdf_io::write_archive(
                &target,
                &contents.schema,
                &contents.coordinates,
                &contents.variables,
            )
        })
        .await
        .map_err(|e| tracker.fail(RunStage::Write, AcquisitionError::Task(e.to_string())))?
        .map_err(|source| {
            tracker.fail(
                RunStage::Write,
                AcquisitionError::ArchiveWrite {
                    path: path.clone(),
                    source,
                },
            )
        })?;

        Ok(RunOutcome {
            family: reference.family,
            path: written,
            steps,
            reference,
        })
    }

    fn finish(
        &self,
        tracker: &RunTracker,
        result: Result<RunOutcome, RunError>,
    ) -> Result<RunOutcome, RunError> {
        match &result {
            Ok(outcome) => {
                counter!("runs_total", "family" => outcome.family.as_str(), "outcome" => "success")
                    .increment(1);
                info!(
                    family = %outcome.family,
                    path = %outcome.path.display(),
                    steps = outcome.steps,
                    "Run complete"
                );
            }
            Err(e) => {
                tracker.enter(RunState::Failed);
                counter!("runs_total", "family" => e.family.as_str(), "outcome" => "failure")
                    .increment(1);
                error!(family = %e.family, stage = %e.stage, error = %e.source, "Run failed");
            }
        }
        result
    }
}

/// Runs from `first` up to and including `end`, 6 h apart.
fn reanalysis_runs(first: &DatasetReference, end: NaiveDateTime) -> Vec<(NaiveDate, ModelCycle)> {
    let mut runs = Vec::new();
    let (mut date, mut cycle) = (first.date, first.cycle);
    while run_instant(date, cycle) <= end {
        runs.push((date, cycle));
        (date, cycle) = next_run(date, cycle);
    }
    runs
}

/// `crudos{LABEL}_{YYYY-MM-DD}_{RR}z.nc`
pub fn forecast_file_name(reference: &DatasetReference) -> String {
    format!(
        "crudos{}_{}_{:02}z.nc",
        reference.family.label(),
        reference.date.format("%Y-%m-%d"),
        reference.cycle.hour()
    )
}

/// `crudosFNL_{start}__{end}.nc`
pub fn reanalysis_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "crudos{}_{}__{}.nc",
        DatasetFamily::Fnl.label(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

/// Reanalysis window ending `days_behind` days before `date`.
pub fn reanalysis_window(date: NaiveDate, days_behind: u32, history_days: u32) -> (NaiveDate, NaiveDate) {
    let end = date - Duration::days(days_behind as i64);
    (end - Duration::days(history_days as i64), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reanalysis_runs_include_end_instant() {
        let first = Catalog::new("http://localhost").reference(
            DatasetFamily::Fnl,
            date(2022, 5, 26),
            ModelCycle::Z00,
        );
        let runs = reanalysis_runs(&first, run_instant(date(2022, 5, 28), ModelCycle::Z00));
        assert_eq!(runs.len(), 9);
        assert_eq!(runs[0], (date(2022, 5, 26), ModelCycle::Z00));
        assert_eq!(runs[8], (date(2022, 5, 28), ModelCycle::Z00));
    }

    #[test]
    fn test_reanalysis_runs_from_late_first_entry() {
        let first = Catalog::new("http://localhost").reference(
            DatasetFamily::Fnl,
            date(2022, 5, 27),
            ModelCycle::Z12,
        );
        let runs = reanalysis_runs(&first, run_instant(date(2022, 5, 28), ModelCycle::Z00));
        assert_eq!(runs.len(), 3);
    }

    #[test]
    fn test_output_names() {
        let reference = Catalog::new("http://localhost").reference(
            DatasetFamily::Gfs0p25,
            date(2022, 5, 27),
            ModelCycle::Z06,
        );
        assert_eq!(forecast_file_name(&reference), "crudosGFS_0P25_2022-05-27_06z.nc");
        assert_eq!(
            reanalysis_file_name(date(2022, 5, 20), date(2022, 5, 26)),
            "crudosFNL_2022-05-20__2022-05-26.nc"
        );
    }

    #[test]
    fn test_reanalysis_window() {
        assert_eq!(
            reanalysis_window(date(2022, 5, 28), 2, 6),
            (date(2022, 5, 20), date(2022, 5, 26))
        );
    }

    #[test]
    fn test_tracker_stage_mapping() {
        let tracker = RunTracker::new(DatasetFamily::Fnl);
        assert_eq!(tracker.state(), RunState::Resolving);
        assert_eq!(tracker.state().stage(), RunStage::Resolution);

        let mut observer = tracker.subscribe();
        tracker.enter(RunState::Fetching { step: 3, steps: 9 });
        assert!(observer.has_changed().unwrap());
        assert_eq!(
            observer.borrow_and_update().stage(),
            RunStage::Fetch {
                variable: None,
                step: 3
            }
        );

        tracker.enter(RunState::Failed);
        assert!(tracker.state().is_terminal());
    }
}
