//! Forcing data downloader.
//!
//! Daily driver for the acquisition pipeline:
//! - FNL reanalysis archive over the configured history window
//! - GFS forecast archive of the configured run
//! - Optional time-units rewrite to epoch seconds
//! - Placement into `output_dir/YYYYMMDD/`
//! - Failure notification via log and webhook

mod driver;
mod notify;
mod placement;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use acquisition::{AcquisitionConfig, OpendapSource, Orchestrator, RunOutcome};
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use netcdf_io::TimeFix;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use driver::{parse_date, plan_runs, PlannedRun, RunSelection};
use notify::{FailureReport, Notifier};
use placement::place_archive;

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Fetch FNL and GFS forcing archives for a region")]
struct Args {
    /// Acquisition configuration (YAML)
    #[arg(long, env = "ACQUISITION_CONFIG", default_value = "config/acquisition.yaml")]
    config: PathBuf,

    /// Driver date as YYYYMMDD (default: today, UTC)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Run only one family
    #[arg(long, value_enum, default_value = "all")]
    only: RunSelection,

    /// Directory archives are written to while a run is in progress
    #[arg(long, env = "WORK_DIR", default_value = "/tmp/forcing")]
    work_dir: PathBuf,

    /// Root of the dated output tree
    #[arg(long, env = "OUTPUT_DIR", default_value = "/data/forcing")]
    output_dir: PathBuf,

    /// Rewrite archive time axes to seconds since 1970-01-01
    #[arg(long)]
    fix_time_units: bool,

    /// Webhook receiving a JSON report of every failed run
    #[arg(long, env = "NOTIFY_URL")]
    notify_url: Option<String>,

    /// Overrides fetch.run_timeout_secs
    #[arg(long)]
    run_timeout_secs: Option<u64>,

    /// Serve Prometheus metrics on this port while running
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    if let Some(port) = args.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = port, "Prometheus metrics exporter listening");
    }

    netcdf_io::silence_hdf5_errors();

    let mut config = AcquisitionConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(secs) = args.run_timeout_secs {
        config.fetch.run_timeout_secs = Some(secs);
        config.validate()?;
    }
    let config = Arc::new(config);

    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let runs = plan_runs(&config, date, args.only);
    info!(
        date = %date,
        runs = runs.len(),
        base_url = %config.catalog.base_url,
        "Starting forcing downloader"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling runs");
            on_signal.cancel();
        }
    });

    let orchestrator = Orchestrator::new(
        config.clone(),
        Arc::new(OpendapSource::new()),
        args.work_dir.clone(),
        cancel.clone(),
    );
    let notifier = Notifier::new(args.notify_url.clone())?;

    let mut failed = 0usize;
    for run in &runs {
        let result = match run {
            PlannedRun::Reanalysis { start, end } => orchestrator.run_reanalysis(*start, *end).await,
            PlannedRun::Forecast { date } => orchestrator.run_forecast(*date).await,
        };

        match result {
            Ok(outcome) => {
                if let Err(e) = deliver(&outcome, &args, date).await {
                    error!(run = run.label(), error = %format!("{:#}", e), "Delivery failed");
                    failed += 1;
                }
            }
            Err(e) => {
                notifier.failure(&FailureReport::new(run.label(), date, &e)).await;
                failed += 1;
            }
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    if failed > 0 {
        bail!("{} of {} runs failed", failed, runs.len());
    }
    info!(runs = runs.len(), "All runs complete");
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Post-process a finished archive and move it into the output tree.
async fn deliver(outcome: &RunOutcome, args: &Args, date: NaiveDate) -> Result<PathBuf> {
    if args.fix_time_units {
        rewrite_time_units(&outcome.path).await?;
    }
    place_archive(&outcome.path, &args.output_dir, date).await
}

async fn rewrite_time_units(path: &Path) -> Result<()> {
    let target = path.to_path_buf();
    let fix = tokio::task::spawn_blocking(move || netcdf_io::fix_time_units(&target))
        .await
        .context("time-units task panicked")?
        .with_context(|| format!("failed to rewrite time units of {}", path.display()))?;

    match fix {
        TimeFix::Rewritten { steps } => {
            info!(path = %path.display(), steps = steps, "Time axis rewritten to epoch seconds")
        }
        TimeFix::AlreadyEpoch => info!(path = %path.display(), "Time axis already in epoch seconds"),
    }
    Ok(())
}
