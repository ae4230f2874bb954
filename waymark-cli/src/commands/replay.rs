//! Replay command - plays a recorded track through the tracking engine.
//!
//! The track runs through the same service the library exposes, with an
//! in-memory directory standing in for the backend. Every accepted report
//! is printed as it happens, followed by a summary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use waymark::geo::{bounding_region, distance_between, format_distance, Place, DEFAULT_REGION_PADDING};
use waymark::tracking::{
    spawn_status_logger, BatteryLevel, FixedBattery, InMemoryDirectory, Report, ReplayProvider,
    ReplayStep, ServiceConfig, TrackingError, TrackingFrequency, TrackingService,
    TrackingSettings,
};

use crate::error::{CliError, InputKind};
use crate::runner::CliRunner;

/// Arguments for `waymark replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON file with the recorded track (array of fixes and `{"error": ...}` steps)
    pub track: PathBuf,

    /// JSON file with saved places to evaluate as geofences
    #[arg(long)]
    pub places: Option<PathBuf>,

    /// Member id the reports are attributed to
    #[arg(long, default_value = "me")]
    pub member: String,

    /// Override the configured tracking frequency
    #[arg(long)]
    pub frequency: Option<TrackingFrequency>,

    /// Battery level in percent (unknown when omitted)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub battery: Option<u8>,

    /// Delay between track steps in milliseconds
    #[arg(long, default_value_t = 0)]
    pub pace_ms: u64,

    /// Print each report as a JSON line instead of text
    #[arg(long)]
    pub json: bool,
}

/// Everything a replay needs besides the track itself.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub member: String,
    pub settings: TrackingSettings,
    pub battery: Option<BatteryLevel>,
    pub pace: Duration,
    pub service: ServiceConfig,
    pub status_log_interval: Duration,
}

/// Outcome of a finished replay.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    /// Fix steps in the track.
    pub fixes: usize,
    /// Simulated provider failures in the track.
    pub failures: usize,
    pub reports: Vec<Report>,
}

impl ReplaySummary {
    pub fn transitions(&self) -> usize {
        self.reports.iter().map(|r| r.transitions.len()).sum()
    }

    /// Distance along the reported positions, in meters.
    pub fn reported_distance_m(&self) -> f64 {
        self.reports
            .windows(2)
            .map(|pair| distance_between(pair[0].update.coordinate(), pair[1].update.coordinate()))
            .sum()
    }
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("replay");

    let steps: Vec<ReplayStep> = read_json(&args.track, InputKind::Track)?;
    let places: Vec<Place> = match &args.places {
        Some(path) => read_json(path, InputKind::Places)?,
        None => Vec::new(),
    };

    let config = runner.config();
    let mut settings = config.tracking.clone();
    if let Some(frequency) = args.frequency {
        settings.frequency = frequency;
    }

    let options = ReplayOptions {
        member: args.member,
        settings,
        battery: args.battery.map(BatteryLevel::new),
        pace: Duration::from_millis(args.pace_ms),
        service: config.engine.service_config(),
        status_log_interval: config.engine.status_log_interval(),
    };

    if !args.json {
        println!(
            "Replaying {} steps at {} ({} places)",
            steps.len(),
            options.settings.frequency,
            places.len()
        );
        println!();
    }

    let json = args.json;
    let summary = replay(steps, places, options, |report| print_report(report, json)).await?;

    if !json {
        print_summary(&summary);
    }
    Ok(())
}

/// Play `steps` through a tracking service and collect every report.
///
/// Returns once the whole track has been delivered and processed.
pub async fn replay(
    steps: Vec<ReplayStep>,
    places: Vec<Place>,
    options: ReplayOptions,
    on_report: impl FnMut(&Report),
) -> Result<ReplaySummary, CliError> {
    if options.settings.privacy_mode {
        return Err(TrackingError::PrivacyMode.into());
    }

    let fixes = steps
        .iter()
        .filter(|step| matches!(step, ReplayStep::Fix(_)))
        .count();
    let failures = steps.len() - fixes;

    let directory = InMemoryDirectory::with_user(options.member.clone());
    directory.set_places(places);
    directory.set_settings(options.settings.clone());

    let provider = ReplayProvider::from_steps(steps).with_pace(options.pace);
    let battery = FixedBattery::new(options.battery);
    let (handle, task) = TrackingService::spawn(provider.clone(), directory, battery, options.service);
    let reports = handle.subscribe_reports();

    let logger_cancel = CancellationToken::new();
    let logger = tracing::enabled!(tracing::Level::DEBUG).then(|| {
        spawn_status_logger(handle.clone(), logger_cancel.clone(), options.status_log_interval)
    });

    let driver = async move {
        let started = handle.start_tracking().await;
        if started.is_ok() {
            provider.wait_until_exhausted().await;
        }
        // Queued samples are handled before this stop
        let stopped = handle.stop_tracking().await;

        handle.shutdown();
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Tracking service task failed");
        }

        // The logger holds a handle; the report channel closes once both are gone
        logger_cancel.cancel();
        if let Some(logger) = logger {
            let _ = logger.await;
        }
        drop(handle);

        started.and(stopped)
    };

    let (result, reports) = tokio::join!(driver, collect_reports(reports, on_report));

    result?;
    Ok(ReplaySummary {
        fixes,
        failures,
        reports,
    })
}

/// Drain the report channel until every sender is gone.
async fn collect_reports(
    mut rx: broadcast::Receiver<Report>,
    mut on_report: impl FnMut(&Report),
) -> Vec<Report> {
    let mut reports = Vec::new();
    loop {
        match rx.recv().await {
            Ok(report) => {
                on_report(&report);
                reports.push(report);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Report printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    reports
}

fn read_json<T: DeserializeOwned>(path: &Path, kind: InputKind) -> Result<T, CliError> {
    let content = std::fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;
    serde_json::from_str(&content).map_err(|error| CliError::InvalidInput {
        kind,
        path: path.to_path_buf(),
        error,
    })
}

fn print_report(report: &Report, json: bool) {
    if json {
        match serde_json::to_string(&report.update) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to encode report"),
        }
        for transition in &report.transitions {
            if let Ok(line) = serde_json::to_string(transition) {
                println!("{}", line);
            }
        }
        return;
    }

    println!("{}", format_report(report));
    for transition in &report.transitions {
        println!("    {} {}", transition.kind, transition.place_name);
    }
}

fn format_report(report: &Report) -> String {
    let update = &report.update;
    let mut line = format!(
        "{}  {}",
        update.timestamp.format("%H:%M:%S"),
        update.coordinate()
    );
    if let Some(accuracy) = update.accuracy {
        line.push_str(&format!("  ±{}", format_distance(accuracy)));
    }
    if let Some(battery) = update.battery {
        line.push_str(&format!("  battery {}%", battery));
    }
    line
}

fn print_summary(summary: &ReplaySummary) {
    println!();
    println!("Summary");
    println!("=======");
    println!("  Fixes:       {}", summary.fixes);
    if summary.failures > 0 {
        println!("  Failures:    {}", summary.failures);
    }
    println!(
        "  Reported:    {} ({} skipped)",
        summary.reports.len(),
        summary.fixes.saturating_sub(summary.reports.len())
    );
    println!("  Transitions: {}", summary.transitions());
    println!("  Distance:    {}", format_distance(summary.reported_distance_m()));

    if !summary.reports.is_empty() {
        let points: Vec<_> = summary.reports.iter().map(|r| r.update.coordinate()).collect();
        let region = bounding_region(&points, DEFAULT_REGION_PADDING);
        println!(
            "  Region:      {} (span {:.4}° × {:.4}°)",
            region.center, region.latitude_delta, region.longitude_delta
        );
    }
}
