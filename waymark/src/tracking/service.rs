//! Tracking service - async driver for the session controller.
//!
//! The [`TrackingService`] owns a [`TrackingController`] on a single tokio
//! task and serializes every input through one `select!` loop:
//!
//! - Commands from [`TrackingHandle`] (mpsc, replies over oneshot)
//! - Samples and errors from the live subscription
//! - A battery poll interval
//! - A re-attach timer armed after repeated provider errors
//! - A cancellation token for shutdown
//!
//! Each input is processed to completion before the next is taken, so the
//! controller never sees overlapping samples. The loop is biased: timers
//! first, then samples, then commands, so samples already queued are handled
//! before any command sent after them.
//!
//! # Provider errors
//!
//! After `provider_error_threshold` consecutive errors the subscription is
//! re-attached after an exponential backoff (2^n seconds, capped at
//! `max_backoff`). A sample that gets through resets the count and disarms
//! the timer; stopping the session disarms it too.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::battery::BatterySource;
use super::controller::{ControllerConfig, Report, SampleOutcome, TrackingController};
use super::directory::Directory;
use super::error::TrackingError;
use super::provider::{LocationProvider, SessionEvent};
use super::state::{AppState, LocationUpdate, TrackingSettings, TrackingStatus};

/// Default battery poll interval (1 minute).
pub const DEFAULT_BATTERY_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Consecutive provider errors before the subscription is re-attached.
pub const DEFAULT_PROVIDER_ERROR_THRESHOLD: u32 = 3;

/// Maximum re-attach backoff (5 minutes).
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

const COMMAND_CAPACITY: usize = 16;
const SAMPLE_CAPACITY: usize = 64;
// Sized so a subscriber draining a fast replay does not lag
const REPORT_CAPACITY: usize = 1024;

/// Service tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub controller: ControllerConfig,
    pub battery_poll_interval: Duration,
    pub provider_error_threshold: u32,
    pub max_backoff: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            battery_poll_interval: DEFAULT_BATTERY_POLL_INTERVAL,
            provider_error_threshold: DEFAULT_PROVIDER_ERROR_THRESHOLD,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

enum Command {
    Start(oneshot::Sender<Result<(), TrackingError>>),
    Stop(oneshot::Sender<()>),
    OneTimeLocation(oneshot::Sender<Result<LocationUpdate, TrackingError>>),
    UpdateSettings(TrackingSettings, oneshot::Sender<Result<(), TrackingError>>),
    SetAppState(AppState, oneshot::Sender<Result<(), TrackingError>>),
}

/// Cloneable front end to a running [`TrackingService`].
#[derive(Clone)]
pub struct TrackingHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<TrackingStatus>,
    reports: broadcast::Sender<Report>,
    cancellation: CancellationToken,
}

impl TrackingHandle {
    pub async fn start_tracking(&self) -> Result<(), TrackingError> {
        self.request(Command::Start).await?
    }

    pub async fn stop_tracking(&self) -> Result<(), TrackingError> {
        self.request(Command::Stop).await
    }

    /// Read and report the current position, bypassing the filter.
    pub async fn get_one_time_location(&self) -> Result<LocationUpdate, TrackingError> {
        self.request(Command::OneTimeLocation).await?
    }

    pub async fn update_settings(&self, settings: TrackingSettings) -> Result<(), TrackingError> {
        self.request(|reply| Command::UpdateSettings(settings, reply))
            .await?
    }

    pub async fn set_app_state(&self, app_state: AppState) -> Result<(), TrackingError> {
        self.request(|reply| Command::SetAppState(app_state, reply))
            .await?
    }

    /// Latest published status.
    pub fn status(&self) -> TrackingStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TrackingStatus> {
        self.status.clone()
    }

    /// Receive every accepted sample from the continuous subscription.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<Report> {
        self.reports.subscribe()
    }

    /// Stop tracking and end the service task.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation.is_cancelled() && !self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TrackingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| TrackingError::ServiceStopped)?;
        reply_rx.await.map_err(|_| TrackingError::ServiceStopped)
    }
}

/// Async driver owning a controller.
pub struct TrackingService<P: LocationProvider, D: Directory, B: BatterySource> {
    controller: TrackingController<P, D>,
    battery: B,
    config: ServiceConfig,
    commands: mpsc::Receiver<Command>,
    samples: mpsc::Receiver<SessionEvent>,
    status_tx: watch::Sender<TrackingStatus>,
    reports_tx: broadcast::Sender<Report>,
    cancellation: CancellationToken,
    reattach_at: Option<Instant>,
}

impl<P, D, B> TrackingService<P, D, B>
where
    P: LocationProvider + 'static,
    D: Directory + 'static,
    B: BatterySource + 'static,
{
    /// Create the service and its handle without spawning.
    pub fn new(provider: P, directory: D, battery: B, config: ServiceConfig) -> (Self, TrackingHandle) {
        let (sample_tx, samples) = mpsc::channel(SAMPLE_CAPACITY);
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (reports_tx, _) = broadcast::channel(REPORT_CAPACITY);
        let cancellation = CancellationToken::new();

        let controller = TrackingController::new(provider, directory, config.controller, sample_tx);
        let (status_tx, status_rx) = watch::channel(controller.status());

        let handle = TrackingHandle {
            commands: command_tx,
            status: status_rx,
            reports: reports_tx.clone(),
            cancellation: cancellation.clone(),
        };

        let service = Self {
            controller,
            battery,
            config,
            commands,
            samples,
            status_tx,
            reports_tx,
            cancellation,
            reattach_at: None,
        };

        (service, handle)
    }

    /// Create the service and run it as an async task.
    pub fn spawn(
        provider: P,
        directory: D,
        battery: B,
        config: ServiceConfig,
    ) -> (TrackingHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(provider, directory, battery, config);
        (handle, service.start())
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        tracing::info!(
            battery_poll_secs = self.config.battery_poll_interval.as_secs(),
            error_threshold = self.config.provider_error_threshold,
            "Tracking service started"
        );

        // Read the battery up front so the first report carries a level
        self.poll_battery().await;
        self.publish_status();

        let poll_interval = self.config.battery_poll_interval;
        let mut battery_ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        battery_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => break,

                _ = battery_ticker.tick() => self.poll_battery().await,

                _ = sleep_until_armed(self.reattach_at) => {
                    self.reattach_at = None;
                    self.reattach().await;
                }

                Some(event) = self.samples.recv() => self.handle_event(event),

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("All tracking handles dropped, stopping");
                        break;
                    }
                },
            }

            if !self.controller.is_tracking() {
                self.reattach_at = None;
            }
            self.publish_status();
        }

        self.controller.shutdown();
        self.publish_status();
        tracing::info!("Tracking service stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.controller.start().await);
            }
            Command::Stop(reply) => {
                self.controller.stop();
                let _ = reply.send(());
            }
            Command::OneTimeLocation(reply) => {
                let _ = reply.send(self.controller.get_one_time_location().await);
            }
            Command::UpdateSettings(settings, reply) => {
                let _ = reply.send(self.controller.apply_settings(settings).await);
            }
            Command::SetAppState(app_state, reply) => {
                let _ = reply.send(self.controller.set_app_state(app_state).await);
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event.result {
            Ok(sample) => {
                if let SampleOutcome::Reported(report) =
                    self.controller.handle_sample(event.generation, sample)
                {
                    // No receivers is fine
                    let _ = self.reports_tx.send(*report);
                }
                if self.controller.consecutive_errors() == 0 {
                    self.reattach_at = None;
                }
            }
            Err(error) => {
                if let Some(count) = self.controller.handle_provider_error(event.generation, error) {
                    self.arm_reattach(count);
                }
            }
        }
    }

    async fn poll_battery(&mut self) {
        let level = self.battery.battery_level();
        if let Err(e) = self.controller.refresh_battery(level, Utc::now()).await {
            tracing::warn!(error = %e, "Failed to apply battery level");
        }
    }

    async fn reattach(&mut self) {
        if self.controller.reattach().await.is_err() {
            let count = self.controller.consecutive_errors();
            self.arm_reattach(count);
        }
    }

    fn arm_reattach(&mut self, consecutive_errors: u32) {
        if consecutive_errors < self.config.provider_error_threshold || self.reattach_at.is_some() {
            return;
        }

        let backoff = calculate_backoff(consecutive_errors, self.config.max_backoff);
        tracing::debug!(
            backoff_secs = backoff.as_secs(),
            consecutive_errors,
            "Backing off before re-attaching subscription"
        );
        self.reattach_at = Some(Instant::now() + backoff);
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.controller.status());
    }
}

fn sleep_until_armed(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// Calculate exponential backoff: 2^n seconds, capped at `max`.
pub fn calculate_backoff(consecutive_errors: u32, max: Duration) -> Duration {
    let secs = 2u64.saturating_pow(consecutive_errors.min(20));
    Duration::from_secs(secs).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::battery::FixedBattery;
    use crate::tracking::directory::InMemoryDirectory;
    use crate::tracking::replay::{ReplayProvider, ReplayStep};
    use crate::tracking::state::{BatteryLevel, PositionSample, TrackingState};
    use chrono::TimeZone;

    fn sample(lat: f64, secs: i64) -> PositionSample {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        PositionSample::new(lat, 0.0, t0 + chrono::Duration::seconds(secs)).with_speed(2.0)
    }

    fn spawn(
        provider: ReplayProvider,
        directory: InMemoryDirectory,
    ) -> (TrackingHandle, JoinHandle<()>) {
        TrackingService::spawn(
            provider,
            directory,
            FixedBattery::new(Some(BatteryLevel::new(80))),
            ServiceConfig::default(),
        )
    }

    #[test]
    fn test_calculate_backoff() {
        let max = DEFAULT_MAX_BACKOFF;
        assert_eq!(calculate_backoff(0, max), Duration::from_secs(1));
        assert_eq!(calculate_backoff(3, max), Duration::from_secs(8));
        assert_eq!(calculate_backoff(8, max), Duration::from_secs(256));
        assert_eq!(calculate_backoff(9, max), max); // 512 > 300
        assert_eq!(calculate_backoff(u32::MAX, max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_flow_to_subscribers() {
        let provider = ReplayProvider::new(vec![sample(0.0, 0), sample(0.001, 60)]);
        let directory = InMemoryDirectory::with_user("alice");
        let (handle, _task) = spawn(provider, directory.clone());
        let mut reports = handle.subscribe_reports();

        handle.start_tracking().await.unwrap();

        let first = reports.recv().await.unwrap();
        assert_eq!(first.update.latitude, 0.0);
        let second = reports.recv().await.unwrap();
        assert_eq!(second.update.latitude, 0.001);

        assert_eq!(directory.locations().len(), 2);
        let status = handle.status();
        assert!(status.is_tracking);
        assert_eq!(status.battery_level, Some(BatteryLevel::new(80)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reattach_after_repeated_errors() {
        let fail = || ReplayStep::Fail {
            error: "no fix".into(),
        };
        let provider = ReplayProvider::from_steps(vec![fail(), fail(), fail()]);
        let (handle, _task) = spawn(provider.clone(), InMemoryDirectory::with_user("alice"));

        handle.start_tracking().await.unwrap();
        assert_eq!(provider.log().watches.len(), 1);

        // Threshold 3 reached: re-attach after 2^3 = 8 seconds
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(provider.log().watches.len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(provider.log().watches.len(), 2);

        let status = handle.status();
        assert!(status.is_tracking);
        assert_eq!(status.error_msg.as_deref(), Some("Location provider error: no fix"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms_reattach() {
        let fail = || ReplayStep::Fail {
            error: "no fix".into(),
        };
        let provider = ReplayProvider::from_steps(vec![fail(), fail(), fail()]);
        let (handle, _task) = spawn(provider.clone(), InMemoryDirectory::with_user("alice"));

        handle.start_tracking().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop_tracking().await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.log().watches.len(), 1);
        assert_eq!(handle.status().state, TrackingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_privacy_update_stops_tracking() {
        let provider = ReplayProvider::new(vec![]);
        let (handle, _task) = spawn(provider, InMemoryDirectory::with_user("alice"));

        handle.start_tracking().await.unwrap();
        assert!(handle.status().is_tracking);

        let privacy = TrackingSettings {
            privacy_mode: true,
            ..TrackingSettings::default()
        };
        handle.update_settings(privacy).await.unwrap();

        let status = handle.status();
        assert!(!status.is_tracking);
        assert_eq!(status.state, TrackingState::Suspended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_poll_emits_battery_updates() {
        let battery = FixedBattery::new(Some(BatteryLevel::new(64)));
        let directory = InMemoryDirectory::with_user("alice");
        let (handle, _task) = TrackingService::spawn(
            ReplayProvider::new(vec![]),
            directory.clone(),
            battery.clone(),
            ServiceConfig::default(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(directory.battery_reports().len(), 1);

        battery.set(Some(BatteryLevel::new(63)));
        tokio::time::sleep(DEFAULT_BATTERY_POLL_INTERVAL).await;

        let reports = directory.battery_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].level, BatteryLevel::new(63));
        assert_eq!(handle.status().battery_level, Some(BatteryLevel::new(63)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_service() {
        let (handle, task) = spawn(
            ReplayProvider::new(vec![]),
            InMemoryDirectory::with_user("alice"),
        );
        handle.start_tracking().await.unwrap();

        handle.shutdown();
        task.await.unwrap();

        assert!(!handle.is_running());
        assert!(!handle.status().is_tracking);
        assert_eq!(handle.start_tracking().await, Err(TrackingError::ServiceStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_time_location_through_handle() {
        let provider = ReplayProvider::new(vec![sample(1.0, 0)]);
        let directory = InMemoryDirectory::with_user("alice");
        let (handle, _task) = spawn(provider, directory.clone());

        let update = handle.get_one_time_location().await.unwrap();
        assert_eq!(update.latitude, 1.0);
        assert_eq!(directory.locations().len(), 1);
    }
}
