//! Tracking session controller.
//!
//! Owns the subscription lifecycle and runs every sample through the
//! pipeline:
//!
//! ```text
//! sample ──► validation ──► MovementDetector ──► stationary quiet period
//!                                                        │
//!                                                        ▼
//!                                               significance filter
//!                                                        │ accepted
//!                                                        ▼
//!              LocationUpdate ──► directory ──► geofence transitions
//! ```
//!
//! # State machine
//!
//! `Idle → RequestingPermission → Active ⇄ Suspended → Idle`
//!
//! The controller is a plain `&mut self` state machine. Callers serialize
//! access to it; [`TrackingService`](super::service::TrackingService) does so
//! by owning it on a single task.
//!
//! # Generations
//!
//! Every opened or released subscription bumps the generation counter. A
//! sample is only processed if it carries the current generation and the
//! session is `Active`, so nothing a stopped session delivers late can move
//! the last reported location.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::battery::BatteryUsageTracker;
use super::directory::Directory;
use super::error::{ProviderError, TrackingError};
use super::filter;
use super::geofence::GeofenceTracker;
use super::movement::MovementDetector;
use super::policy::{self, WatchOptions};
use super::provider::{Generation, LocationProvider, SampleSink, SessionEvent, Subscription};
use super::state::{
    AppState, BatteryLevel, LocationUpdate, MemberId, PlaceTransition, PositionSample,
    TrackingSettings, TrackingState, TrackingStatus,
};
use crate::geo::Coordinate;

/// Default quiet period for a stationary, paused device (10 minutes).
pub const DEFAULT_STATIONARY_QUIET_PERIOD: Duration = Duration::from_secs(600);

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// While stationary with pause enabled, skip samples until this long has
    /// passed since the last report; later samples still go through the
    /// significance filter. `None` disables the quiet period.
    pub stationary_quiet_period: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stationary_quiet_period: Some(DEFAULT_STATIONARY_QUIET_PERIOD),
        }
    }
}

/// An accepted sample and everything it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub update: LocationUpdate,
    pub transitions: Vec<PlaceTransition>,
}

/// What happened to a sample passed to [`TrackingController::handle_sample`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Stale generation, session not active, or nobody signed in.
    Discarded,
    /// Non-finite or out-of-range coordinates.
    Invalid,
    /// Stationary inside the quiet period since the last report.
    Suppressed,
    /// Not far enough from the last reported location.
    Filtered,
    Reported(Box<Report>),
}

impl SampleOutcome {
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Reported(_))
    }
}

/// Tracking session state machine.
pub struct TrackingController<P: LocationProvider, D: Directory> {
    provider: P,
    directory: D,
    config: ControllerConfig,

    /// Shared sending half of the session channel; each subscription gets
    /// a [`SampleSink`] wrapping a clone.
    sample_tx: mpsc::Sender<SessionEvent>,

    state: TrackingState,
    generation: Generation,
    subscription: Option<Subscription>,

    settings: TrackingSettings,
    app_state: AppState,
    battery: Option<BatteryLevel>,
    battery_usage: BatteryUsageTracker,

    /// Member the last session was started for.
    session_member: Option<MemberId>,
    movement: MovementDetector,
    geofences: GeofenceTracker,
    last_reported: Option<Coordinate>,
    last_update: Option<LocationUpdate>,

    error_msg: Option<String>,
    consecutive_errors: u32,
}

impl<P: LocationProvider, D: Directory> TrackingController<P, D> {
    /// Create an idle controller.
    ///
    /// Settings and the last reported location are seeded from `directory`.
    pub fn new(
        provider: P,
        directory: D,
        config: ControllerConfig,
        sample_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let settings = directory.settings();
        let last_reported = directory.last_reported_location();

        Self {
            provider,
            directory,
            config,
            sample_tx,
            state: TrackingState::Idle,
            generation: 0,
            subscription: None,
            settings,
            app_state: AppState::Active,
            battery: None,
            battery_usage: BatteryUsageTracker::new(),
            session_member: None,
            movement: MovementDetector::new(),
            geofences: GeofenceTracker::new(),
            last_reported,
            last_update: None,
            error_msg: None,
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Active
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    pub fn last_reported(&self) -> Option<Coordinate> {
        self.last_reported
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Snapshot for UI consumers.
    pub fn status(&self) -> TrackingStatus {
        TrackingStatus {
            state: self.state,
            is_tracking: self.is_tracking(),
            error_msg: self.error_msg.clone(),
            battery_level: self.battery,
            daily_battery_usage: self.battery_usage.daily_usage_percent(),
            is_moving: self.movement.is_moving(),
            last_update: self.last_update.clone(),
        }
    }

    /// Parameters the subscription should currently run with.
    pub fn watch_options(&self) -> WatchOptions {
        policy::watch_options(
            self.battery,
            self.settings.frequency,
            self.app_state.is_background(),
            self.settings.reduced_accuracy_when_background,
        )
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start (or restart) a tracking session.
    ///
    /// With privacy mode on the controller goes straight to `Suspended`
    /// without prompting for permission. Without a signed-in member any
    /// running session is released and the controller goes idle.
    pub async fn start(&mut self) -> Result<(), TrackingError> {
        let Some(member_id) = self.directory.current_user_id() else {
            self.release_subscription();
            self.state = TrackingState::Idle;
            return self.fail(TrackingError::NoCurrentUser);
        };

        self.release_subscription();
        self.prepare_session(&member_id);

        if self.settings.privacy_mode {
            tracing::info!("Privacy mode on, tracking suspended");
            self.suspend();
            return Ok(());
        }

        self.state = TrackingState::RequestingPermission;

        if !self.provider.request_foreground_permission().await.is_granted() {
            self.state = TrackingState::Idle;
            return self.fail(TrackingError::PermissionDenied);
        }

        if !self.provider.request_background_permission().await.is_granted() {
            tracing::warn!("Background location permission denied, tracking in foreground only");
        }

        if let Err(e) = self.open_subscription().await {
            self.state = TrackingState::Idle;
            return self.fail(e.into());
        }

        self.state = TrackingState::Active;
        self.error_msg = None;
        self.consecutive_errors = 0;

        tracing::info!(
            generation = self.generation,
            frequency = %self.settings.frequency,
            "Tracking started"
        );
        Ok(())
    }

    /// Release the subscription and go idle. Calling it twice is a no-op.
    pub fn stop(&mut self) {
        if self.state == TrackingState::Idle && self.subscription.is_none() {
            return;
        }

        self.release_subscription();
        self.state = TrackingState::Idle;
        self.consecutive_errors = 0;
        tracing::info!(generation = self.generation, "Tracking stopped");
    }

    /// Teardown. Always releases the platform subscription.
    pub fn shutdown(&mut self) {
        self.stop();
        tracing::debug!("Tracking controller shut down");
    }

    /// Reopen the subscription after provider failures.
    ///
    /// Keeps the error counter, so repeated failures keep growing the
    /// caller's backoff until a sample gets through.
    pub async fn reattach(&mut self) -> Result<(), TrackingError> {
        if self.state != TrackingState::Active {
            return Ok(());
        }

        tracing::info!(
            consecutive_errors = self.consecutive_errors,
            "Re-attaching location subscription"
        );

        self.release_subscription();
        if let Err(e) = self.open_subscription().await {
            self.consecutive_errors += 1;
            return self.fail(e.into());
        }
        Ok(())
    }

    // =========================================================================
    // Samples
    // =========================================================================

    /// Run one raw sample through the pipeline.
    pub fn handle_sample(&mut self, generation: Generation, sample: PositionSample) -> SampleOutcome {
        if generation != self.generation || self.state != TrackingState::Active {
            tracing::trace!(
                generation,
                current = self.generation,
                state = %self.state,
                "Discarding sample from inactive session"
            );
            return SampleOutcome::Discarded;
        }

        if !sample.coordinate().is_valid() {
            tracing::warn!(
                lat = sample.latitude,
                lon = sample.longitude,
                "Rejecting sample with invalid coordinates"
            );
            return SampleOutcome::Invalid;
        }

        if self.consecutive_errors > 0 {
            self.consecutive_errors = 0;
            self.error_msg = None;
        }

        let is_moving = self.movement.update(&sample, self.last_reported);

        if self.in_stationary_quiet_period(&sample, is_moving) {
            tracing::trace!("Stationary, skipping sample inside quiet period");
            return SampleOutcome::Suppressed;
        }

        let accepted = filter::should_report(
            &sample,
            self.last_reported,
            self.settings.frequency,
            self.battery,
            is_moving,
            self.settings.pause_when_stationary,
        );
        if !accepted {
            return SampleOutcome::Filtered;
        }

        let Some(member_id) = self.directory.current_user_id() else {
            tracing::warn!("Sample accepted but no member is signed in");
            return SampleOutcome::Discarded;
        };

        let (update, transitions) = self.report(&member_id, &sample);
        SampleOutcome::Reported(Box::new(Report { update, transitions }))
    }

    /// Record a provider failure for the current session.
    ///
    /// Returns the consecutive error count, or `None` for a stale session.
    pub fn handle_provider_error(&mut self, generation: Generation, error: ProviderError) -> Option<u32> {
        if generation != self.generation || self.state != TrackingState::Active {
            return None;
        }

        self.consecutive_errors += 1;
        tracing::warn!(
            error = %error,
            consecutive_errors = self.consecutive_errors,
            "Location provider error"
        );
        self.error_msg = Some(error.to_string());

        Some(self.consecutive_errors)
    }

    // =========================================================================
    // Configuration changes
    // =========================================================================

    /// React to new user settings.
    pub async fn apply_settings(&mut self, settings: TrackingSettings) -> Result<(), TrackingError> {
        let previous = std::mem::replace(&mut self.settings, settings);

        match self.state {
            TrackingState::Active if self.settings.privacy_mode => {
                tracing::info!("Privacy mode enabled, suspending tracking");
                self.suspend();
                Ok(())
            }
            TrackingState::Active if previous.cadence_differs(&self.settings) => {
                self.reconfigure().await
            }
            TrackingState::Suspended if !self.settings.privacy_mode => {
                if self.directory.current_user_id().is_some() {
                    tracing::info!("Privacy mode disabled, resuming tracking");
                    self.start().await
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// React to the host app moving between foreground and background.
    ///
    /// Returning to the foreground triggers one immediate read while tracking.
    pub async fn set_app_state(&mut self, app_state: AppState) -> Result<(), TrackingError> {
        let previous = std::mem::replace(&mut self.app_state, app_state);
        if previous == app_state || !self.is_tracking() {
            return Ok(());
        }

        if self.settings.reduced_accuracy_when_background
            && previous.is_background() != app_state.is_background()
        {
            self.reconfigure().await?;
        }

        if previous.is_background() && !app_state.is_background() {
            tracing::debug!("Returned to foreground, refreshing location");
            self.get_one_time_location().await?;
        }

        Ok(())
    }

    /// Store a new battery reading and emit a battery-only member update.
    ///
    /// A change that alters the requested accuracy reconfigures the session.
    pub async fn refresh_battery(
        &mut self,
        level: Option<BatteryLevel>,
        at: DateTime<Utc>,
    ) -> Result<(), TrackingError> {
        let before = self.watch_options();
        self.battery = level;

        if let Some(level) = level {
            self.battery_usage.record(at, level);
            if let Some(member_id) = self.directory.current_user_id() {
                self.directory.record_battery(&member_id, level, at);
            }
        }

        if self.is_tracking() && self.watch_options().accuracy != before.accuracy {
            tracing::info!(
                battery = ?level.map(BatteryLevel::percent),
                accuracy = %self.watch_options().accuracy,
                "Battery level changed requested accuracy"
            );
            self.reconfigure().await?;
        }

        Ok(())
    }

    // =========================================================================
    // One-shot reads
    // =========================================================================

    /// Read and report the current position regardless of session state.
    ///
    /// The significance filter is not consulted; explicit reads always report.
    pub async fn get_one_time_location(&mut self) -> Result<LocationUpdate, TrackingError> {
        let Some(member_id) = self.directory.current_user_id() else {
            return self.fail(TrackingError::NoCurrentUser);
        };

        if self.settings.privacy_mode {
            return self.fail(TrackingError::PrivacyMode);
        }

        if !self.provider.request_foreground_permission().await.is_granted() {
            return self.fail(TrackingError::PermissionDenied);
        }

        let accuracy = policy::one_shot_accuracy(self.battery);
        let sample = match self.provider.current_position(accuracy).await {
            Ok(sample) => sample,
            Err(e) => return self.fail(e.into()),
        };

        let point = sample.coordinate();
        if !point.is_valid() {
            return self.fail(ProviderError::InvalidFix(point.to_string()).into());
        }

        tracing::debug!(%accuracy, "One-shot location read");

        let (update, _) = self.report(&member_id, &sample);
        Ok(update)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Emit an update for an accepted sample and evaluate geofences.
    fn report(&mut self, member_id: &MemberId, sample: &PositionSample) -> (LocationUpdate, Vec<PlaceTransition>) {
        let update = LocationUpdate::from_sample(member_id.clone(), sample, self.battery);
        self.directory.record_location(update.clone());

        let point = sample.coordinate();
        self.last_reported = Some(point);
        self.directory.set_last_reported_location(point);
        self.movement.record_report(sample.timestamp);

        let places = self.directory.places();
        let transitions = self
            .geofences
            .transitions(member_id, point, &places, sample.timestamp);
        for transition in &transitions {
            self.directory.record_place_transition(transition.clone());
        }

        tracing::debug!(
            lat = format!("{:.5}", update.latitude),
            lon = format!("{:.5}", update.longitude),
            transitions = transitions.len(),
            "Location reported"
        );

        self.last_update = Some(update.clone());
        (update, transitions)
    }

    /// True while a stationary, paused device is inside the quiet period
    /// since its last report. Samples older than that report count as inside.
    fn in_stationary_quiet_period(&self, sample: &PositionSample, is_moving: bool) -> bool {
        let Some(period) = self.config.stationary_quiet_period else {
            return false;
        };
        if is_moving || !self.settings.pause_when_stationary {
            return false;
        }
        let Some(last) = self.movement.state().last_updated_at else {
            return false;
        };

        (sample.timestamp - last)
            .to_std()
            .map_or(true, |elapsed| elapsed < period)
    }

    /// Start cold when the member changed or nothing was ever reported.
    fn prepare_session(&mut self, member_id: &MemberId) {
        if let Some(previous) = self.session_member.replace(member_id.clone()) {
            if &previous != member_id {
                tracing::info!(%previous, member = %member_id, "Member changed, starting cold");
                self.geofences.reset_member(&previous);
                self.last_reported = self.directory.last_reported_location();
                self.movement.reset();
            }
        }

        if self.last_reported.is_none() {
            self.movement.reset();
        }
    }

    /// Release the subscription and forget place membership until resumed.
    fn suspend(&mut self) {
        self.release_subscription();
        if let Some(member_id) = &self.session_member {
            self.geofences.reset_member(member_id);
        }
        self.state = TrackingState::Suspended;
    }

    /// Apply current options in place, or restart when the provider can't.
    async fn reconfigure(&mut self) -> Result<(), TrackingError> {
        let options = self.watch_options();

        if let Some(subscription) = &self.subscription {
            if self.provider.reconfigure(subscription, options).await {
                tracing::info!(
                    accuracy = %options.accuracy,
                    distance_m = options.cadence.distance_interval_m,
                    "Subscription reconfigured in place"
                );
                return Ok(());
            }
        }

        tracing::info!(accuracy = %options.accuracy, "Restarting subscription with new options");
        self.start().await
    }

    async fn open_subscription(&mut self) -> Result<(), ProviderError> {
        self.generation += 1;
        let options = self.watch_options();
        let sink = SampleSink::new(self.generation, self.sample_tx.clone());

        let subscription = self.provider.watch_position(options, sink).await?;
        tracing::debug!(
            %subscription,
            accuracy = %options.accuracy,
            distance_m = options.cadence.distance_interval_m,
            interval_secs = options.cadence.time_interval.as_secs(),
            "Subscription opened"
        );
        self.subscription = Some(subscription);
        Ok(())
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
            tracing::debug!(%subscription, "Subscription released");
        }
        self.generation += 1;
    }

    fn fail<T>(&mut self, error: TrackingError) -> Result<T, TrackingError> {
        tracing::warn!(error = %error, state = %self.state, "Tracking operation failed");
        self.error_msg = Some(error.to_string());
        Err(error)
    }
}
