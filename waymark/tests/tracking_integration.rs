//! Integration tests for the tracking engine.
//!
//! These tests drive the public service facade end to end:
//! - Recorded track → ReplayProvider → TrackingService → InMemoryDirectory
//! - Significance filtering against the last reported location
//! - Privacy mode suspending and resuming a live session
//! - Geofence evaluation and place transitions
//! - Provider error recovery and foreground refresh
//! - Config file → ServiceConfig wiring
//!
//! Run with: `cargo test --test tracking_integration`

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use waymark::config::ConfigFile;
use waymark::geo::{Coordinate, Place, METERS_PER_DEGREE};
use waymark::tracking::geofence;
use waymark::tracking::{
    AppState, BatteryLevel, Directory, FixedBattery, InMemoryDirectory, PositionSample,
    ReplayProvider, ReplayStep, ServiceConfig, TrackingFrequency, TrackingHandle, TrackingService,
    TrackingSettings, TrackingState, TransitionKind,
};

// ============================================================================
// Test Helpers
// ============================================================================

const PACE: Duration = Duration::from_secs(1);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Sample `north_m` meters north of (0,0), `secs` after t0, moving at 2 m/s.
fn moving_sample(north_m: f64, secs: i64) -> PositionSample {
    PositionSample::new(north_m / METERS_PER_DEGREE, 0.0, t0() + chrono::Duration::seconds(secs))
        .with_speed(2.0)
}

/// Spawn a service over `provider` for member "alice" at 80% battery.
fn spawn_service(
    provider: ReplayProvider,
    directory: InMemoryDirectory,
) -> (TrackingHandle, tokio::task::JoinHandle<()>) {
    TrackingService::spawn(
        provider,
        directory,
        FixedBattery::new(Some(BatteryLevel::new(80))),
        ServiceConfig::default(),
    )
}

fn alice() -> InMemoryDirectory {
    let directory = InMemoryDirectory::with_user("alice");
    directory.set_settings(TrackingSettings {
        frequency: TrackingFrequency::Medium,
        ..TrackingSettings::default()
    });
    directory
}

// ============================================================================
// Significance Filtering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_fix_is_reported_and_becomes_reference() {
    let directory = alice();
    assert!(directory.last_reported_location().is_none());

    let provider = ReplayProvider::new(vec![moving_sample(0.0, 0)]).with_pace(PACE);
    let (handle, _task) = spawn_service(provider, directory.clone());

    handle.start_tracking().await.unwrap();
    tokio::time::sleep(PACE * 3).await;

    let locations = directory.locations();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].member_id, "alice");
    assert_eq!(locations[0].battery, Some(80));
    assert_eq!(directory.last_reported_location(), Some(Coordinate::new(0.0, 0.0)));
}

#[tokio::test(start_paused = true)]
async fn test_short_hop_filtered_then_longer_hop_reported() {
    let directory = alice();
    let provider = ReplayProvider::new(vec![
        moving_sample(0.0, 0),
        // 15m: under the 20m medium interval
        moving_sample(15.0, 10),
        // 25m from the reference, which is still the first fix
        moving_sample(25.0, 20),
    ])
    .with_pace(PACE);
    let (handle, _task) = spawn_service(provider, directory.clone());
    let mut reports = handle.subscribe_reports();

    handle.start_tracking().await.unwrap();

    let first = reports.recv().await.unwrap();
    assert_eq!(first.update.latitude, 0.0);

    // Second step has landed (t=2s), third has not (t=3s)
    tokio::time::sleep(PACE + PACE / 2).await;
    assert_eq!(directory.locations().len(), 1);
    assert_eq!(directory.last_reported_location(), Some(Coordinate::new(0.0, 0.0)));

    let second = reports.recv().await.unwrap();
    assert!((second.update.latitude - 25.0 / METERS_PER_DEGREE).abs() < 1e-12);
    assert_eq!(directory.locations().len(), 2);
    assert_eq!(
        directory.last_reported_location(),
        Some(second.update.coordinate())
    );
    assert!(handle.status().is_moving);
}

// ============================================================================
// Privacy Mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_privacy_mode_suspends_and_resumes_live_session() {
    let directory = alice();
    let track: Vec<_> = (0..10).map(|i| moving_sample(i as f64 * 100.0, i * 10)).collect();
    let provider = ReplayProvider::new(track).with_pace(PACE);
    let (handle, _task) = spawn_service(provider.clone(), directory.clone());

    handle.start_tracking().await.unwrap();
    tokio::time::sleep(PACE * 2 + PACE / 2).await;
    let before = directory.locations().len();
    assert_eq!(before, 2);

    let private = TrackingSettings {
        privacy_mode: true,
        ..directory.settings()
    };
    handle.update_settings(private.clone()).await.unwrap();

    let status = handle.status();
    assert!(!status.is_tracking);
    assert_eq!(status.state, TrackingState::Suspended);

    tokio::time::sleep(PACE * 5).await;
    assert_eq!(directory.locations().len(), before);
    assert!(handle.get_one_time_location().await.is_err());

    let public = TrackingSettings {
        privacy_mode: false,
        ..private
    };
    handle.update_settings(public).await.unwrap();
    assert!(handle.status().is_tracking);

    tokio::time::sleep(PACE * 2 + PACE / 2).await;
    assert!(directory.locations().len() > before);
    assert_eq!(provider.log().watches.len(), 2);
}

// ============================================================================
// Geofences
// ============================================================================

#[test]
fn test_point_80m_from_center_is_inside() {
    let place = Place::new("park", "Park", 10.0, 10.0, 100.0);
    // ~80m north along the meridian (great-circle degree ≈ 111.195km)
    let point = Coordinate::new(10.0 + 80.0 / 111_195.0, 10.0);

    let memberships = geofence::evaluate(point, &[place]);

    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].place_id, "park");
    assert!(memberships[0].inside);
}

#[tokio::test(start_paused = true)]
async fn test_session_records_place_transitions() {
    let directory = alice();
    directory.set_places(vec![Place::new("home", "Home", 0.0, 0.0, 100.0)]);

    let provider = ReplayProvider::new(vec![
        moving_sample(0.0, 0),
        moving_sample(50.0, 30),
        moving_sample(500.0, 300),
    ])
    .with_pace(PACE);
    let (handle, _task) = spawn_service(provider, directory.clone());

    handle.start_tracking().await.unwrap();
    tokio::time::sleep(PACE * 5).await;

    let transitions = directory.transitions();
    let kinds: Vec<_> = transitions.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransitionKind::Entered, TransitionKind::Exited]);
    assert!(transitions.iter().all(|t| t.place_id == "home"));
    assert_eq!(directory.locations().len(), 3);
}

// ============================================================================
// Provider Errors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fix_after_errors_clears_error_without_reattach() {
    let fail = || ReplayStep::Fail {
        error: "no fix".into(),
    };
    let provider = ReplayProvider::from_steps(vec![
        moving_sample(0.0, 0).into(),
        fail(),
        fail(),
        fail(),
        moving_sample(100.0, 60).into(),
    ])
    .with_pace(PACE);
    let directory = alice();
    let (handle, _task) = spawn_service(provider.clone(), directory.clone());

    handle.start_tracking().await.unwrap();

    // Steps land at t=1..5s
    tokio::time::sleep(PACE * 4 + PACE / 2).await;
    assert_eq!(
        handle.status().error_msg.as_deref(),
        Some("Location provider error: no fix")
    );

    tokio::time::sleep(PACE).await;
    assert!(handle.status().error_msg.is_none());

    // The armed re-attach (8s backoff) was disarmed by the good fix
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(provider.log().watches.len(), 1);
    assert_eq!(directory.locations().len(), 2);
}

// ============================================================================
// App State
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_foreground_return_refreshes_location() {
    let directory = alice();
    let provider = ReplayProvider::new(vec![moving_sample(0.0, 0)]).with_pace(Duration::from_secs(3600));
    let (handle, _task) = spawn_service(provider.clone(), directory.clone());

    handle.start_tracking().await.unwrap();
    handle.set_app_state(AppState::Background).await.unwrap();
    assert!(directory.locations().is_empty());

    handle.set_app_state(AppState::Active).await.unwrap();

    let log = provider.log();
    assert_eq!(log.one_shots.len(), 1);
    assert_eq!(directory.locations().len(), 1);

    // Background degraded accuracy one tier, foreground restored it
    let accuracies: Vec<_> = log.watches.iter().map(|w| w.accuracy).collect();
    assert_eq!(accuracies.first(), accuracies.last());
    assert!(accuracies.iter().any(|a| *a < accuracies[0]));
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_service() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.ini");
    std::fs::write(
        &path,
        "[tracking]\nfrequency = high\n\n[engine]\nbattery_poll_interval_secs = 5\nstationary_quiet_secs = 0\n",
    )
    .unwrap();

    let config = ConfigFile::load_from(&path).unwrap();
    let service_config = config.engine.service_config();
    assert_eq!(service_config.battery_poll_interval, Duration::from_secs(5));
    assert!(service_config.controller.stationary_quiet_period.is_none());

    let directory = InMemoryDirectory::with_user("alice");
    directory.set_settings(config.tracking.clone());
    let battery = FixedBattery::new(Some(BatteryLevel::new(90)));
    let (handle, _task) = TrackingService::spawn(
        ReplayProvider::new(vec![]),
        directory.clone(),
        battery.clone(),
        service_config,
    );

    handle.start_tracking().await.unwrap();
    battery.set(Some(BatteryLevel::new(89)));
    tokio::time::sleep(Duration::from_secs(6)).await;

    // Initial reading plus one poll at the configured 5s interval
    assert_eq!(directory.battery_reports().len(), 2);
    assert_eq!(handle.status().battery_level, Some(BatteryLevel::new(89)));
}
