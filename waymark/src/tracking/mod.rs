//! Adaptive location tracking.
//!
//! Decides when to sample the device position, at what accuracy/power cost,
//! whether the device is moving, which fixes are worth reporting and when a
//! member crosses a saved place boundary.
//!
//! # Architecture
//!
//! ```text
//! LocationProvider ──samples──► TrackingService (single task)
//!                                     │
//!                                     ▼
//!                             TrackingController
//!                     ┌───────────────┼────────────────┐
//!                     ▼               ▼                ▼
//!             MovementDetector   significance     GeofenceTracker
//!                                  filter
//!                                     │ accepted
//!                                     ▼
//!                      Directory (LocationUpdate, PlaceTransition)
//! ```
//!
//! The accuracy/power policy turns the frequency tier, battery level and
//! foreground/background state into [`WatchOptions`] for the provider.
//!
//! # Usage
//!
//! ```ignore
//! use waymark::tracking::{
//!     FixedBattery, InMemoryDirectory, ReplayProvider, ServiceConfig, TrackingService,
//! };
//!
//! let directory = InMemoryDirectory::with_user("alice");
//! let (handle, task) = TrackingService::spawn(
//!     ReplayProvider::new(track),
//!     directory.clone(),
//!     FixedBattery::new(None),
//!     ServiceConfig::default(),
//! );
//!
//! handle.start_tracking().await?;
//! let mut reports = handle.subscribe_reports();
//! while let Ok(report) = reports.recv().await {
//!     println!("{:?}", report.update);
//! }
//! ```
//!
//! # Components
//!
//! - [`frequency`] - tier table
//! - [`filter`] - significance filter
//! - [`movement`] - moving/stationary classification
//! - [`policy`] - accuracy and cadence selection
//! - [`geofence`] - containment and enter/exit detection
//! - [`controller`] - session state machine
//! - [`service`] - async driver and [`TrackingHandle`]

mod battery;
pub mod controller;
mod directory;
mod error;
pub mod filter;
mod frequency;
pub mod geofence;
mod logger;
pub mod movement;
pub mod policy;
mod provider;
mod replay;
pub mod service;
mod state;

pub use battery::{BatterySource, BatteryUsageTracker, FixedBattery};
pub use controller::{ControllerConfig, Report, SampleOutcome, TrackingController};
pub use directory::{BatteryReport, Directory, InMemoryDirectory};
pub use error::{ProviderError, TrackingError};
pub use frequency::{ParseFrequencyError, TrackingConfig, TrackingFrequency};
pub use geofence::{GeofenceTracker, PlaceMembership};
pub use logger::{spawn_status_logger, DEFAULT_STATUS_LOG_INTERVAL};
pub use movement::{MovementDetector, MovementState};
pub use policy::{AccuracyTier, Cadence, WatchOptions};
pub use provider::{
    Generation, LocationProvider, PermissionStatus, SampleSink, SessionEvent, Subscription,
};
pub use replay::{ReplayLog, ReplayProvider, ReplayStep};
pub use service::{ServiceConfig, TrackingHandle, TrackingService};
pub use state::{
    AppState, BatteryLevel, LocationUpdate, MemberId, PlaceId, PlaceTransition, PositionSample,
    TrackingSettings, TrackingState, TrackingStatus, TransitionKind, MOVING_SPEED_THRESHOLD_MPS,
};
