//! Waymark - adaptive location tracking engine
//!
//! Decides when to sample a device's position, at what accuracy/power cost,
//! whether the device is moving, which fixes are worth reporting and when a
//! member enters or leaves a saved place.
//!
//! # High-Level API
//!
//! The [`tracking`] module provides the service facade:
//!
//! ```ignore
//! use waymark::config::ConfigFile;
//! use waymark::tracking::{FixedBattery, InMemoryDirectory, ReplayProvider, TrackingService};
//!
//! let config = ConfigFile::load(None)?;
//! let (handle, task) = TrackingService::spawn(
//!     ReplayProvider::new(track),
//!     InMemoryDirectory::with_user("alice"),
//!     FixedBattery::new(None),
//!     config.engine.service_config(),
//! );
//! handle.start_tracking().await?;
//! ```

pub mod config;
pub mod geo;
pub mod logging;
pub mod tracking;

/// Version of the Waymark library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
