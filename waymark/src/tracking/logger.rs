//! Periodic status logging daemon.
//!
//! Logs the tracking status at DEBUG level at a fixed interval, useful when
//! tuning tiers against a recorded track.
//!
//! # Output Format
//!
//! - `state` - session state
//! - `lat`, `lon` - last reported position in decimal degrees
//! - `battery` - last battery reading
//! - `drain` - observed battery drain per day, once known
//! - `moving` - movement classification
//! - `error` - last recorded error, if any

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::service::TrackingHandle;
use super::state::TrackingStatus;

/// Default logging interval (30 seconds).
pub const DEFAULT_STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Spawns a background task that periodically logs tracking status.
///
/// The caller should check if DEBUG logging is enabled before spawning:
///
/// ```ignore
/// if tracing::enabled!(tracing::Level::DEBUG) {
///     spawn_status_logger(handle.clone(), cancel, DEFAULT_STATUS_LOG_INTERVAL);
/// }
/// ```
pub fn spawn_status_logger(
    handle: TrackingHandle,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    log_status(&handle.status());
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Status logger stopped");
                    break;
                }
            }
        }
    })
}

fn log_status(status: &TrackingStatus) {
    let battery = status
        .battery_level
        .map_or_else(|| "unknown".to_string(), |b| b.to_string());
    let drain = status
        .daily_battery_usage
        .map_or_else(|| "unknown".to_string(), |d| format!("{:.1}%/day", d));

    if let Some(update) = &status.last_update {
        tracing::debug!(
            state = %status.state,
            lat = format!("{:.5}", update.latitude),
            lon = format!("{:.5}", update.longitude),
            battery = %battery,
            drain = %drain,
            moving = status.is_moving,
            error = ?status.error_msg,
            "Tracking status"
        );
    } else {
        tracing::debug!(
            state = %status.state,
            battery = %battery,
            drain = %drain,
            error = ?status.error_msg,
            "Tracking status (no position reported)"
        );
    }
}
