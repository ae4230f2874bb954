//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::settings::*;
use crate::tracking::TrackingSettings;

// =============================================================================
// Engine defaults
// =============================================================================

/// Battery poll interval in seconds (default: 60)
pub const DEFAULT_BATTERY_POLL_INTERVAL_SECS: u64 = 60;

/// Stationary quiet period in seconds (default: 600 = 10 minutes)
pub const DEFAULT_STATIONARY_QUIET_SECS: u64 = 600;

/// Consecutive provider errors before re-attaching (default: 3)
pub const DEFAULT_PROVIDER_ERROR_THRESHOLD: u32 = 3;

/// Maximum re-attach backoff in seconds (default: 300 = 5 minutes)
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;

/// Status log interval in seconds (default: 30)
pub const DEFAULT_STATUS_LOG_INTERVAL_SECS: u64 = 30;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings::default(),
            engine: EngineSettings {
                battery_poll_interval_secs: DEFAULT_BATTERY_POLL_INTERVAL_SECS,
                stationary_quiet_secs: DEFAULT_STATIONARY_QUIET_SECS,
                provider_error_threshold: DEFAULT_PROVIDER_ERROR_THRESHOLD,
                max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
                status_log_interval_secs: DEFAULT_STATUS_LOG_INTERVAL_SECS,
            },
            logging: LoggingSettings {
                file: crate::logging::default_log_dir().join(crate::logging::default_log_file()),
            },
        }
    }
}
