//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. The
//! `[tracking]` section maps directly onto [`TrackingSettings`].

use std::path::PathBuf;
use std::time::Duration;

use crate::tracking::{ControllerConfig, ServiceConfig, TrackingSettings};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// User-facing tracking settings
    pub tracking: TrackingSettings,
    /// Engine tuning
    pub engine: EngineSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Seconds between battery level polls.
    pub battery_poll_interval_secs: u64,
    /// Seconds a stationary device skips samples after a report. 0 disables.
    pub stationary_quiet_secs: u64,
    /// Consecutive provider errors before the subscription is re-attached.
    pub provider_error_threshold: u32,
    /// Upper bound for the re-attach backoff, in seconds.
    pub max_backoff_secs: u64,
    /// Seconds between DEBUG status log lines.
    pub status_log_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl EngineSettings {
    /// Build the tracking service configuration.
    pub fn service_config(&self) -> ServiceConfig {
        let stationary_quiet_period = match self.stationary_quiet_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        ServiceConfig {
            controller: ControllerConfig {
                stationary_quiet_period,
            },
            battery_poll_interval: Duration::from_secs(self.battery_poll_interval_secs),
            provider_error_threshold: self.provider_error_threshold,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }

    pub fn status_log_interval(&self) -> Duration {
        Duration::from_secs(self.status_log_interval_secs)
    }
}
