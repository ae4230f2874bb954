//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let tracking = &config.tracking;
    let engine = &config.engine;

    format!(
        r#"[tracking]
; Tracking frequency tier (default: medium):
;   high            - 10m / 30s, best accuracy (~3.2% battery per day)
;   medium          - 20m / 1min, balanced (~1.5% per day)
;   low             - 30m / 5min (~0.6% per day)
;   battery-saver   - 50m / 15min (~0.2% per day)
;   ultra-efficient - 100m / 30min, significant changes only (~0.08% per day)
frequency = {}
; Stop sampling and reporting entirely (default: false)
privacy_mode = {}
; Require 3x the distance before reporting while stationary (default: true)
pause_when_stationary = {}
; Request one accuracy tier lower while in the background (default: true)
reduced_accuracy_when_background = {}

[engine]
; Seconds between battery level polls (default: 60)
battery_poll_interval_secs = {}
; Seconds a parked device skips samples after reporting; 0 disables (default: 600)
stationary_quiet_secs = {}
; Consecutive location errors before re-attaching the subscription (default: 3)
provider_error_threshold = {}
; Maximum backoff in seconds between re-attach attempts (default: 300)
max_backoff_secs = {}
; Seconds between status lines when debug logging is on (default: 30)
status_log_interval_secs = {}

[logging]
; Log file path (default: ~/.waymark/logs/waymark.log)
file = {}
"#,
        tracking.frequency,
        tracking.privacy_mode,
        tracking.pause_when_stationary,
        tracking.reduced_accuracy_when_background,
        engine.battery_poll_interval_secs,
        engine.stationary_quiet_secs,
        engine.provider_error_threshold,
        engine.max_backoff_secs,
        engine.status_log_interval_secs,
        path_to_string(&config.logging.file),
    )
}

/// Display a path with the home directory collapsed to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
