//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::tracking::TrackingFrequency;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("frequency") {
            config.tracking.frequency =
                TrackingFrequency::from_str(v).map_err(|_| ConfigFileError::InvalidValue {
                    section: "tracking".to_string(),
                    key: "frequency".to_string(),
                    value: v.to_string(),
                    reason: "must be one of: high, medium, low, battery-saver, ultra-efficient"
                        .to_string(),
                })?;
        }
        if let Some(v) = section.get("privacy_mode") {
            config.tracking.privacy_mode = parse_bool(v);
        }
        if let Some(v) = section.get("pause_when_stationary") {
            config.tracking.pause_when_stationary = parse_bool(v);
        }
        if let Some(v) = section.get("reduced_accuracy_when_background") {
            config.tracking.reduced_accuracy_when_background = parse_bool(v);
        }
    }

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        let engine = &mut config.engine;
        if let Some(v) = parse_number::<u64>(section, "engine", "battery_poll_interval_secs")? {
            if v == 0 {
                return Err(invalid("engine", "battery_poll_interval_secs", "0", "must be at least 1"));
            }
            engine.battery_poll_interval_secs = v;
        }
        if let Some(v) = parse_number::<u64>(section, "engine", "stationary_quiet_secs")? {
            engine.stationary_quiet_secs = v;
        }
        if let Some(v) = parse_number::<u32>(section, "engine", "provider_error_threshold")? {
            if v == 0 {
                return Err(invalid("engine", "provider_error_threshold", "0", "must be at least 1"));
            }
            engine.provider_error_threshold = v;
        }
        if let Some(v) = parse_number::<u64>(section, "engine", "max_backoff_secs")? {
            engine.max_backoff_secs = v;
        }
        if let Some(v) = parse_number::<u64>(section, "engine", "status_log_interval_secs")? {
            if v == 0 {
                return Err(invalid("engine", "status_log_interval_secs", "0", "must be at least 1"));
            }
            engine.status_log_interval_secs = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse an optional non-negative integer key.
fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, "must be a non-negative integer")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a boolean value from INI (accepts true/false, 1/0, yes/no, on/off).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
