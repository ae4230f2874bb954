//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use waymark::config::ConfigFileError;
use waymark::tracking::TrackingError;

/// JSON inputs the CLI reads, for error hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Track,
    Places,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Track => write!(f, "track"),
            InputKind::Places => write!(f, "places"),
        }
    }
}

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read an input file
    FileRead {
        path: PathBuf,
        error: std::io::Error,
    },
    /// Input file is not valid JSON for what it should contain
    InvalidInput {
        kind: InputKind,
        path: PathBuf,
        error: serde_json::Error,
    },
    /// The tracking engine refused or failed an operation
    Tracking(TrackingError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::InvalidInput { kind, .. } => {
                eprintln!();
                for line in input_hint(*kind) {
                    eprintln!("{}", line);
                }
            }
            CliError::Tracking(TrackingError::PrivacyMode) => {
                eprintln!();
                eprintln!("Privacy mode is on. Turn it off in the [tracking] section of:");
                eprintln!("  {}", waymark::config::config_file_path().display());
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::InvalidInput { kind, path, error } => {
                write!(f, "Invalid {} file '{}': {}", kind, path.display(), error)
            }
            CliError::Tracking(e) => write!(f, "Tracking failed: {}", e),
        }
    }
}

/// Expected format of each input file.
fn input_hint(kind: InputKind) -> &'static [&'static str] {
    match kind {
        InputKind::Track => &[
            "A track file is a JSON array whose entries are either",
            r#"  {"latitude": 51.5, "longitude": -0.12, "timestamp": "2024-05-01T12:00:00Z"}"#,
            "or a simulated provider failure:",
            r#"  {"error": "no fix"}"#,
        ],
        InputKind::Places => &[
            "A places file is a JSON array of saved places:",
            r#"  {"id": "home", "name": "Home", "latitude": 51.5, "longitude": -0.12, "radius": 100}"#,
        ],
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::FileRead { error, .. } => Some(error),
            CliError::InvalidInput { error, .. } => Some(error),
            CliError::Tracking(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<TrackingError> for CliError {
    fn from(e: TrackingError) -> Self {
        CliError::Tracking(e)
    }
}
