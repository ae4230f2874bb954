//! Locating, reading and creating `~/.waymark/config.ini`.
//!
//! A missing file is not an error: every command runs on defaults until
//! `waymark config init` writes the commented template from
//! [`super::writer`]. Values are validated by [`super::parser`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: ini::Error },

    /// Creating the parent directory or writing the file failed
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load `path`, or `~/.waymark/config.ini` when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        Self::load_from(&resolve_path(path))
    }

    /// Load a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        super::parser::parse_ini(&ini)
    }

    /// Render the configuration as the commented INI template.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Write this configuration to `path`, creating missing directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let write_error = |source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(write_error)
    }

    /// Write the defaults to `path` unless a file is already there.
    ///
    /// Returns true when the file was created.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().write_to(path)?;
        Ok(true)
    }
}

/// `path` when given, otherwise the default config file.
pub fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(config_file_path, Path::to_path_buf)
}

/// `~/.waymark/config.ini`, relative to the working directory without a home.
pub fn config_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".waymark")
        .join("config.ini")
}
