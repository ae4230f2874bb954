//! User configuration stored in `~/.waymark/config.ini`.
//!
//! # Example
//!
//! ```no_run
//! use waymark::config::ConfigFile;
//!
//! let config = ConfigFile::load(None)?;
//! let service_config = config.engine.service_config();
//! println!("Tracking at {}", config.tracking.frequency);
//! # Ok::<(), waymark::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_file_path, resolve_path, ConfigFileError};
pub use settings::{ConfigFile, EngineSettings, LoggingSettings};
