//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`frequencies`] - Tracking tier table
//! - [`replay`] - Play a recorded track through the engine

pub mod config;
pub mod frequencies;
pub mod replay;
