//! Waymark CLI - Command-line interface
//!
//! This binary drives the Waymark tracking engine from recorded tracks and
//! manages its configuration file.

mod commands;
mod error;
mod runner;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use waymark::config::ConfigFile;

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "waymark")]
#[command(version = waymark::VERSION)]
#[command(about = "Adaptive location tracking: replay tracks, tune tiers, manage config", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.waymark/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a recorded JSON track through the tracking engine
    Replay(ReplayArgs),

    /// Show the tracking frequency tiers and their battery cost
    Frequencies,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let Cli {
        config,
        debug,
        command,
    } = Cli::parse();
    let config = config.as_deref();

    let result = match command {
        Commands::Replay(args) => run_replay(args, config, debug).await,
        Commands::Frequencies => run_frequencies(config),
        Commands::Config { command } => commands::config::run(command, config),
    };

    if let Err(e) = result {
        e.exit();
    }
}

async fn run_replay(args: ReplayArgs, config: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(config, debug)?;
    commands::replay::run(args, &runner).await
}

fn run_frequencies(config: Option<&Path>) -> Result<(), CliError> {
    let config = ConfigFile::load(config)?;
    commands::frequencies::run(config.tracking.frequency)
}
