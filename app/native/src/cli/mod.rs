//! CLI module for Muscle.
//!
//! `muscle run` (or no subcommand) starts the engine. Every other command
//! either talks to a running engine over the control socket or works on
//! the window manager and the store directly.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_LOG_FILTER;
use crate::error::MuscleError;

/// Filter used with `--verbose` when `RUST_LOG` is unset.
const VERBOSE_LOG_FILTER: &str = "muscle=debug,muscle_lib=debug";

/// Runs the CLI.
///
/// Parses command-line arguments, sets up logging and executes the
/// appropriate command.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), MuscleError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.execute()
}

/// Logs to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { VERBOSE_LOG_FILTER } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
