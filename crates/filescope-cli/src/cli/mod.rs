//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the diagnostics filter.
pub const LOG_ENV: &str = "FILESCOPE_LOG";

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Replay(args) => commands::replay::execute(&args),
        Commands::Fuid(args) => commands::fuid::execute(&args),
        Commands::Config(args) => commands::config::execute(&args),
    }
}

/// Diagnostics to stderr. `FILESCOPE_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
