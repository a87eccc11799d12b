//! Command-line argument definitions using clap.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// File-analysis orchestration from the command line
///
/// Replays lifecycle signal scripts through the dispatcher, derives
/// salted file ids and shows the effective configuration.
///
/// Diagnostics go to stderr; set FILESCOPE_LOG to filter them.
#[derive(Parser, Debug)]
#[command(name = "filescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit diagnostics as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines signal script and write the files log
    Replay(ReplayArgs),

    /// Print the file id a raw handle hashes to
    Fuid(FuidArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Script to replay, one JSON step per line (`-` for stdin)
    pub script: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, env = "FILESCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the files log here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Make the engine refuse this analyzer (repeatable)
    #[arg(long = "reject", value_name = "NAME")]
    pub reject: Vec<String>,

    /// Clock at the start of the script (RFC 3339; defaults to now)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct FuidArgs {
    /// Raw file handle
    #[arg(long)]
    pub handle: String,

    /// Salt (defaults to the configured one)
    #[arg(long)]
    pub salt: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "FILESCOPE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "FILESCOPE_CONFIG")]
    pub config: Option<PathBuf>,
}
