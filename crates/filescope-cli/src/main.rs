//! filescope - file-analysis orchestration from the command line
//!
//! Replays signal scripts through the dispatcher and writes the files log.

use anyhow::Result;

fn main() -> Result<()> {
    filescope_cli::run()
}
