//! `filescope config` - print the effective configuration.

use anyhow::Result;

use super::load_config;
use crate::cli::args::ConfigArgs;

pub fn execute(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
