//! `filescope fuid` - show the file id a raw handle hashes to.

use anyhow::Result;
use filescope::HandleHasher;
use tracing::warn;

use super::load_config;
use crate::cli::args::FuidArgs;

pub fn execute(args: &FuidArgs) -> Result<()> {
    let salt = match &args.salt {
        Some(salt) => salt.clone(),
        None => load_config(args.config.as_deref())?.salt,
    };
    let hasher = HandleHasher::new(salt);
    if hasher.uses_default_salt() {
        warn!("deriving id with the shipped default salt");
    }

    println!("{}", hasher.fuid_for(&args.handle));
    Ok(())
}
