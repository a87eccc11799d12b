//! Command implementations.

pub mod config;
pub mod fuid;
pub mod replay;

use anyhow::{Context as _, Result};
use filescope::FilesConfig;
use std::path::Path;

/// Load the configuration, or the defaults when no path was given.
pub fn load_config(path: Option<&Path>) -> Result<FilesConfig> {
    match path {
        Some(path) => FilesConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(FilesConfig::default()),
    }
}
