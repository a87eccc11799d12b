//! # filescope-cli
//!
//! Command-line front end for the `filescope` orchestration layer.
//!
//! ## Features
//!
//! - **Replay**: feed a JSON-lines signal script through the reference
//!   engine and dispatcher, write the resulting files log
//! - **File ids**: derive the id a salted handle hashes to
//! - **Config**: show the effective configuration as TOML

pub mod cli;
pub mod script;

pub use cli::run;
