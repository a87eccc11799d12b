//! Core types for the filescope file-analysis orchestration layer.
//!
//! This crate provides the vocabulary shared by the orchestration layer,
//! extraction engines and log consumers:
//!
//! - **Types**: [`FileRecord`], the engine's [`FileView`], lifecycle
//!   [`Signal`]s, [`Connection`]s and [`AnalyzerRequest`]s
//! - **Errors**: [`FilesError`] with non-fatal failure semantics
//! - **Handles**: [`HandleHasher`] turning protocol handles into file ids
//!
//! # Example
//!
//! ```rust,ignore
//! use filescope_core::{FileRecord, Fuid};
//!
//! fn summarize(rec: &FileRecord) {
//!     println!("{} {:?} {} bytes", rec.fuid, rec.mime_type, rec.seen_bytes);
//! }
//! ```

mod error;
pub mod handle;
pub mod types;

pub use error::{FilesError, Result};
pub use handle::{HandleHasher, DEFAULT_SALT};
pub use types::*;
