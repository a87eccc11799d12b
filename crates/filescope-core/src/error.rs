use thiserror::Error;

use crate::types::Fuid;

/// Result type alias for file-analysis operations
pub type Result<T> = std::result::Result<T, FilesError>;

/// Errors that can occur while orchestrating file analysis
///
/// None of these are fatal: the worst outcome is that one file's analysis
/// is incomplete.
#[derive(Error, Debug)]
pub enum FilesError {
    /// The file has no active record (never seen or already removed)
    #[error("file {fuid} is not active")]
    InactiveFile {
        /// File the operation was addressed to
        fuid: Fuid,
    },

    /// The engine refused to attach an analyzer
    #[error("failed to add {analyzer} analyzer for file {fuid}")]
    AnalyzerRejected {
        /// File the analyzer was requested for
        fuid: Fuid,
        /// Canonical analyzer name
        analyzer: String,
    },

    /// The engine could not detach an analyzer
    #[error("failed to remove {analyzer} analyzer for file {fuid}")]
    AnalyzerNotRemoved {
        /// File the analyzer was attached to
        fuid: Fuid,
        /// Canonical analyzer name
        analyzer: String,
    },

    /// The signal pump task is gone
    #[error("signal pump closed")]
    PumpClosed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The files log could not be written
    #[error("log sink error: {0}")]
    Sink(String),

    /// A replay script line could not be interpreted
    #[error("script line {line}: {message}")]
    Script {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilesError {
    /// Returns true if the file was simply no longer there
    #[must_use]
    pub const fn is_inactive_file(&self) -> bool {
        matches!(self, Self::InactiveFile { .. })
    }

    /// Returns true if callers should treat the error as a no-op
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        self.is_inactive_file()
    }

    /// The file the error concerns, if any
    #[must_use]
    pub const fn fuid(&self) -> Option<&Fuid> {
        match self {
            Self::InactiveFile { fuid }
            | Self::AnalyzerRejected { fuid, .. }
            | Self::AnalyzerNotRemoved { fuid, .. } => Some(fuid),
            _ => None,
        }
    }
}
