use serde::{Deserialize, Serialize};

use super::common::Connection;
use super::view::FileView;

/// Lifecycle signals raised by the extraction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// A file id was seen for the first time
    New(FileView),

    /// The file was seen on another connection
    OverNewConnection {
        file: FileView,
        conn: Connection,
        is_orig: bool,
    },

    /// The file went inactive for longer than its timeout interval
    Timeout(FileView),

    /// The engine is discarding all state for the file
    StateRemove(FileView),
}

impl Signal {
    /// Which lifecycle transition this is
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::New(_) => SignalKind::New,
            Self::OverNewConnection { .. } => SignalKind::OverNewConnection,
            Self::Timeout(_) => SignalKind::Timeout,
            Self::StateRemove(_) => SignalKind::StateRemove,
        }
    }

    /// The engine view carried by the signal
    #[must_use]
    pub const fn file(&self) -> &FileView {
        match self {
            Self::New(f)
            | Self::Timeout(f)
            | Self::StateRemove(f)
            | Self::OverNewConnection { file: f, .. } => f,
        }
    }
}

/// Discriminant of [`Signal`], used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    New,
    OverNewConnection,
    Timeout,
    StateRemove,
}

impl SignalKind {
    /// All kinds, in lifecycle order
    pub const ALL: [Self; 4] = [
        Self::New,
        Self::OverNewConnection,
        Self::Timeout,
        Self::StateRemove,
    ];
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "file_new"),
            Self::OverNewConnection => write!(f, "file_over_new_connection"),
            Self::Timeout => write!(f, "file_timeout"),
            Self::StateRemove => write!(f, "file_state_remove"),
        }
    }
}
