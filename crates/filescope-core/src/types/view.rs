use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Fuid;

/// The extraction engine's current view of a file.
///
/// Delivered with every lifecycle signal. Byte counters are always
/// reported; the optional fields are only present once the engine knows
/// them (a MIME type, for example, appears only after sniffing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileView {
    /// Engine-assigned file identifier
    pub id: Fuid,

    /// Last time the engine saw activity on the file
    pub last_active: DateTime<Utc>,

    /// Container file this one was extracted from
    #[serde(default)]
    pub parent_id: Option<Fuid>,

    /// Protocol or input channel that produced the file
    #[serde(default)]
    pub source: Option<String>,

    /// Nesting depth relative to the source container
    #[serde(default)]
    pub depth: Option<u32>,

    /// Whether the file was sent by the connection originator
    #[serde(default)]
    pub is_orig: Option<bool>,

    /// Bytes delivered so far
    #[serde(default)]
    pub seen_bytes: u64,

    /// Total size, once the source has announced it
    #[serde(default)]
    pub total_bytes: Option<u64>,

    /// Bytes that will never arrive
    #[serde(default)]
    pub missing_bytes: u64,

    /// Bytes delivered out of order after the reassembly buffer overflowed
    #[serde(default)]
    pub overflow_bytes: u64,

    /// Sniffed content type
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl FileView {
    /// A view with nothing known beyond the id and the activity time.
    pub const fn new(id: Fuid, last_active: DateTime<Utc>) -> Self {
        Self {
            id,
            last_active,
            parent_id: None,
            source: None,
            depth: None,
            is_orig: None,
            seen_bytes: 0,
            total_bytes: None,
            missing_bytes: 0,
            overflow_bytes: 0,
            mime_type: None,
        }
    }

    /// Set the source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the seen byte count.
    #[must_use]
    pub const fn with_seen_bytes(mut self, seen: u64) -> Self {
        self.seen_bytes = seen;
        self
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }
}
