use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::common::Fuid;

/// Tag identifying a kind of file analyzer.
///
/// Wraps the analyzer's canonical name (`MD5`, `EXTRACT`, ...). The tag is
/// rendered as `ANALYZER_<NAME>`, the form protocol scripts refer to it by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyzerKind(Cow<'static, str>);

impl AnalyzerKind {
    /// MD5 content hash
    pub const MD5: Self = Self(Cow::Borrowed("MD5"));
    /// SHA-1 content hash
    pub const SHA1: Self = Self(Cow::Borrowed("SHA1"));
    /// SHA-256 content hash
    pub const SHA256: Self = Self(Cow::Borrowed("SHA256"));
    /// Write file content to disk
    pub const EXTRACT: Self = Self(Cow::Borrowed("EXTRACT"));
    /// Deliver content chunks/streams to script hooks
    pub const DATA_EVENT: Self = Self(Cow::Borrowed("DATA_EVENT"));

    /// Tag for an analyzer by name. Accepts either `md5` or `ANALYZER_MD5`.
    pub fn new(name: &str) -> Self {
        let name = name.strip_prefix("ANALYZER_").unwrap_or(name);
        Self(Cow::Owned(name.to_ascii_uppercase()))
    }

    /// Canonical analyzer name without the tag prefix
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ANALYZER_{}", self.0)
    }
}

impl std::str::FromStr for AnalyzerKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Chunk-wise content delivery: `(file, data, offset)`.
pub type ChunkHook = Arc<dyn Fn(&Fuid, &[u8], u64) + Send + Sync>;

/// Stream-wise content delivery: `(file, data)`.
pub type StreamHook = Arc<dyn Fn(&Fuid, &[u8]) + Send + Sync>;

/// A request to attach (or detach) one analyzer to a file.
///
/// Built by the caller, possibly rewritten by the analyzer's pre-attach
/// callback, then handed to the engine. Not retained afterwards.
#[derive(Clone)]
pub struct AnalyzerRequest {
    /// Which analyzer
    pub kind: AnalyzerKind,

    /// Optional chunk-wise content hook
    pub chunk_hook: Option<ChunkHook>,

    /// Optional stream-wise content hook
    pub stream_hook: Option<StreamHook>,

    /// Analyzer-specific arguments (e.g. `extract_filename`)
    pub params: BTreeMap<String, String>,
}

impl AnalyzerRequest {
    /// Request with no hooks and no arguments
    pub const fn new(kind: AnalyzerKind) -> Self {
        Self {
            kind,
            chunk_hook: None,
            stream_hook: None,
            params: BTreeMap::new(),
        }
    }

    /// Attach a chunk-wise content hook.
    #[must_use]
    pub fn with_chunk_hook(mut self, hook: ChunkHook) -> Self {
        self.chunk_hook = Some(hook);
        self
    }

    /// Attach a stream-wise content hook.
    #[must_use]
    pub fn with_stream_hook(mut self, hook: StreamHook) -> Self {
        self.stream_hook = Some(hook);
        self
    }

    /// Set an analyzer argument.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up an analyzer argument
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl From<AnalyzerKind> for AnalyzerRequest {
    fn from(kind: AnalyzerKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Debug for AnalyzerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRequest")
            .field("kind", &self.kind)
            .field("chunk_hook", &self.chunk_hook.is_some())
            .field("stream_hook", &self.stream_hook.is_some())
            .field("params", &self.params)
            .finish()
    }
}
