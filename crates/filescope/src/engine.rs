//! The seam to the extraction engine.
//!
//! The engine reassembles file content, tracks byte counts and
//! inactivity, and raises lifecycle signals. This layer only asks it to
//! do things through the primitives below; each returns whether the
//! engine accepted the request.

use chrono::Duration;
use filescope_core::{AnalyzerKind, AnalyzerRequest, Fuid};

/// Primitives the orchestration layer needs from an extraction engine.
pub trait Engine {
    /// Change the file's inactivity timeout interval.
    ///
    /// Called while the file's timeout is being handled, the deadline is
    /// reset to `now + interval` instead of the file being removed.
    fn set_timeout_interval(&mut self, fuid: &Fuid, interval: Duration) -> bool;

    /// Attach an analyzer to the file's content stream.
    fn attach_analyzer(&mut self, fuid: &Fuid, request: &AnalyzerRequest) -> bool;

    /// Detach a previously attached analyzer.
    fn detach_analyzer(&mut self, fuid: &Fuid, request: &AnalyzerRequest) -> bool;

    /// Ignore all further content for the file.
    fn stop_analysis(&mut self, fuid: &Fuid) -> bool;

    /// Name recorded for an analyzer kind.
    fn analyzer_name(&self, kind: &AnalyzerKind) -> String {
        kind.canonical_name().to_string()
    }

    /// Answer to a file-handle request: the raw, unsalted handle.
    fn set_file_handle(&mut self, handle: String);
}
