//! Analyzer attach/detach, stop and timeout extension.
//!
//! Every operation is addressed by file id and fails with
//! [`FilesError::InactiveFile`] when the file has no active record;
//! callers treat that as "file already gone".

use chrono::Duration;
use filescope_core::{AnalyzerKind, AnalyzerRequest, Connection, FilesError, Fuid, Result};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::session::Session;

impl<E: Engine> Session<E> {
    /// Attach an analyzer to a file.
    ///
    /// The analyzer name is added to the record's `analyzers` before the
    /// engine is asked, so the log shows what was requested even when the
    /// attach fails. The kind's pre-attach callback, if any, may rewrite
    /// the request first.
    pub fn add_analyzer(&mut self, fuid: &Fuid, mut request: AnalyzerRequest) -> Result<()> {
        let name = self.engine.analyzer_name(&request.kind);
        let Some(record) = self.tracker.get_mut(fuid) else {
            return Err(FilesError::InactiveFile { fuid: fuid.clone() });
        };
        record.analyzers.insert(name.clone());
        self.callbacks.run(record, &mut request);

        if self.engine.attach_analyzer(fuid, &request) {
            debug!(fuid = %fuid, analyzer = %name, "analyzer added");
            Ok(())
        } else {
            warn!(fuid = %fuid, analyzer = %name, "failed to add analyzer");
            Err(FilesError::AnalyzerRejected {
                fuid: fuid.clone(),
                analyzer: name,
            })
        }
    }

    /// Detach an analyzer. The name stays in `analyzers`, which records
    /// everything ever requested.
    pub fn remove_analyzer(&mut self, fuid: &Fuid, request: &AnalyzerRequest) -> Result<()> {
        self.active_record(fuid)?;
        if self.engine.detach_analyzer(fuid, request) {
            debug!(fuid = %fuid, analyzer = %request.kind, "analyzer removed");
            Ok(())
        } else {
            Err(FilesError::AnalyzerNotRemoved {
                fuid: fuid.clone(),
                analyzer: self.engine.analyzer_name(&request.kind),
            })
        }
    }

    /// Ask the engine to ignore all further content for the file.
    pub fn stop(&mut self, fuid: &Fuid) -> Result<()> {
        self.active_record(fuid)?;
        if self.engine.stop_analysis(fuid) {
            debug!(fuid = %fuid, "analysis stopped");
            Ok(())
        } else {
            Err(FilesError::InactiveFile { fuid: fuid.clone() })
        }
    }

    /// Push the file's inactivity deadline to `now + interval`.
    ///
    /// Only meaningful from a timeout handler: the engine then keeps the
    /// file instead of removing it. The deadline is replaced, not extended
    /// cumulatively.
    pub fn set_timeout_interval(&mut self, fuid: &Fuid, interval: Duration) -> Result<()> {
        self.active_record(fuid)?;
        if self.engine.set_timeout_interval(fuid, interval) {
            debug!(fuid = %fuid, secs = interval.num_seconds(), "timeout interval set");
            Ok(())
        } else {
            Err(FilesError::InactiveFile { fuid: fuid.clone() })
        }
    }

    /// Name the engine uses for an analyzer kind
    pub fn analyzer_name(&self, kind: &AnalyzerKind) -> String {
        self.engine.analyzer_name(kind)
    }

    /// Description of the file from its source protocol's registration.
    ///
    /// Empty when the file is unknown, has no source, or the source
    /// protocol never registered.
    pub fn describe(&self, fuid: &Fuid) -> String {
        let Some(record) = self.tracker.get(fuid) else {
            return String::new();
        };
        record
            .source
            .as_deref()
            .map(|source| self.protocols.describe(source, record))
            .unwrap_or_default()
    }

    /// Answer the engine's request for a file handle.
    ///
    /// Looks up the protocol's registration and, if there is one, hands
    /// the raw handle to the engine, which salts and hashes it into the
    /// file id. Returns the raw handle.
    pub fn file_handle(&mut self, protocol: &str, conn: &Connection, is_orig: bool) -> Option<String> {
        let handle = self.protocols.file_handle(protocol, conn, is_orig)?;
        debug!(protocol, conn = %conn.uid, handle = %handle, "file handle resolved");
        self.engine.set_file_handle(handle.clone());
        Some(handle)
    }
}
