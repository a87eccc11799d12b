//! The file-analysis session: tracker, registries and collaborators.
//!
//! A [`Session`] is built once at startup and driven by a
//! [`Dispatcher`](crate::dispatch::Dispatcher). It owns the extraction
//! engine handle, the metadata tracker, both registries, the files-log
//! sink and the site classifier. Analyzer operations live in
//! [`orchestrator`](crate::orchestrator).

use filescope_core::{Connection, FileRecord, FileView, Fuid, Result};
use tracing::{debug, warn};

use crate::callbacks::AnalyzerCallbacks;
use crate::config::FilesConfig;
use crate::engine::Engine;
use crate::protocol::ProtocolRegistry;
use crate::sink::{FileLogSink, NullSink};
use crate::site::{LocalNets, NoLocalNets, SiteClassifier};
use crate::tracker::Tracker;

/// Called with every record after it has been written to the files log.
pub type LogObserver = Box<dyn Fn(&FileRecord) + Send>;

pub struct Session<E> {
    pub(crate) engine: E,
    pub(crate) tracker: Tracker,
    pub(crate) protocols: ProtocolRegistry,
    pub(crate) callbacks: AnalyzerCallbacks,
    sink: Box<dyn FileLogSink>,
    site: Box<dyn SiteClassifier>,
    observers: Vec<LogObserver>,
    config: FilesConfig,
    logged: u64,
    log_failures: u64,
}

impl<E: Engine> Session<E> {
    /// Start building a session around an engine.
    pub fn builder(engine: E) -> SessionBuilder<E> {
        SessionBuilder::new(engine)
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub const fn config(&self) -> &FilesConfig {
        &self.config
    }

    pub const fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    /// Registries are normally filled before the first signal; protocol
    /// setup code may still add entries later.
    pub fn protocols_mut(&mut self) -> &mut ProtocolRegistry {
        &mut self.protocols
    }

    pub fn callbacks_mut(&mut self) -> &mut AnalyzerCallbacks {
        &mut self.callbacks
    }

    /// Records written to the files log so far
    pub const fn logged(&self) -> u64 {
        self.logged
    }

    /// Finished records the sink failed to write
    pub const fn log_failures(&self) -> u64 {
        self.log_failures
    }

    /// Whether analysis is disabled for `protocol` (for protocol logic)
    pub fn is_disabled(&self, protocol: &str) -> bool {
        self.config.is_disabled(protocol)
    }

    /// Register a `log_files` observer.
    pub fn on_log<F>(&mut self, observer: F)
    where
        F: Fn(&FileRecord) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Create the record if needed and merge the engine view into it.
    pub fn refresh(&mut self, view: &FileView) -> &FileRecord {
        self.tracker.refresh(view)
    }

    /// Refresh, then record the connection that carried the file.
    pub fn record_connection(&mut self, view: &FileView, conn: &Connection, is_orig: bool) {
        self.tracker.refresh(view);
        self.tracker
            .record_connection(&view.id, conn, is_orig, self.site.as_ref());
    }

    /// Refresh, then set the sticky timed-out flag.
    pub fn mark_timed_out(&mut self, view: &FileView) {
        self.tracker.refresh(view);
        self.tracker.mark_timed_out(&view.id);
    }

    /// Set the filename suggested by protocol logic.
    pub fn set_filename(&mut self, fuid: &Fuid, filename: impl Into<String>) -> Result<()> {
        let record = self.active_record(fuid)?;
        record.filename = Some(filename.into());
        Ok(())
    }

    /// Set the nesting depth relative to the source container.
    ///
    /// Takes precedence over any depth the engine reports afterwards.
    pub fn set_depth(&mut self, fuid: &Fuid, depth: u32) -> Result<()> {
        if self.tracker.set_depth(fuid, depth) {
            Ok(())
        } else {
            Err(filescope_core::FilesError::InactiveFile { fuid: fuid.clone() })
        }
    }

    /// Finalize the file's record and write it to the files log.
    ///
    /// Returns false if the file had no record (already logged). Sink
    /// failures are reported and counted in [`Self::log_failures`], not in
    /// [`Self::logged`]; observers see the record either way.
    pub fn log_file(&mut self, fuid: &Fuid) -> bool {
        let Some(record) = self.tracker.finalize(fuid) else {
            debug!(fuid = %fuid, "no record left to log");
            return false;
        };

        match self.sink.write(&record) {
            Ok(()) => self.logged += 1,
            Err(e) => {
                warn!(fuid = %fuid, error = %e, "failed to write files log entry");
                self.log_failures += 1;
            }
        }
        for observer in &self.observers {
            observer(&record);
        }
        true
    }

    /// Flush the files log.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    pub(crate) fn active_record(&mut self, fuid: &Fuid) -> Result<&mut FileRecord> {
        self.tracker
            .get_mut(fuid)
            .ok_or_else(|| filescope_core::FilesError::InactiveFile { fuid: fuid.clone() })
    }
}

impl<E> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.tracker.len())
            .field("protocols", &self.protocols.len())
            .field("callbacks", &self.callbacks)
            .field("logged", &self.logged)
            .field("log_failures", &self.log_failures)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`]; every collaborator has a default.
pub struct SessionBuilder<E> {
    engine: E,
    protocols: ProtocolRegistry,
    callbacks: AnalyzerCallbacks,
    sink: Box<dyn FileLogSink>,
    site: Option<Box<dyn SiteClassifier>>,
    config: FilesConfig,
}

impl<E: Engine> SessionBuilder<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            protocols: ProtocolRegistry::new(),
            callbacks: AnalyzerCallbacks::new(),
            sink: Box::new(NullSink),
            site: None,
            config: FilesConfig::default(),
        }
    }

    #[must_use]
    pub fn protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = protocols;
        self
    }

    #[must_use]
    pub fn callbacks(mut self, callbacks: AnalyzerCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: impl FileLogSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    #[must_use]
    pub fn site(mut self, site: impl SiteClassifier + 'static) -> Self {
        self.site = Some(Box::new(site));
        self
    }

    #[must_use]
    pub fn config(mut self, config: FilesConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the session. Without an explicit classifier, one is built
    /// from `config.local_nets`.
    pub fn build(self) -> Result<Session<E>> {
        let site: Box<dyn SiteClassifier> = match self.site {
            Some(site) => site,
            None if self.config.local_nets.is_empty() => Box::new(NoLocalNets),
            None => Box::new(LocalNets::parse(&self.config.local_nets)?),
        };
        if self.config.uses_default_salt() {
            warn!("file handle salt is the shipped default; set `salt` in the configuration");
        }

        Ok(Session {
            engine: self.engine,
            tracker: Tracker::new(),
            protocols: self.protocols,
            callbacks: self.callbacks,
            sink: self.sink,
            site,
            observers: Vec::new(),
            config: self.config,
            logged: 0,
            log_failures: 0,
        })
    }
}
