//! In-memory reference engine.
//!
//! `SimEngine` plays the extraction engine's part for tests and script
//! replay. It does no reassembly; it only keeps the counters, deadlines
//! and attached analyzers the scripted input implies, raises the matching
//! lifecycle signals, and feeds delivered bytes to analyzer hooks.
//!
//! Timeout policy: a file whose deadline passes gets a `file_timeout`
//! signal. If a handler calls `set_timeout_interval` while it runs, the
//! deadline becomes `now + interval` and the file lives on; otherwise the
//! file is dropped and `file_state_remove` follows.

use chrono::{DateTime, Duration, Utc};
use filescope_core::{AnalyzerRequest, Connection, FileView, Fuid, HandleHasher, Signal};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::config::FilesConfig;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::session::Session;

#[derive(Debug)]
struct SimFile {
    view: FileView,
    interval: Duration,
    deadline: DateTime<Utc>,
    analyzers: BTreeMap<String, AnalyzerRequest>,
    stopped: bool,
    in_timeout: bool,
    postponed: bool,
}

impl SimFile {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.view.last_active = now;
        self.deadline = now + self.interval;
    }
}

#[derive(Debug)]
pub struct SimEngine {
    hasher: HandleHasher,
    default_timeout: Duration,
    now: DateTime<Utc>,
    files: HashMap<Fuid, SimFile>,
    pending_handle: Option<String>,
    rejected: HashSet<String>,
}

impl SimEngine {
    /// Engine with default configuration and its clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_config(&FilesConfig::default(), now)
    }

    pub fn with_config(config: &FilesConfig, now: DateTime<Utc>) -> Self {
        Self {
            hasher: HandleHasher::new(config.salt.clone()),
            default_timeout: config.default_timeout_interval(),
            now,
            files: HashMap::new(),
            pending_handle: None,
            rejected: HashSet::new(),
        }
    }

    /// Refuse every attach request for the named analyzer.
    pub fn reject_analyzer(&mut self, name: impl Into<String>) {
        self.rejected.insert(name.into().to_ascii_uppercase());
    }

    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Move the clock forward. It never goes back.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        if now > self.now {
            self.now = now;
        }
    }

    /// File id for the last handle set through [`Engine::set_file_handle`].
    pub fn take_pending_fuid(&mut self) -> Option<Fuid> {
        self.pending_handle
            .take()
            .map(|handle| self.hasher.fuid_for(&handle))
    }

    pub fn is_tracking(&self, fuid: &Fuid) -> bool {
        self.files.contains_key(fuid)
    }

    /// Ids of every tracked file, sorted
    pub fn tracked(&self) -> Vec<Fuid> {
        let mut ids: Vec<Fuid> = self.files.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn view(&self, fuid: &Fuid) -> Option<&FileView> {
        self.files.get(fuid).map(|f| &f.view)
    }

    /// Requests currently attached to the file, as the engine received them
    pub fn attached(&self, fuid: &Fuid) -> Vec<&AnalyzerRequest> {
        self.files
            .get(fuid)
            .map(|f| f.analyzers.values().collect())
            .unwrap_or_default()
    }

    pub fn is_stopped(&self, fuid: &Fuid) -> bool {
        self.files.get(fuid).is_some_and(|f| f.stopped)
    }

    pub fn deadline(&self, fuid: &Fuid) -> Option<DateTime<Utc>> {
        self.files.get(fuid).map(|f| f.deadline)
    }

    /// Start tracking a file. Returns `file_new`, or `None` if the id is
    /// already tracked.
    pub fn open(
        &mut self,
        fuid: Fuid,
        source: Option<&str>,
        parent: Option<Fuid>,
    ) -> Option<Signal> {
        if self.files.contains_key(&fuid) {
            return None;
        }
        let mut view = FileView::new(fuid.clone(), self.now);
        view.source = source.map(str::to_string);
        view.depth = parent.as_ref().map(|_| 1);
        view.parent_id = parent;

        debug!(fuid = %fuid, "sim engine opened file");
        self.files.insert(
            fuid,
            SimFile {
                view: view.clone(),
                interval: self.default_timeout,
                deadline: self.now + self.default_timeout,
                analyzers: BTreeMap::new(),
                stopped: false,
                in_timeout: false,
                postponed: false,
            },
        );
        Some(Signal::New(view))
    }

    /// The file was seen on `conn`.
    pub fn over_connection(
        &mut self,
        fuid: &Fuid,
        conn: Connection,
        is_orig: bool,
    ) -> Option<Signal> {
        let now = self.now;
        let file = self.files.get_mut(fuid)?;
        file.view.is_orig = Some(is_orig);
        file.touch(now);
        Some(Signal::OverNewConnection {
            file: file.view.clone(),
            conn,
            is_orig,
        })
    }

    /// Deliver in-order content. Ignored once the file is stopped.
    pub fn deliver(&mut self, fuid: &Fuid, data: &[u8]) -> bool {
        let now = self.now;
        let Some(file) = self.files.get_mut(fuid) else {
            return false;
        };
        if file.stopped {
            return false;
        }

        let offset = file.view.seen_bytes;
        for request in file.analyzers.values() {
            if let Some(hook) = &request.chunk_hook {
                hook(fuid, data, offset);
            }
            if let Some(hook) = &request.stream_hook {
                hook(fuid, data);
            }
        }
        file.view.seen_bytes = file.view.seen_bytes.saturating_add(data.len() as u64);
        file.touch(now);
        true
    }

    /// Record bytes that will never arrive.
    pub fn gap(&mut self, fuid: &Fuid, len: u64) -> bool {
        self.update(fuid, |v| v.missing_bytes = v.missing_bytes.saturating_add(len))
    }

    /// Record bytes that arrived out of order after buffer overflow.
    pub fn overflow(&mut self, fuid: &Fuid, len: u64) -> bool {
        self.update(fuid, |v| v.overflow_bytes = v.overflow_bytes.saturating_add(len))
    }

    /// The source announced the total size.
    pub fn set_total(&mut self, fuid: &Fuid, total: u64) -> bool {
        self.update(fuid, |v| v.total_bytes = Some(total))
    }

    /// Content sniffing produced a MIME type.
    pub fn sniff(&mut self, fuid: &Fuid, mime: &str) -> bool {
        self.update(fuid, |v| v.mime_type = Some(mime.to_string()))
    }

    fn update(&mut self, fuid: &Fuid, f: impl FnOnce(&mut FileView)) -> bool {
        let now = self.now;
        self.files.get_mut(fuid).map_or(false, |file| {
            f(&mut file.view);
            file.touch(now);
            true
        })
    }

    /// Files whose deadline has passed, in id order
    pub fn due(&self) -> Vec<Fuid> {
        let mut due: Vec<Fuid> = self
            .files
            .iter()
            .filter(|(_, f)| !f.in_timeout && f.deadline <= self.now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();
        due
    }

    /// Enter timeout handling for a due file.
    pub fn begin_timeout(&mut self, fuid: &Fuid) -> Option<Signal> {
        let now = self.now;
        let file = self.files.get_mut(fuid)?;
        if file.in_timeout || file.deadline > now {
            return None;
        }
        file.in_timeout = true;
        file.postponed = false;
        Some(Signal::Timeout(file.view.clone()))
    }

    /// Leave timeout handling. Drops the file unless a handler postponed it.
    pub fn end_timeout(&mut self, fuid: &Fuid) -> Option<Signal> {
        let file = self.files.get_mut(fuid)?;
        if !file.in_timeout {
            return None;
        }
        file.in_timeout = false;
        if file.postponed {
            debug!(fuid = %fuid, deadline = %file.deadline, "timeout postponed");
            return None;
        }
        self.remove(fuid)
    }

    /// Drop the file. Returns `file_state_remove` if it was tracked.
    pub fn remove(&mut self, fuid: &Fuid) -> Option<Signal> {
        self.files
            .remove(fuid)
            .map(|file| Signal::StateRemove(file.view))
    }
}

impl Engine for SimEngine {
    fn set_timeout_interval(&mut self, fuid: &Fuid, interval: Duration) -> bool {
        let now = self.now;
        let Some(file) = self.files.get_mut(fuid) else {
            return false;
        };
        file.interval = interval;
        if file.in_timeout {
            file.deadline = now + interval;
            file.postponed = true;
        } else {
            file.deadline = file.view.last_active + interval;
        }
        true
    }

    fn attach_analyzer(&mut self, fuid: &Fuid, request: &AnalyzerRequest) -> bool {
        let name = self.analyzer_name(&request.kind);
        if self.rejected.contains(&name) {
            return false;
        }
        self.files.get_mut(fuid).map_or(false, |file| {
            file.analyzers.insert(name, request.clone());
            true
        })
    }

    fn detach_analyzer(&mut self, fuid: &Fuid, request: &AnalyzerRequest) -> bool {
        let name = self.analyzer_name(&request.kind);
        self.files.get_mut(fuid).map_or(false, |file| {
            file.analyzers.remove(&name);
            true
        })
    }

    fn stop_analysis(&mut self, fuid: &Fuid) -> bool {
        self.files.get_mut(fuid).map_or(false, |file| {
            file.stopped = true;
            true
        })
    }

    fn set_file_handle(&mut self, handle: String) {
        self.pending_handle = Some(handle);
    }
}

/// Advance the clock to `now` and run timeout handling for every due file.
///
/// Returns the ids that were removed.
pub fn expire(
    dispatcher: &Dispatcher<SimEngine>,
    session: &mut Session<SimEngine>,
    now: DateTime<Utc>,
) -> Vec<Fuid> {
    session.engine_mut().set_now(now);
    let mut removed = Vec::new();
    for fuid in session.engine().due() {
        if let Some(signal) = session.engine_mut().begin_timeout(&fuid) {
            dispatcher.dispatch(session, &signal);
        }
        if let Some(signal) = session.engine_mut().end_timeout(&fuid) {
            dispatcher.dispatch(session, &signal);
            removed.push(fuid);
        }
    }
    removed
}

/// Shut down: remove every remaining file, in id order.
pub fn drain(dispatcher: &Dispatcher<SimEngine>, session: &mut Session<SimEngine>) -> usize {
    session
        .engine()
        .tracked()
        .iter()
        .filter(|fuid| close(dispatcher, session, fuid))
        .count()
}

/// The source finished the file: drop it and dispatch `file_state_remove`.
pub fn close(
    dispatcher: &Dispatcher<SimEngine>,
    session: &mut Session<SimEngine>,
    fuid: &Fuid,
) -> bool {
    match session.engine_mut().remove(fuid) {
        Some(signal) => {
            dispatcher.dispatch(session, &signal);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filescope_core::AnalyzerKind;
    use std::sync::{Arc, Mutex};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_open_once() {
        let mut engine = SimEngine::new(t0());
        assert!(matches!(engine.open(Fuid::from("F1"), Some("HTTP"), None), Some(Signal::New(_))));
        assert!(engine.open(Fuid::from("F1"), Some("HTTP"), None).is_none());
        assert_eq!(engine.view(&Fuid::from("F1")).unwrap().source.as_deref(), Some("HTTP"));
    }

    #[test]
    fn test_child_file_has_parent_and_depth() {
        let mut engine = SimEngine::new(t0());
        let Some(Signal::New(view)) =
            engine.open(Fuid::from("Fchild"), Some("ZIP"), Some(Fuid::from("Fzip")))
        else {
            panic!("expected file_new");
        };
        assert_eq!(view.parent_id, Some(Fuid::from("Fzip")));
        assert_eq!(view.depth, Some(1));
    }

    #[test]
    fn test_hooks_receive_offsets() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let req = AnalyzerRequest::new(AnalyzerKind::DATA_EVENT).with_chunk_hook(Arc::new(
            move |_: &Fuid, data: &[u8], off: u64| sink.lock().unwrap().push((off, data.len())),
        ));
        assert!(engine.attach_analyzer(&fuid, &req));

        engine.deliver(&fuid, b"hello");
        engine.deliver(&fuid, b"world!");
        assert_eq!(*seen.lock().unwrap(), vec![(0, 5), (5, 6)]);
        assert_eq!(engine.view(&fuid).unwrap().seen_bytes, 11);
    }

    #[test]
    fn test_stopped_file_ignores_content() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);
        assert!(engine.stop_analysis(&fuid));
        assert!(!engine.deliver(&fuid, b"ignored"));
        assert_eq!(engine.view(&fuid).unwrap().seen_bytes, 0);
        assert!(engine.is_stopped(&fuid));
    }

    #[test]
    fn test_rejected_analyzer() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);
        engine.reject_analyzer("extract");
        assert!(!engine.attach_analyzer(&fuid, &AnalyzerRequest::new(AnalyzerKind::EXTRACT)));
        assert!(engine.attach_analyzer(&fuid, &AnalyzerRequest::new(AnalyzerKind::MD5)));
        assert_eq!(engine.attached(&fuid).len(), 1);
    }

    #[test]
    fn test_primitives_on_unknown_file() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("Fghost");
        assert!(!engine.set_timeout_interval(&fuid, Duration::seconds(5)));
        assert!(!engine.attach_analyzer(&fuid, &AnalyzerRequest::new(AnalyzerKind::MD5)));
        assert!(!engine.detach_analyzer(&fuid, &AnalyzerRequest::new(AnalyzerKind::MD5)));
        assert!(!engine.stop_analysis(&fuid));
    }

    #[test]
    fn test_extension_during_timeout_replaces_deadline() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);

        engine.set_now(t0() + Duration::seconds(200));
        assert_eq!(engine.due(), vec![fuid.clone()]);
        assert!(matches!(engine.begin_timeout(&fuid), Some(Signal::Timeout(_))));
        engine.set_timeout_interval(&fuid, Duration::seconds(60));
        engine.set_timeout_interval(&fuid, Duration::seconds(30));
        assert!(engine.end_timeout(&fuid).is_none());
        // Replaced from now, not stacked.
        assert_eq!(engine.deadline(&fuid), Some(t0() + Duration::seconds(230)));
    }

    #[test]
    fn test_timeout_without_extension_removes() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);
        engine.set_now(t0() + Duration::seconds(121));
        engine.begin_timeout(&fuid);
        assert!(matches!(engine.end_timeout(&fuid), Some(Signal::StateRemove(_))));
        assert!(!engine.is_tracking(&fuid));
    }

    #[test]
    fn test_interval_outside_timeout_counts_from_activity() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);
        engine.set_now(t0() + Duration::seconds(10));
        engine.set_timeout_interval(&fuid, Duration::seconds(5));
        assert_eq!(engine.deadline(&fuid), Some(t0() + Duration::seconds(5)));
    }

    #[test]
    fn test_pending_handle_hashes_with_salt() {
        let config = FilesConfig {
            salt: "pepper".into(),
            ..FilesConfig::default()
        };
        let mut engine = SimEngine::with_config(&config, t0());
        engine.set_file_handle("HTTP C1 F 0".into());
        let fuid = engine.take_pending_fuid().unwrap();
        assert_eq!(fuid, HandleHasher::new("pepper").fuid_for("HTTP C1 F 0"));
        assert!(engine.take_pending_fuid().is_none());
    }

    #[test]
    fn test_drain_logs_every_remaining_file() {
        let sink = crate::sink::MemorySink::new();
        let mut session = Session::builder(SimEngine::new(t0()))
            .sink(sink.clone())
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new();
        for id in ["Fb", "Fa"] {
            let signal = session.engine_mut().open(Fuid::from(id), None, None).unwrap();
            dispatcher.dispatch(&mut session, &signal);
        }
        assert_eq!(drain(&dispatcher, &mut session), 2);
        let ids: Vec<_> = sink.records().into_iter().map(|r| r.fuid).collect();
        assert_eq!(ids, vec![Fuid::from("Fa"), Fuid::from("Fb")]);
        assert!(session.engine().tracked().is_empty());
    }

    #[test]
    fn test_byte_counters_saturate() {
        let mut engine = SimEngine::new(t0());
        let fuid = Fuid::from("F1");
        engine.open(fuid.clone(), None, None);
        assert!(engine.gap(&fuid, u64::MAX));
        assert!(engine.gap(&fuid, 1));
        assert!(engine.overflow(&fuid, u64::MAX));
        assert!(engine.overflow(&fuid, u64::MAX));
        let view = engine.view(&fuid).unwrap();
        assert_eq!(view.missing_bytes, u64::MAX);
        assert_eq!(view.overflow_bytes, u64::MAX);
    }

    #[test]
    fn test_clock_never_goes_back() {
        let mut engine = SimEngine::new(t0());
        engine.set_now(t0() - Duration::seconds(5));
        assert_eq!(engine.now(), t0());
    }
}
