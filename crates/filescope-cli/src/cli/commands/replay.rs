//! `filescope replay` - drive a scripted session through the dispatcher.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use filescope::{
    sim, AnalyzerKind, AnalyzerRequest, Connection, Dispatcher, FileLogSink, FileRecord,
    FilesConfig, FilesError, Fuid, JsonLinesSink, ProtocolRegistration, ProtocolRegistry,
    Session, SignalKind, SimEngine,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::load_config;
use crate::cli::args::ReplayArgs;
use crate::script::{self, Step};

/// Priority of the keep-alive handler: after the built-in timeout refresh.
const EXTEND_PRIORITY: i32 = 5;

pub fn execute(args: &ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let steps = read_script(&args.script)?;

    let sink: Box<dyn FileLogSink> = match args.out.as_ref().or(config.log_path.as_ref()) {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create files log {}", path.display()))?;
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(JsonLinesSink::new(io::stdout())),
    };

    let start = args.start.unwrap_or_else(Utc::now);
    let summary = replay(&steps, config, sink, &args.reject, start)?;
    info!(
        steps = summary.steps,
        opened = summary.opened,
        logged = summary.logged,
        log_failures = summary.log_failures,
        rejected = summary.rejected,
        failed = summary.failed,
        skipped = summary.skipped,
        "replay finished"
    );
    Ok(())
}

fn read_script(path: &Path) -> Result<Vec<Step>> {
    if path == Path::new("-") {
        return Ok(script::parse(io::stdin().lock())?);
    }
    let file =
        File::open(path).with_context(|| format!("failed to open script {}", path.display()))?;
    Ok(script::parse(BufReader::new(file))?)
}

/// What a replay did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Steps applied
    pub steps: usize,
    /// Files started
    pub opened: usize,
    /// Records written to the files log
    pub logged: u64,
    /// Records the sink refused
    pub log_failures: u64,
    /// Attach requests the engine refused
    pub rejected: usize,
    /// Other operations that failed (mostly on files already gone)
    pub failed: usize,
    /// Steps skipped because their protocol is disabled
    pub skipped: usize,
}

/// Run `steps` against a fresh session, then remove whatever is left.
pub fn replay(
    steps: &[Step],
    config: FilesConfig,
    sink: impl FileLogSink + 'static,
    reject: &[String],
    start: DateTime<Utc>,
) -> Result<Summary> {
    let mut engine = SimEngine::with_config(&config, start);
    for name in reject {
        engine.reject_analyzer(AnalyzerKind::new(name).canonical_name());
    }
    let mut session = Session::builder(engine)
        .protocols(builtin_protocols())
        .sink(sink)
        .config(config)
        .build()?;

    let grants: Arc<Mutex<HashMap<Fuid, u64>>> = Arc::default();
    let mut dispatcher = Dispatcher::new();
    let pending = Arc::clone(&grants);
    dispatcher.register(SignalKind::Timeout, EXTEND_PRIORITY, "replay::extend", move |s, sig| {
        let fuid = &sig.file().id;
        let secs = pending.lock().ok().and_then(|mut g| g.remove(fuid));
        match secs {
            Some(secs) => s.set_timeout_interval(fuid, seconds(secs)),
            None => Ok(()),
        }
    });

    let mut summary = Summary::default();
    for step in steps {
        apply(&dispatcher, &mut session, &grants, step, &mut summary);
        summary.steps += 1;
    }

    let drained = sim::drain(&dispatcher, &mut session);
    debug!(drained, "removed files left at end of script");
    session.flush()?;
    summary.logged = session.logged();
    summary.log_failures = session.log_failures();
    Ok(summary)
}

fn apply(
    dispatcher: &Dispatcher<SimEngine>,
    session: &mut Session<SimEngine>,
    grants: &Mutex<HashMap<Fuid, u64>>,
    step: &Step,
    summary: &mut Summary,
) {
    let result = match step {
        Step::New {
            fuid,
            source,
            parent,
        } => {
            if source.as_deref().is_some_and(|p| session.is_disabled(p)) {
                summary.skipped += 1;
                return;
            }
            let signal = session
                .engine_mut()
                .open(fuid.clone(), source.as_deref(), parent.clone());
            match signal {
                Some(signal) => {
                    summary.opened += 1;
                    dispatcher.dispatch(session, &signal);
                }
                None => debug!(fuid = %fuid, "file already open"),
            }
            Ok(())
        }
        Step::Connection {
            fuid,
            conn,
            is_orig,
        } => {
            if let Some(signal) = session.engine_mut().over_connection(fuid, conn.clone(), *is_orig) {
                dispatcher.dispatch(session, &signal);
            }
            Ok(())
        }
        Step::Data { fuid, text, len } => {
            let data = script::payload(text.as_deref(), *len);
            session.engine_mut().deliver(fuid, &data);
            Ok(())
        }
        Step::Gap { fuid, len } => {
            session.engine_mut().gap(fuid, *len);
            Ok(())
        }
        Step::Total { fuid, bytes } => {
            session.engine_mut().set_total(fuid, *bytes);
            Ok(())
        }
        Step::Mime { fuid, mime_type } => {
            session.engine_mut().sniff(fuid, mime_type);
            Ok(())
        }
        Step::Attach {
            fuid,
            analyzer,
            params,
        } => {
            let mut request = AnalyzerRequest::new(AnalyzerKind::new(analyzer));
            request.params.clone_from(params);
            session.add_analyzer(fuid, request)
        }
        Step::Detach { fuid, analyzer } => {
            session.remove_analyzer(fuid, &AnalyzerRequest::new(AnalyzerKind::new(analyzer)))
        }
        Step::Stop { fuid } => session.stop(fuid),
        Step::Extend { fuid, secs } => {
            if session.tracker().is_active(fuid) {
                if let Ok(mut g) = grants.lock() {
                    g.insert(fuid.clone(), *secs);
                }
                Ok(())
            } else {
                Err(FilesError::InactiveFile { fuid: fuid.clone() })
            }
        }
        Step::Filename { fuid, name } => session.set_filename(fuid, name.clone()),
        Step::Advance { secs } => {
            let now = session.engine().now() + seconds(*secs);
            let removed = sim::expire(dispatcher, session, now);
            debug!(secs, removed = removed.len(), "clock advanced");
            Ok(())
        }
        Step::Close { fuid } => {
            if !sim::close(dispatcher, session, fuid) {
                debug!(fuid = %fuid, "close for unknown file");
            }
            Ok(())
        }
        Step::Handle {
            protocol,
            conn,
            is_orig,
        } => {
            handle(dispatcher, session, protocol, conn, *is_orig, summary);
            Ok(())
        }
    };

    match result {
        Ok(()) => {}
        Err(FilesError::AnalyzerRejected { .. }) => summary.rejected += 1,
        Err(e) if e.is_benign() => {
            debug!(error = %e, "step had no effect");
            summary.failed += 1;
        }
        Err(e) => {
            warn!(error = %e, "step failed");
            summary.failed += 1;
        }
    }
}

/// Answer a handle request, then start the file and put it on `conn`.
fn handle(
    dispatcher: &Dispatcher<SimEngine>,
    session: &mut Session<SimEngine>,
    protocol: &str,
    conn: &Connection,
    is_orig: bool,
    summary: &mut Summary,
) {
    if session.is_disabled(protocol) {
        debug!(protocol, "file analysis disabled for protocol");
        summary.skipped += 1;
        return;
    }
    if session.file_handle(protocol, conn, is_orig).is_none() {
        warn!(protocol, "no file handle registration for protocol");
        summary.failed += 1;
        return;
    }
    let Some(fuid) = session.engine_mut().take_pending_fuid() else {
        return;
    };

    if let Some(signal) = session.engine_mut().open(fuid.clone(), Some(protocol), None) {
        summary.opened += 1;
        dispatcher.dispatch(session, &signal);
    }
    if let Some(signal) = session.engine_mut().over_connection(&fuid, conn.clone(), is_orig) {
        dispatcher.dispatch(session, &signal);
    }
}

/// Protocols the replay knows how to name files for.
pub fn builtin_protocols() -> ProtocolRegistry {
    let mut registry = ProtocolRegistry::new();
    for protocol in ["HTTP", "FTP_DATA", "SMTP", "IRC_DATA"] {
        registry.register(
            protocol,
            ProtocolRegistration::new(
                move |conn, is_orig| connection_handle(protocol, conn, is_orig),
                describe_file,
            ),
        );
    }
    registry
}

fn connection_handle(protocol: &str, conn: &Connection, is_orig: bool) -> String {
    format!(
        "{protocol} {} {}:{} {}:{} {is_orig}",
        conn.uid, conn.orig_h, conn.orig_p, conn.resp_h, conn.resp_p
    )
}

fn describe_file(record: &FileRecord) -> String {
    let hosts = |set: &std::collections::BTreeSet<std::net::IpAddr>| {
        set.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    };
    match &record.filename {
        Some(name) => format!("{name} {} -> {}", hosts(&record.tx_hosts), hosts(&record.rx_hosts)),
        None => format!("{} -> {}", hosts(&record.tx_hosts), hosts(&record.rx_hosts)),
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::from(u32::try_from(secs).unwrap_or(u32::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filescope::MemorySink;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn run(script: &str, config: FilesConfig, reject: &[String]) -> (Summary, Vec<FileRecord>) {
        let steps = script::parse(script.as_bytes()).unwrap();
        let sink = MemorySink::new();
        let summary = replay(&steps, config, sink.clone(), reject, t0()).unwrap();
        (summary, sink.records())
    }

    #[test]
    fn test_download_is_logged_with_hosts() {
        let script = r#"
{"step":"new","fuid":"F1","source":"HTTP"}
{"step":"connection","fuid":"F1","conn":{"uid":"C1","orig_h":"10.0.0.1","resp_h":"192.0.2.8"},"is_orig":false}
{"step":"attach","fuid":"F1","analyzer":"sha256"}
{"step":"data","fuid":"F1","text":"hello"}
{"step":"mime","fuid":"F1","mime_type":"text/plain"}
{"step":"advance","secs":2}
{"step":"close","fuid":"F1"}
"#;
        let (summary, records) = run(script, FilesConfig::default(), &[]);
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.logged, 1);
        let rec = &records[0];
        assert!(rec.tx_hosts.contains(&"192.0.2.8".parse().unwrap()));
        assert!(rec.rx_hosts.contains(&"10.0.0.1".parse().unwrap()));
        assert!(rec.analyzers.contains("SHA256"));
        assert_eq!(rec.seen_bytes, 5);
        assert_eq!(rec.mime_type.as_deref(), Some("text/plain"));
        assert!(rec.local_orig.is_none());
    }

    #[test]
    fn test_rejected_analyzer_counted_and_recorded() {
        let script = r#"
{"step":"new","fuid":"F1","source":"SMTP"}
{"step":"attach","fuid":"F1","analyzer":"ANALYZER_EXTRACT"}
{"step":"attach","fuid":"Fgone","analyzer":"MD5"}
"#;
        let (summary, records) = run(script, FilesConfig::default(), &["extract".into()]);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 1);
        // Left open by the script; removed at the end.
        assert!(records[0].analyzers.contains("EXTRACT"));
    }

    #[test]
    fn test_extend_survives_one_timeout() {
        let script = r#"
{"step":"new","fuid":"F1","source":"HTTP"}
{"step":"extend","fuid":"F1","secs":600}
{"step":"advance","secs":130}
{"step":"advance","secs":300}
"#;
        let (summary, records) = run(script, FilesConfig::default(), &[]);
        assert_eq!(summary.failed, 0);
        assert_eq!(records.len(), 1);
        // Timed out once, kept alive, drained at the end.
        assert!(records[0].timedout);
    }

    #[test]
    fn test_timeout_without_extend_removes() {
        let script = r#"
{"step":"new","fuid":"F1","source":"HTTP"}
{"step":"advance","secs":121}
{"step":"filename","fuid":"F1","name":"late.txt"}
"#;
        let (summary, records) = run(script, FilesConfig::default(), &[]);
        assert_eq!(summary.failed, 1);
        assert!(records[0].timedout);
        assert!(records[0].filename.is_none());
    }

    #[test]
    fn test_handle_derives_salted_id() {
        let script = r#"
{"step":"handle","protocol":"HTTP","conn":{"uid":"C9","orig_h":"10.0.0.1","orig_p":40000,"resp_h":"192.0.2.8","resp_p":80},"is_orig":false}
{"step":"handle","protocol":"GOPHER","conn":{"uid":"C9","orig_h":"10.0.0.1","resp_h":"192.0.2.8"},"is_orig":false}
"#;
        let config = FilesConfig {
            salt: "s3cret".into(),
            ..FilesConfig::default()
        };
        let (summary, records) = run(script, config, &[]);
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.failed, 1);

        let expected = filescope::HandleHasher::new("s3cret")
            .fuid_for("HTTP C9 10.0.0.1:40000 192.0.2.8:80 false");
        assert_eq!(records[0].fuid, expected);
        assert_eq!(records[0].source.as_deref(), Some("HTTP"));
        assert_eq!(records[0].conn_uids.len(), 1);
    }

    #[test]
    fn test_disabled_protocol_skipped() {
        let script = r#"
{"step":"new","fuid":"F1","source":"SMTP"}
{"step":"handle","protocol":"SMTP","conn":{"uid":"C1","orig_h":"10.0.0.1","resp_h":"192.0.2.8"},"is_orig":true}
{"step":"new","fuid":"F2","source":"HTTP"}
"#;
        let mut config = FilesConfig::default();
        config.disable.insert("SMTP".into(), true);
        let (summary, records) = run(script, config, &[]);
        assert_eq!(summary.skipped, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fuid.as_str(), "F2");
    }

    #[test]
    fn test_describe_uses_filename_and_hosts() {
        let mut rec = FileRecord::new(Fuid::from("F1"), t0());
        rec.tx_hosts.insert("192.0.2.8".parse().unwrap());
        rec.rx_hosts.insert("10.0.0.1".parse().unwrap());
        assert_eq!(describe_file(&rec), "192.0.2.8 -> 10.0.0.1");
        rec.filename = Some("a.pdf".into());
        assert_eq!(describe_file(&rec), "a.pdf 192.0.2.8 -> 10.0.0.1");
    }

    #[test]
    fn test_huge_gaps_saturate_missing_bytes() {
        let script = r#"
{"step":"new","fuid":"F1"}
{"step":"gap","fuid":"F1","len":18446744073709551615}
{"step":"gap","fuid":"F1","len":1}
"#;
        let (summary, records) = run(script, FilesConfig::default(), &[]);
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.logged, 1);
        assert_eq!(summary.log_failures, 0);
        assert_eq!(records[0].missing_bytes, u64::MAX);
    }
}
