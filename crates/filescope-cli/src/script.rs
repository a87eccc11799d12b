//! Replay scripts: one JSON step per line.
//!
//! ```text
//! {"step":"new","fuid":"F1","source":"HTTP"}
//! {"step":"connection","fuid":"F1","conn":{"uid":"C1","orig_h":"10.0.0.1","resp_h":"192.0.2.8"},"is_orig":false}
//! {"step":"attach","fuid":"F1","analyzer":"SHA256"}
//! {"step":"data","fuid":"F1","text":"hello"}
//! {"step":"advance","secs":30}
//! {"step":"close","fuid":"F1"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use filescope_core::{Connection, FilesError, Fuid, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::BufRead;

/// One scripted input to the engine or to protocol logic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// The engine starts a file.
    New {
        fuid: Fuid,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        parent: Option<Fuid>,
    },

    /// The file is seen on a connection.
    Connection {
        fuid: Fuid,
        conn: Connection,
        is_orig: bool,
    },

    /// In-order content: `text` bytes, or `len` zero bytes.
    Data {
        fuid: Fuid,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        len: Option<u64>,
    },

    /// Bytes that will never arrive.
    Gap { fuid: Fuid, len: u64 },

    /// The source announced the total size.
    Total { fuid: Fuid, bytes: u64 },

    /// Content sniffing produced a MIME type.
    Mime { fuid: Fuid, mime_type: String },

    /// Protocol logic attaches an analyzer.
    Attach {
        fuid: Fuid,
        analyzer: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },

    /// Protocol logic detaches an analyzer.
    Detach { fuid: Fuid, analyzer: String },

    /// Protocol logic stops all analysis of the file.
    Stop { fuid: Fuid },

    /// Keep the file alive for `secs` more the next time it times out.
    Extend { fuid: Fuid, secs: u64 },

    /// Protocol logic names the file.
    Filename { fuid: Fuid, name: String },

    /// Move the clock forward and expire idle files.
    Advance { secs: u64 },

    /// The source finished the file.
    Close { fuid: Fuid },

    /// The engine needs a handle for a new file seen by `protocol`.
    Handle {
        protocol: String,
        conn: Connection,
        is_orig: bool,
    },
}

/// Largest `len` a `data` step may ask for (16 MiB).
pub const MAX_DATA_LEN: u64 = 16 * 1024 * 1024;

impl Step {
    fn check(&self) -> std::result::Result<(), String> {
        match self {
            Self::Data { len: Some(len), .. } if *len > MAX_DATA_LEN => Err(format!(
                "data len {len} exceeds the {MAX_DATA_LEN} byte limit; use a gap for large holes"
            )),
            _ => Ok(()),
        }
    }
}

/// Bytes delivered by a `data` step
pub fn payload(text: Option<&str>, len: Option<u64>) -> Vec<u8> {
    match (text, len) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(len)) => vec![0; usize::try_from(len).unwrap_or(0)],
        (None, None) => Vec::new(),
    }
}

/// Parse a whole script.
pub fn parse(reader: impl BufRead) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: Step = serde_json::from_str(trimmed).map_err(|e| FilesError::Script {
            line: idx + 1,
            message: e.to_string(),
        })?;
        step.check()
            .map_err(|message| FilesError::Script { line: idx + 1, message })?;
        steps.push(step);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blanks_and_comments() {
        let script = r#"
# upload over HTTP
{"step":"new","fuid":"F1","source":"HTTP"}

{"step":"advance","secs":5}
"#;
        let steps = parse(script.as_bytes()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0],
            Step::New {
                fuid: Fuid::from("F1"),
                source: Some("HTTP".into()),
                parent: None,
            }
        );
        assert_eq!(steps[1], Step::Advance { secs: 5 });
    }

    #[test]
    fn test_parse_connection_defaults_ports() {
        let line = r#"{"step":"connection","fuid":"F1","conn":{"uid":"C1","orig_h":"10.0.0.1","resp_h":"::1"},"is_orig":true}"#;
        let steps = parse(line.as_bytes()).unwrap();
        let Step::Connection { conn, is_orig, .. } = &steps[0] else {
            panic!("expected connection step");
        };
        assert!(*is_orig);
        assert_eq!(conn.uid, "C1");
        assert_eq!(conn.resp_p, 0);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let script = "{\"step\":\"stop\",\"fuid\":\"F1\"}\n{\"step\":\"teleport\"}\n";
        let err = parse(script.as_bytes()).unwrap_err();
        assert!(matches!(err, FilesError::Script { line: 2, .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse(r#"{"step":"close","fuid":"F1","bogus":1}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, FilesError::Script { line: 1, .. }));
    }

    #[test]
    fn test_oversized_data_len_rejected() {
        let script = format!(
            "{{\"step\":\"new\",\"fuid\":\"F1\"}}\n{{\"step\":\"data\",\"fuid\":\"F1\",\"len\":{}}}\n",
            u64::MAX
        );
        let err = parse(script.as_bytes()).unwrap_err();
        assert!(matches!(err, FilesError::Script { line: 2, ref message } if message.contains("limit")));

        let at_limit = format!(r#"{{"step":"data","fuid":"F1","len":{MAX_DATA_LEN}}}"#);
        assert!(parse(at_limit.as_bytes()).is_ok());
    }

    #[test]
    fn test_payload() {
        assert_eq!(payload(Some("abc"), Some(10)), b"abc");
        assert_eq!(payload(None, Some(4)), vec![0; 4]);
        assert!(payload(None, None).is_empty());
    }
}
