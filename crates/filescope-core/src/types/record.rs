use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

use super::common::Fuid;

/// Metadata kept for one file from its first lifecycle signal until
/// removal, then written to the files log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// When the file was first seen
    pub ts: DateTime<Utc>,

    /// File identifier
    pub fuid: Fuid,

    /// Hosts that transmitted the file
    #[serde(default)]
    pub tx_hosts: BTreeSet<IpAddr>,

    /// Hosts that received the file
    #[serde(default)]
    pub rx_hosts: BTreeSet<IpAddr>,

    /// Connections that carried the file
    #[serde(default)]
    pub conn_uids: BTreeSet<String>,

    /// Protocol or input channel the data came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Nesting depth relative to the source container
    #[serde(default)]
    pub depth: u32,

    /// Every analyzer ever requested for the file
    #[serde(default)]
    pub analyzers: BTreeSet<String>,

    /// Sniffed content type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Filename suggested by the protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Last activity minus `ts`
    #[serde(with = "interval_secs")]
    pub duration: Duration,

    /// Whether the transmitting host is inside the local networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_orig: Option<bool>,

    /// Whether the file was sent by the connection originator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_orig: Option<bool>,

    /// Bytes delivered to analyzers
    #[serde(default)]
    pub seen_bytes: u64,

    /// Expected total size, if the source announced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,

    /// Bytes permanently lost
    #[serde(default)]
    pub missing_bytes: u64,

    /// Bytes delivered out of order after buffer overflow
    #[serde(default)]
    pub overflow_bytes: u64,

    /// Whether the file ever hit its inactivity timeout
    #[serde(default)]
    pub timedout: bool,

    /// Container file this one was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_fuid: Option<Fuid>,
}

impl FileRecord {
    /// Fresh record with every counter at zero.
    pub fn new(fuid: Fuid, ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            fuid,
            tx_hosts: BTreeSet::new(),
            rx_hosts: BTreeSet::new(),
            conn_uids: BTreeSet::new(),
            source: None,
            depth: 0,
            analyzers: BTreeSet::new(),
            mime_type: None,
            filename: None,
            duration: Duration::zero(),
            local_orig: None,
            is_orig: None,
            seen_bytes: 0,
            total_bytes: None,
            missing_bytes: 0,
            overflow_bytes: 0,
            timedout: false,
            parent_fuid: None,
        }
    }

    /// Whether all announced bytes arrived
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_bytes
            .is_some_and(|total| self.seen_bytes >= total && self.missing_bytes == 0)
    }
}

/// Intervals are logged as fractional seconds.
mod interval_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let micros = d.num_microseconds().unwrap_or(i64::MAX);
        s.serialize_f64(micros as f64 / 1_000_000.0)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::microseconds((secs * 1_000_000.0).round() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let rec = FileRecord::new(Fuid::from("Fabc"), Utc::now());
        assert_eq!(rec.depth, 0);
        assert!(!rec.timedout);
        assert!(rec.analyzers.is_empty());
        assert_eq!(rec.duration, Duration::zero());
        assert!(!rec.is_complete());
    }

    #[test]
    fn test_serialization_omits_unknown_optionals() {
        let mut rec = FileRecord::new(Fuid::from("Fabc"), Utc::now());
        rec.duration = Duration::milliseconds(1500);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["duration"], 1.5);
        assert!(json.get("mime_type").is_none());
        assert!(json.get("total_bytes").is_none());
        assert_eq!(json["timedout"], false);

        let parsed: FileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.duration, Duration::milliseconds(1500));
    }

    #[test]
    fn test_complete_requires_total_and_no_gaps() {
        let mut rec = FileRecord::new(Fuid::from("Fabc"), Utc::now());
        rec.seen_bytes = 10;
        rec.total_bytes = Some(10);
        assert!(rec.is_complete());
        rec.missing_bytes = 2;
        assert!(!rec.is_complete());
    }
}
