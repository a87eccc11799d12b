//! Protocol registrations: how each protocol names and describes its files.

use filescope_core::{Connection, FileRecord};
use std::collections::HashMap;
use tracing::debug;

/// Derives a raw file handle from connection context and direction.
pub type HandleFn = Box<dyn Fn(&Connection, bool) -> String + Send + Sync>;

/// Produces a human-readable description of a file.
pub type DescribeFn = Box<dyn Fn(&FileRecord) -> String + Send + Sync>;

/// The two callbacks a protocol supplies.
pub struct ProtocolRegistration {
    get_file_handle: HandleFn,
    describe: DescribeFn,
}

impl ProtocolRegistration {
    pub fn new<H, D>(get_file_handle: H, describe: D) -> Self
    where
        H: Fn(&Connection, bool) -> String + Send + Sync + 'static,
        D: Fn(&FileRecord) -> String + Send + Sync + 'static,
    {
        Self {
            get_file_handle: Box::new(get_file_handle),
            describe: Box::new(describe),
        }
    }

    /// Raw (unsalted) handle for a file on `conn`
    pub fn file_handle(&self, conn: &Connection, is_orig: bool) -> String {
        (self.get_file_handle)(conn, is_orig)
    }

    pub fn describe(&self, record: &FileRecord) -> String {
        (self.describe)(record)
    }
}

impl std::fmt::Debug for ProtocolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistration").finish_non_exhaustive()
    }
}

/// One registration per protocol id; last write wins.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    entries: HashMap<String, ProtocolRegistration>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a protocol's callbacks.
    ///
    /// Returns true if this is the first registration for `protocol`.
    pub fn register(&mut self, protocol: impl Into<String>, reg: ProtocolRegistration) -> bool {
        let protocol = protocol.into();
        debug!(protocol = %protocol, "registering file protocol");
        self.entries.insert(protocol, reg).is_none()
    }

    pub fn get(&self, protocol: &str) -> Option<&ProtocolRegistration> {
        self.entries.get(protocol)
    }

    pub fn is_registered(&self, protocol: &str) -> bool {
        self.entries.contains_key(protocol)
    }

    /// Raw handle for a file, or `None` when the protocol is unregistered
    /// and the engine should fall back to its own identity scheme.
    pub fn file_handle(&self, protocol: &str, conn: &Connection, is_orig: bool) -> Option<String> {
        self.get(protocol).map(|reg| reg.file_handle(conn, is_orig))
    }

    /// Description of a file by its source protocol; empty if unregistered.
    pub fn describe(&self, protocol: &str, record: &FileRecord) -> String {
        self.get(protocol)
            .map(|reg| reg.describe(record))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filescope_core::Fuid;

    fn http() -> ProtocolRegistration {
        ProtocolRegistration::new(
            |c, is_orig| format!("HTTP {} {is_orig}", c.uid),
            |r| format!("http file {}", r.fuid),
        )
    }

    fn conn() -> Connection {
        Connection::new("C7", "10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())
    }

    #[test]
    fn test_register_reports_first_registration() {
        let mut reg = ProtocolRegistry::new();
        assert!(reg.register("HTTP", http()));
        assert!(!reg.register("HTTP", http()));
        assert!(reg.register("FTP_DATA", http()));
        assert_eq!(reg.len(), 2);
        assert!(reg.is_registered("FTP_DATA"));
        assert!(!reg.is_registered("ftp_data"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut reg = ProtocolRegistry::new();
        reg.register("SMTP", http());
        reg.register(
            "SMTP",
            ProtocolRegistration::new(|c, _| format!("smtp-{}", c.uid), |_| "mail".into()),
        );
        assert_eq!(reg.file_handle("SMTP", &conn(), true).as_deref(), Some("smtp-C7"));
    }

    #[test]
    fn test_unregistered_protocol_declines() {
        let reg = ProtocolRegistry::new();
        let rec = FileRecord::new(Fuid::from("F1"), Utc::now());
        assert!(reg.file_handle("IRC", &conn(), false).is_none());
        assert_eq!(reg.describe("IRC", &rec), "");
    }

    #[test]
    fn test_describe_uses_callback() {
        let mut reg = ProtocolRegistry::new();
        reg.register("HTTP", http());
        let rec = FileRecord::new(Fuid::from("F1"), Utc::now());
        assert_eq!(reg.describe("HTTP", &rec), "http file F1");
    }
}
