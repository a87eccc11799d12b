//! Per-file metadata records.
//!
//! The tracker owns one [`FileRecord`] per active file id. Records are
//! created by the first lifecycle signal for an id, refreshed from the
//! engine's view on every later signal, and handed out exactly once at
//! removal.
//!
//! Refreshing merges rather than overwrites: an optional field the engine
//! does not report this round keeps whatever was learned before, byte
//! counters and `duration` never go backwards, and `timedout` never
//! resets. A depth set by protocol logic wins over the engine's.

use filescope_core::{Connection, FileRecord, FileView, Fuid};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::site::SiteClassifier;

/// Owner of all active file records.
#[derive(Debug, Default)]
pub struct Tracker {
    records: HashMap<Fuid, FileRecord>,
    pinned_depth: HashSet<Fuid>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `view.id`, created with `ts = view.last_active` if absent.
    pub fn ensure(&mut self, view: &FileView) -> &mut FileRecord {
        self.records.entry(view.id.clone()).or_insert_with(|| {
            debug!(fuid = %view.id, "tracking new file");
            FileRecord::new(view.id.clone(), view.last_active)
        })
    }

    /// Ensure a record exists and merge the engine's view into it.
    pub fn refresh(&mut self, view: &FileView) -> &mut FileRecord {
        let pinned = self.pinned_depth.contains(&view.id);
        let record = self.ensure(view);
        merge_view(record, view, pinned);
        record
    }

    /// Set the nesting depth; later engine views no longer change it.
    /// Returns false if the file is not tracked.
    pub fn set_depth(&mut self, fuid: &Fuid, depth: u32) -> bool {
        let Some(record) = self.records.get_mut(fuid) else {
            return false;
        };
        record.depth = depth;
        self.pinned_depth.insert(fuid.clone());
        true
    }

    /// Note that the file travelled over `conn`.
    ///
    /// The host that sent the file goes into `tx_hosts`, the other end into
    /// `rx_hosts`. `local_orig` is only set when local networks are
    /// configured. Returns false if the file is not tracked.
    pub fn record_connection(
        &mut self,
        fuid: &Fuid,
        conn: &Connection,
        is_orig: bool,
        site: &dyn SiteClassifier,
    ) -> bool {
        let Some(record) = self.records.get_mut(fuid) else {
            return false;
        };

        record.conn_uids.insert(conn.uid.clone());
        let tx = conn.transmitter(is_orig);
        record.tx_hosts.insert(tx);
        record.rx_hosts.insert(conn.receiver(is_orig));
        if site.has_local_nets() {
            record.local_orig = Some(site.is_local_addr(tx));
        }
        true
    }

    /// Set the sticky timed-out flag. Returns false if the file is not tracked.
    pub fn mark_timed_out(&mut self, fuid: &Fuid) -> bool {
        self.records.get_mut(fuid).map_or(false, |r| {
            r.timedout = true;
            true
        })
    }

    /// Release the finished record. Only the first call for an id returns it.
    pub fn finalize(&mut self, fuid: &Fuid) -> Option<FileRecord> {
        self.pinned_depth.remove(fuid);
        self.records.remove(fuid)
    }

    pub fn get(&self, fuid: &Fuid) -> Option<&FileRecord> {
        self.records.get(fuid)
    }

    pub fn get_mut(&mut self, fuid: &Fuid) -> Option<&mut FileRecord> {
        self.records.get_mut(fuid)
    }

    /// Whether the id has an active record
    pub fn is_active(&self, fuid: &Fuid) -> bool {
        self.records.contains_key(fuid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All active records, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }
}

fn merge_view(record: &mut FileRecord, view: &FileView, depth_pinned: bool) {
    if let Some(parent) = &view.parent_id {
        record.parent_fuid = Some(parent.clone());
    }
    if let Some(source) = &view.source {
        record.source = Some(source.clone());
    }
    if let Some(depth) = view.depth.filter(|_| !depth_pinned) {
        record.depth = depth;
    }

    let elapsed = view.last_active - record.ts;
    if elapsed > record.duration {
        record.duration = elapsed;
    }

    record.seen_bytes = record.seen_bytes.max(view.seen_bytes);
    if let Some(total) = view.total_bytes {
        record.total_bytes = Some(total);
    }
    record.missing_bytes = record.missing_bytes.max(view.missing_bytes);
    record.overflow_bytes = record.overflow_bytes.max(view.overflow_bytes);

    if let Some(is_orig) = view.is_orig {
        record.is_orig = Some(is_orig);
    }
    if let Some(mime) = &view.mime_type {
        record.mime_type = Some(mime.clone());
    }
}
