//! Destinations for finished file records (the files log).

use filescope_core::{FileRecord, FilesError, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Accepts one finished record per call.
pub trait FileLogSink: Send {
    /// Persist a record.
    fn write(&mut self, record: &FileRecord) -> Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FileLogSink + ?Sized> FileLogSink for Box<S> {
    fn write(&mut self, record: &FileRecord) -> Result<()> {
        (**self).write(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FileLogSink for NullSink {
    fn write(&mut self, _record: &FileRecord) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: W,
    written: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub const fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Records written so far
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FileLogSink for JsonLinesSink<W> {
    fn write(&mut self, record: &FileRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(FilesError::from)
    }
}

/// Collects records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<FileRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn records(&self) -> Vec<FileRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileLogSink for MemorySink {
    fn write(&mut self, record: &FileRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|e| FilesError::Sink(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}
