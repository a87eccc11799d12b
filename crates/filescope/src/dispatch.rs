//! Priority-ordered lifecycle dispatch.
//!
//! Each signal kind has an ordered list of handlers. Higher priority runs
//! first; equal priorities run in registration order. A signal's whole
//! chain runs before the next signal is looked at, so a record is never
//! observed half-updated.
//!
//! Built-in handlers:
//!
//! ```text
//! file_new                  prio  10  refresh (creates the record)
//! file_over_new_connection  prio  10  refresh + connection context
//! file_timeout              prio  10  refresh + timedout = true
//! file_state_remove         prio  10  refresh
//! file_state_remove         prio -10  write to files log
//! ```

use filescope_core::{Result, Signal, SignalKind};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::session::Session;

/// Priority of the metadata handlers.
pub const CORE_PRIORITY: i32 = 10;

/// Priority of the files-log writer. Below every metadata handler.
pub const LOG_PRIORITY: i32 = -10;

/// A lifecycle handler.
pub type Handler<E> = Box<dyn Fn(&mut Session<E>, &Signal) -> Result<()> + Send>;

struct Entry<E> {
    name: Cow<'static, str>,
    priority: i32,
    handler: Handler<E>,
}

pub struct Dispatcher<E> {
    table: BTreeMap<SignalKind, Vec<Entry<E>>>,
}

impl<E: Engine + 'static> Dispatcher<E> {
    /// Dispatcher with the built-in metadata and logging handlers.
    pub fn new() -> Self {
        let mut d = Self::empty();
        d.register(SignalKind::New, CORE_PRIORITY, "files::set_info", on_new::<E>);
        d.register(
            SignalKind::OverNewConnection,
            CORE_PRIORITY,
            "files::connection",
            on_over_new_connection::<E>,
        );
        d.register(SignalKind::Timeout, CORE_PRIORITY, "files::timeout", on_timeout::<E>);
        d.register(
            SignalKind::StateRemove,
            CORE_PRIORITY,
            "files::set_info",
            on_state_remove::<E>,
        );
        d.register(SignalKind::StateRemove, LOG_PRIORITY, "files::log", on_log::<E>);
        d
    }

    /// Dispatcher with no handlers at all.
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Add a handler for `kind`.
    pub fn register<F>(
        &mut self,
        kind: SignalKind,
        priority: i32,
        name: impl Into<Cow<'static, str>>,
        handler: F,
    ) where
        F: Fn(&mut Session<E>, &Signal) -> Result<()> + Send + 'static,
    {
        let entries = self.table.entry(kind).or_default();
        let pos = entries.partition_point(|e| e.priority >= priority);
        entries.insert(
            pos,
            Entry {
                name: name.into(),
                priority,
                handler: Box::new(handler),
            },
        );
    }

    /// Run every handler for the signal, highest priority first.
    ///
    /// Handler errors are reported and do not stop the chain.
    pub fn dispatch(&self, session: &mut Session<E>, signal: &Signal) {
        let kind = signal.kind();
        let fuid = &signal.file().id;
        debug!(fuid = %fuid, signal = %kind, "dispatching");

        let Some(entries) = self.table.get(&kind) else {
            return;
        };
        for entry in entries {
            if let Err(e) = (entry.handler)(session, signal) {
                if e.is_benign() {
                    debug!(fuid = %fuid, handler = %entry.name, error = %e, "handler skipped");
                } else {
                    warn!(fuid = %fuid, handler = %entry.name, error = %e, "handler failed");
                }
            }
        }
    }

    /// Handler names for `kind`, in execution order
    pub fn handlers(&self, kind: SignalKind) -> Vec<(&str, i32)> {
        self.table
            .get(&kind)
            .map(|entries| entries.iter().map(|e| (e.name.as_ref(), e.priority)).collect())
            .unwrap_or_default()
    }
}

impl<E: Engine + 'static> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, entries) in &self.table {
            let names: Vec<_> = entries.iter().map(|e| (&e.name, e.priority)).collect();
            map.entry(kind, &names);
        }
        map.finish()
    }
}

fn on_new<E: Engine>(session: &mut Session<E>, signal: &Signal) -> Result<()> {
    session.refresh(signal.file());
    Ok(())
}

fn on_over_new_connection<E: Engine>(session: &mut Session<E>, signal: &Signal) -> Result<()> {
    if let Signal::OverNewConnection {
        file,
        conn,
        is_orig,
    } = signal
    {
        session.record_connection(file, conn, *is_orig);
    }
    Ok(())
}

fn on_timeout<E: Engine>(session: &mut Session<E>, signal: &Signal) -> Result<()> {
    session.mark_timed_out(signal.file());
    Ok(())
}

fn on_state_remove<E: Engine>(session: &mut Session<E>, signal: &Signal) -> Result<()> {
    session.refresh(signal.file());
    Ok(())
}

fn on_log<E: Engine>(session: &mut Session<E>, signal: &Signal) -> Result<()> {
    session.log_file(&signal.file().id);
    Ok(())
}
