//! # filescope
//!
//! Orchestration layer between a file-extraction engine and the content
//! analyzers hanging off it.
//!
//! The engine reassembles files out of network traffic (or other sources)
//! and raises lifecycle signals. This crate keeps a metadata record per
//! file, lets protocol logic name and describe files and attach or detach
//! analyzers, and writes each record to the files log once the file is
//! gone.
//!
//! ## Data Flow
//!
//! ```text
//! engine signal ──► Dispatcher ──► Tracker (refresh, connection, timeout)
//!                        │
//!                        └─ file_state_remove ──► files log sink
//!
//! protocol logic ──► Session::add_analyzer / remove_analyzer / stop
//!                        │
//!                        ├─ AnalyzerCallbacks (pre-attach hook)
//!                        └─ Engine primitives
//!
//! engine handle request ──► ProtocolRegistry ──► Engine::set_file_handle
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use filescope::{sim, Dispatcher, MemorySink, Session, SimEngine};
//!
//! let sink = MemorySink::new();
//! let mut session = Session::builder(SimEngine::new(chrono::Utc::now()))
//!     .sink(sink.clone())
//!     .build()?;
//! let dispatcher = Dispatcher::new();
//!
//! if let Some(signal) = session.engine_mut().open("Fx".into(), Some("HTTP"), None) {
//!     dispatcher.dispatch(&mut session, &signal);
//! }
//! sim::close(&dispatcher, &mut session, &"Fx".into());
//! assert_eq!(sink.len(), 1);
//! ```

pub mod callbacks;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod orchestrator;
pub mod protocol;
pub mod pump;
pub mod session;
pub mod sim;
pub mod sink;
pub mod site;
pub mod tracker;

// Re-exports for convenience.
pub use callbacks::AnalyzerCallbacks;
pub use config::FilesConfig;
pub use dispatch::{Dispatcher, CORE_PRIORITY, LOG_PRIORITY};
pub use engine::Engine;
pub use filescope_core::*;
pub use protocol::{ProtocolRegistration, ProtocolRegistry};
pub use pump::PumpHandle;
pub use session::{Session, SessionBuilder};
pub use sim::SimEngine;
pub use sink::{FileLogSink, JsonLinesSink, MemorySink, NullSink};
pub use site::{LocalNets, NoLocalNets, SiteClassifier};
pub use tracker::Tracker;
