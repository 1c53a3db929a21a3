//! Typed event catalog for session progress reporting
//!
//! Producers emit typed events through an [`EventSink`]; the stream renderer
//! subscribes and turns them into verbosity-gated terminal output. The
//! pipeline never prints progress directly.

use std::path::PathBuf;
use std::time::Duration;

/// Events emitted across a session: lifecycle, plugin loading, planning,
/// compilation, verification, and cache activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedmEvent {
    /// Emitted once at the start of a run, before any processing.
    SessionStarted {
        version: String,
        config_source: String,
        input_kind: String,
        output_kind: String,
    },
    /// Emitted after the plugin registry has been populated.
    PluginsLoaded {
        discovered: usize,
        loaded: usize,
        warnings: Vec<String>,
    },
    PlanningStarted {
        file_count: usize,
    },
    FilePlanned {
        file_path: PathBuf,
        index: usize,
        total: usize,
    },
    FilePlanError {
        file_path: PathBuf,
        index: usize,
        total: usize,
        message: String,
    },
    PlanningComplete {
        file_count: usize,
        error_count: usize,
    },
    CompilationStarted {
        file_count: usize,
    },
    FileStarted {
        file_path: PathBuf,
        node_count: usize,
        index: usize,
        total: usize,
    },
    /// Emitted after each node in a file's plan tree is compiled.
    NodeCompiled {
        file_path: PathBuf,
        node_index: usize,
        node_count: usize,
    },
    FileCompleted {
        file_path: PathBuf,
        output_path: PathBuf,
        elapsed: Duration,
        index: usize,
        total: usize,
    },
    FileError {
        file_path: PathBuf,
        message: String,
        index: usize,
        total: usize,
    },
    /// Emitted per file in verify mode; status is `up-to-date`, `stale`,
    /// or `missing`.
    FileVerified {
        file_path: PathBuf,
        status: String,
    },
    CompilationComplete {
        ok_count: usize,
        error_count: usize,
    },
    /// Emitted once after all processing has finished.
    SessionComplete {
        ok_count: usize,
        warning_count: usize,
        error_count: usize,
        elapsed: Duration,
    },
    /// Cache activity; kind is `hit`, `miss`, or `eviction`.
    Cache {
        kind: String,
        key: PathBuf,
    },
}

/// Receiver for session events.
///
/// Implementations must tolerate every event variant; unknown-to-them
/// variants are simply ignored.
pub trait EventSink {
    fn emit(&self, event: &EmbedmEvent);
}

/// Sink that drops every event. Useful for library callers and tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EmbedmEvent) {}
}

/// Sink that records events for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::cell::RefCell<Vec<EmbedmEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EmbedmEvent> {
        self.events.borrow().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &EmbedmEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
