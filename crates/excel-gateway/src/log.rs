//! Failure log sink
//!
//! Every failed facade operation is reported exactly once through a
//! [`LogSink`] before the caller sees the failure sentinel.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Receives one entry per failed operation.
pub trait LogSink: Send + Sync {
    fn log(&self, component: &str, operation: &str, error: &dyn fmt::Display);
}

/// Forwards failures to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, component: &str, operation: &str, error: &dyn fmt::Display) {
        tracing::warn!(component, operation, error = %error, "spreadsheet operation failed");
    }
}

/// One captured failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub component: String,
    pub operation: String,
    pub message: String,
}

/// Keeps failures in memory, for embedding hosts that surface them in their own UI.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, component: &str, operation: &str, error: &dyn fmt::Display) {
        self.entries.lock().push(LogEntry {
            component: component.to_string(),
            operation: operation.to_string(),
            message: error.to_string(),
        });
    }
}
