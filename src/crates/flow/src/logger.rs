//! Pluggable logging sink.
//!
//! The engine never talks to a logging backend directly. Workers and the
//! executor report through a [`Logger`]; [`Options`](crate::Options) chooses the
//! implementation and a [`FlowContext`](crate::FlowContext) may override it for a
//! single flow.
//!
//! - [`NoLogging`] - discards everything (default)
//! - [`TracingLogger`] - forwards to `tracing` under the `xgraph_flow` target
//! - [`CapturingLogger`] - keeps entries in memory for assertions

use parking_lot::Mutex;
use std::fmt;

/// Sink for engine diagnostics.
///
/// `detail` carries pre-rendered `key=value` pairs and is only formatted by
/// implementations that keep it.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str, detail: fmt::Arguments<'_>);

    fn warn(&self, message: &str, detail: fmt::Arguments<'_>);
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLogging;

impl Logger for NoLogging {
    fn log(&self, _message: &str, _detail: fmt::Arguments<'_>) {}

    fn warn(&self, _message: &str, _detail: fmt::Arguments<'_>) {}
}

/// Forwards to `tracing`: `log` at debug level, `warn` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str, detail: fmt::Arguments<'_>) {
        tracing::debug!(target: "xgraph_flow", detail = %detail, "{}", message);
    }

    fn warn(&self, message: &str, detail: fmt::Arguments<'_>) {
        tracing::warn!(target: "xgraph_flow", detail = %detail, "{}", message);
    }
}

/// Severity of a captured entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

/// A captured entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub detail: String,
}

/// Records entries in memory.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn warnings(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == Level::Warn)
            .cloned()
            .collect()
    }

    fn record(&self, level: Level, message: &str, detail: fmt::Arguments<'_>) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.to_string(),
            detail: detail.to_string(),
        });
    }
}

impl Logger for CapturingLogger {
    fn log(&self, message: &str, detail: fmt::Arguments<'_>) {
        self.record(Level::Info, message, detail);
    }

    fn warn(&self, message: &str, detail: fmt::Arguments<'_>) {
        self.record(Level::Warn, message, detail);
    }
}
