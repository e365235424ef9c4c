//! Event reporting for connection failures, backend write failures and index creation.
//!
//! Components receive an [`EventSink`] when they are constructed and report through it.
//! [`TracingSink`] forwards events to `tracing`, [`SilentSink`] drops them and
//! [`RecordingSink`] keeps them in memory.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// A failure the caller should know about.
    Error,
    /// A degraded but recoverable condition.
    Warn,
    /// A notable state change.
    Info,
    /// Diagnostic detail.
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// A structured log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Severity.
    pub level: Level,
    /// Human readable message.
    pub message: String,
    /// The operation that produced the event, e.g. `Indexer::upsert`.
    pub origin: &'static str,
}

impl Event {
    /// Creates an event.
    pub fn new(level: Level, origin: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            origin,
        }
    }
}

/// Receives events from the engine.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &Event);

    /// Records an error-level event.
    fn error(&self, origin: &'static str, message: &str) {
        self.record(&Event::new(Level::Error, origin, message));
    }

    /// Records a debug-level event.
    fn debug(&self, origin: &'static str, message: &str) {
        self.record(&Event::new(Level::Debug, origin, message));
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        let origin = event.origin;
        match event.level {
            Level::Error => tracing::error!(origin, "{}", event.message),
            Level::Warn => tracing::warn!(origin, "{}", event.message),
            Level::Info => tracing::info!(origin, "{}", event.message),
            Level::Debug => tracing::debug!(origin, "{}", event.message),
        }
    }
}

/// Drops all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl EventSink for SilentSink {
    fn record(&self, _event: &Event) {}
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the messages of all events at `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
