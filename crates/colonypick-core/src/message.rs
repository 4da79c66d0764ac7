//! Operator-facing message dispatch.
//!
//! UI producers and background workers report through a [`MessageDispatcher`]
//! rather than writing to any widget directly. Sinks subscribe with a
//! [`SinkId`] handle and receive every message; the dispatcher also mirrors
//! messages onto `tracing` so the structured log stays complete even with no
//! sink registered.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Severity of an operator message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    /// Routine progress and confirmations
    Info,
    /// Recoverable anomalies (ack timeouts, refused commands)
    Warning,
    /// Failures that need operator attention
    Error,
    /// Unsolicited firmware output forwarded verbatim
    Firmware,
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Firmware => write!(f, "firmware"),
        }
    }
}

/// A single operator-facing log entry
#[derive(Debug, Clone)]
pub struct Message {
    /// Severity level
    pub level: MessageLevel,
    /// Message text
    pub text: String,
    /// Local wall-clock time the message was emitted
    pub timestamp: DateTime<Local>,
}

impl Message {
    /// Create a message stamped with the current local time
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// Handle for a registered message sink.
///
/// Uniquely identifies a subscription. Used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sink({})", &self.0.to_string()[..8])
    }
}

/// Sink trait for operator messages
///
/// Implement this trait to receive every message the pipeline emits.
/// Implementations must not block: they run on whichever thread emitted
/// the message.
pub trait MessageSink: Send + Sync {
    /// Called for every dispatched message
    fn message(&self, message: &Message);
}

/// Central fan-out point for operator messages
#[derive(Default)]
pub struct MessageDispatcher {
    sinks: RwLock<HashMap<SinkId, Arc<dyn MessageSink>>>,
}

impl MessageDispatcher {
    /// Create a dispatcher with no sinks registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink; returns the handle used to unregister it
    pub fn register(&self, sink: Arc<dyn MessageSink>) -> SinkId {
        let id = SinkId::new();
        self.sinks.write().insert(id, sink);
        id
    }

    /// Remove a previously registered sink
    pub fn unregister(&self, id: SinkId) {
        self.sinks.write().remove(&id);
    }

    /// Dispatch a message to every registered sink
    pub fn dispatch(&self, message: Message) {
        match message.level {
            MessageLevel::Info => tracing::info!("{}", message.text),
            MessageLevel::Warning => tracing::warn!("{}", message.text),
            MessageLevel::Error => tracing::error!("{}", message.text),
            MessageLevel::Firmware => tracing::debug!(target: "firmware", "{}", message.text),
        }
        let sinks = self.sinks.read();
        for sink in sinks.values() {
            sink.message(&message);
        }
    }

    /// Dispatch an info-level message
    pub fn info(&self, text: impl Into<String>) {
        self.dispatch(Message::new(MessageLevel::Info, text));
    }

    /// Dispatch a warning-level message
    pub fn warn(&self, text: impl Into<String>) {
        self.dispatch(Message::new(MessageLevel::Warning, text));
    }

    /// Dispatch an error-level message
    pub fn error(&self, text: impl Into<String>) {
        self.dispatch(Message::new(MessageLevel::Error, text));
    }

    /// Forward an unsolicited firmware line
    pub fn firmware(&self, line: impl Into<String>) {
        self.dispatch(Message::new(MessageLevel::Firmware, line));
    }
}
