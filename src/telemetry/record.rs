/*
 * Responsibility
 * - Structured log record flowing through the fan-out handler chain
 * - Per-request logging context (trace id resolved from the request span)
 */
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Attribute key under which the request trace id is injected.
pub const TRACE_ID_KEY: &str = "trace_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            // TRACE collapses into DEBUG; sinks only know four severities
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Ordered key/value pairs. Later entries win when a sink flattens them.
    pub attributes: Vec<(String, Value)>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Last value recorded under `key`, if any.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.attr(TRACE_ID_KEY).and_then(Value::as_str)
    }
}

/// What the fan-out handler can see of the request being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub trace_id: Option<String>,
}

impl LogContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
        }
    }
}
