//! Log sinks: the backends a `FanoutHandler` delivers to.
//!
//! A sink owns its transport and reports failures through `SinkError`; the
//! fan-out handler isolates them so one broken backend never affects the others.

use thiserror::Error;

use super::record::LogRecord;

pub mod app_insights;
pub mod json;
pub mod memory;

pub use app_insights::{AppInsightsConfig, AppInsightsSink};
pub use json::JsonSink;
pub use memory::MemorySink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport error: {0}")]
    Transport(String),
    #[error("sink queue is full")]
    QueueFull,
    #[error("sink is closed")]
    Closed,
    #[error("sink panicked")]
    Panicked,
}

pub trait LogSink: Send + Sync {
    /// Short backend name used when reporting failures.
    fn name(&self) -> &'static str;

    /// Must not block on network I/O.
    fn write(&self, record: &LogRecord) -> Result<(), SinkError>;
}
