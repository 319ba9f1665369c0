/*
 * Responsibility
 * - Structured log pipeline: tracing events -> FanoutLayer -> handler chain -> sinks
 * - Sink selection from config (stdout JSON always, App Insights when configured)
 */
pub mod handler;
pub mod layer;
pub mod record;
pub mod sinks;

use std::sync::Arc;

pub use handler::{FanoutHandler, LogHandler, LogHandlerExt, SharedHandler};
pub use layer::FanoutLayer;
pub use record::{Level, LogContext, LogRecord, TRACE_ID_KEY};
pub use sinks::{AppInsightsConfig, AppInsightsSink, JsonSink, LogSink, MemorySink, SinkError};

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub app_insights_connection_string: Option<String>,
}

/// Builds the process-wide fan-out handler. Spawns the App Insights exporter,
/// so this must run inside the tokio runtime.
pub fn build_handler(config: &TelemetryConfig) -> FanoutHandler {
    let mut sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(JsonSink::stdout())];

    if let Some(ai) = config
        .app_insights_connection_string
        .as_deref()
        .and_then(|cs| AppInsightsConfig::from_connection_string(cs, &config.service_name))
    {
        sinks.push(Arc::new(AppInsightsSink::spawn(ai, reqwest::Client::new())));
    }

    FanoutHandler::new(sinks)
}
