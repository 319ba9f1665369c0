//! Azure Application Insights sink.
//!
//! `write` only enqueues; a background task batches envelopes and posts them to
//! the ingestion endpoint. Export failures are reported on stderr and dropped.

use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{LogSink, SinkError};
use crate::telemetry::record::{Level, LogRecord, TRACE_ID_KEY};

pub const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInsightsConfig {
    pub instrumentation_key: String,
    pub ingestion_endpoint: String,
    pub service_name: String,
    pub max_batch_size: usize,
    pub max_batch_interval: Duration,
    pub queue_capacity: usize,
}

impl AppInsightsConfig {
    /// Returns `None` for an empty connection string.
    pub fn from_connection_string(connection_string: &str, service_name: &str) -> Option<Self> {
        let connection_string = connection_string.trim();
        if connection_string.is_empty() {
            return None;
        }

        let (ikey, endpoint) = parse_connection_string(connection_string);
        // A bare legacy instrumentation key has no `key=value` pairs.
        let instrumentation_key = ikey.unwrap_or_else(|| connection_string.to_string());

        let mut ingestion_endpoint =
            endpoint.unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_string());
        if !ingestion_endpoint.ends_with('/') {
            ingestion_endpoint.push('/');
        }

        Some(Self {
            instrumentation_key,
            ingestion_endpoint,
            service_name: service_name.to_string(),
            max_batch_size: 10,
            max_batch_interval: Duration::from_secs(2),
            queue_capacity: 1024,
        })
    }

    pub fn track_url(&self) -> String {
        format!("{}v2/track", self.ingestion_endpoint)
    }
}

/// Extracts `InstrumentationKey` and `IngestionEndpoint` (keys are case-insensitive).
pub fn parse_connection_string(cs: &str) -> (Option<String>, Option<String>) {
    let mut ikey = None;
    let mut endpoint = None;

    for part in cs.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if key.eq_ignore_ascii_case("InstrumentationKey") {
            ikey = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("IngestionEndpoint") {
            endpoint = Some(value.to_string());
        }
    }

    (ikey, endpoint)
}

fn severity(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 2,
        Level::Info => 1,
        Level::Debug => 0,
    }
}

fn property_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn envelope(config: &AppInsightsConfig, record: &LogRecord) -> Value {
    let mut properties = Map::with_capacity(record.attributes.len() + 1);
    properties.insert("service".into(), Value::String(config.service_name.clone()));
    for (key, value) in &record.attributes {
        properties.insert(key.clone(), Value::String(property_string(value)));
    }

    let mut tags = Map::new();
    tags.insert(
        "ai.cloud.role".into(),
        Value::String(config.service_name.clone()),
    );
    if let Some(trace_id) = record.attr(TRACE_ID_KEY).map(property_string) {
        tags.insert("ai.operation.id".into(), Value::String(trace_id));
    }

    json!({
        "name": format!(
            "Microsoft.ApplicationInsights.{}.Message",
            config.instrumentation_key.replace('-', "")
        ),
        "time": record.timestamp.to_rfc3339(),
        "iKey": config.instrumentation_key,
        "tags": tags,
        "data": {
            "baseType": "MessageData",
            "baseData": {
                "ver": 2,
                "message": record.message,
                "severityLevel": severity(record.level),
                "properties": properties,
            }
        }
    })
}

pub struct AppInsightsSink {
    config: AppInsightsConfig,
    tx: mpsc::Sender<Value>,
}

impl AppInsightsSink {
    /// Starts the exporter task. Must be called from within a tokio runtime.
    pub fn spawn(config: AppInsightsConfig, http: reqwest::Client) -> Self {
        let (sink, rx) = Self::channel(config);
        tokio::spawn(export_loop(
            rx,
            http,
            sink.config.track_url(),
            sink.config.max_batch_size,
            sink.config.max_batch_interval,
        ));
        sink
    }

    fn channel(config: AppInsightsConfig) -> (Self, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        (Self { config, tx }, rx)
    }
}

impl LogSink for AppInsightsSink {
    fn name(&self) -> &'static str {
        "app_insights"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.tx
            .try_send(envelope(&self.config, record))
            .map_err(|e| match e {
                TrySendError::Full(_) => SinkError::QueueFull,
                TrySendError::Closed(_) => SinkError::Closed,
            })
    }
}

async fn export_loop(
    mut rx: mpsc::Receiver<Value>,
    http: reqwest::Client,
    url: String,
    max_batch_size: usize,
    max_batch_interval: Duration,
) {
    let mut batch = Vec::with_capacity(max_batch_size);
    let mut ticker = tokio::time::interval(max_batch_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(item) => {
                    batch.push(item);
                    if batch.len() >= max_batch_size {
                        flush(&http, &url, &mut batch).await;
                    }
                }
                None => {
                    flush(&http, &url, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&http, &url, &mut batch).await;
                }
            }
        }
    }
}

async fn flush(http: &reqwest::Client, url: &str, batch: &mut Vec<Value>) {
    if batch.is_empty() {
        return;
    }
    let body = std::mem::take(batch);

    let sent = http
        .post(url)
        .json(&body)
        .send()
        .await
        .and_then(|res| res.error_for_status());

    if let Err(err) = sent {
        eprintln!("app insights export of {} records failed: {err}", body.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CS: &str = "InstrumentationKey=00000000-aaaa-bbbb-cccc-000000000000;\
                      IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com/;\
                      LiveEndpoint=https://westeurope.livediagnostics.monitor.azure.com/";

    #[test]
    fn parses_full_connection_string() {
        let (ikey, endpoint) = parse_connection_string(CS);
        assert_eq!(ikey.as_deref(), Some("00000000-aaaa-bbbb-cccc-000000000000"));
        assert_eq!(
            endpoint.as_deref(),
            Some("https://westeurope-5.in.applicationinsights.azure.com/")
        );
    }

    #[test]
    fn keys_are_case_insensitive() {
        let (ikey, endpoint) = parse_connection_string("instrumentationkey = k1 ;ingestionendpoint=https://x");
        assert_eq!(ikey.as_deref(), Some("k1"));
        assert_eq!(endpoint.as_deref(), Some("https://x"));
    }

    #[test]
    fn bare_key_falls_back_to_default_endpoint() {
        let cfg = AppInsightsConfig::from_connection_string("legacy-key", "svc").unwrap();
        assert_eq!(cfg.instrumentation_key, "legacy-key");
        assert_eq!(
            cfg.track_url(),
            "https://dc.services.visualstudio.com/v2/track"
        );
    }

    #[test]
    fn empty_connection_string_disables_sink() {
        assert!(AppInsightsConfig::from_connection_string("  ", "svc").is_none());
    }

    #[test]
    fn envelope_carries_trace_and_severity() {
        let cfg = AppInsightsConfig::from_connection_string(CS, "product-api").unwrap();
        let record = LogRecord::new(Level::Warn, "token rejected")
            .with_attr("status", 401)
            .with_attr(TRACE_ID_KEY, "abc123");

        let env = envelope(&cfg, &record);

        assert_eq!(env["tags"]["ai.operation.id"], "abc123");
        assert_eq!(env["data"]["baseData"]["severityLevel"], 2);
        assert_eq!(env["data"]["baseData"]["properties"]["status"], "401");
        assert_eq!(env["data"]["baseData"]["properties"]["service"], "product-api");
    }

    #[test]
    fn full_queue_is_reported_not_blocking() {
        let mut cfg = AppInsightsConfig::from_connection_string("k", "svc").unwrap();
        cfg.queue_capacity = 1;
        let (sink, _rx) = AppInsightsSink::channel(cfg);
        let record = LogRecord::new(Level::Info, "m");

        assert!(sink.write(&record).is_ok());
        assert!(matches!(sink.write(&record), Err(SinkError::QueueFull)));
    }

    #[test]
    fn closed_exporter_is_reported() {
        let cfg = AppInsightsConfig::from_connection_string("k", "svc").unwrap();
        let (sink, rx) = AppInsightsSink::channel(cfg);
        drop(rx);

        assert!(matches!(
            sink.write(&LogRecord::new(Level::Info, "m")),
            Err(SinkError::Closed)
        ));
    }
}
