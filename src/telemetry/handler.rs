//! Log fan-out handler and its derived views.
//!
//! A `FanoutHandler` owns a fixed set of sinks. `with_attributes` / `with_group`
//! never touch the handler they are called on; they wrap it in a thin view that
//! holds only the increment (extra attributes or one group segment) and delegates
//! to the parent after rewriting the record.
//!
//! Composition follows the usual structured-logging rules:
//! - attributes bound by `with_attributes` precede the record's own attributes
//! - a group qualifies every key added *after* it, including later `with_attributes`
//! - nested groups are dot-joined (`outer.inner.key`)
//! - `trace_id` is injected at the root, outside of any group

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde_json::Value;

use super::record::{LogContext, LogRecord, TRACE_ID_KEY};
use super::sinks::{LogSink, SinkError};

pub trait LogHandler: Send + Sync {
    /// Deliver `record`. Never fails and never panics into the caller.
    fn emit(&self, cx: &LogContext, record: LogRecord);
}

pub type SharedHandler = Arc<dyn LogHandler>;

/// Derivation helpers. Each call allocates a new immutable view.
pub trait LogHandlerExt {
    fn with_attributes<K, V, I>(&self, attrs: I) -> SharedHandler
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>;

    fn with_group(&self, name: impl Into<String>) -> SharedHandler;
}

impl LogHandlerExt for SharedHandler {
    fn with_attributes<K, V, I>(&self, attrs: I) -> SharedHandler
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let attrs: Vec<(String, Value)> = attrs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if attrs.is_empty() {
            return Arc::clone(self);
        }

        Arc::new(WithAttributes {
            parent: Arc::clone(self),
            attrs,
        })
    }

    fn with_group(&self, name: impl Into<String>) -> SharedHandler {
        let name = name.into();
        if name.is_empty() {
            return Arc::clone(self);
        }

        Arc::new(WithGroup {
            parent: Arc::clone(self),
            name,
        })
    }
}

/// Root of a handler chain: multiplexes records to every registered sink.
pub struct FanoutHandler {
    sinks: Vec<Arc<dyn LogSink>>,
    failures: AtomicU64,
}

impl FanoutHandler {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            sinks,
            failures: AtomicU64::new(0),
        }
    }

    pub fn into_shared(self) -> SharedHandler {
        Arc::new(self)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Number of sink deliveries that failed since startup.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn report_failure(&self, sink: &'static str, err: &SinkError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        // stderr, not tracing: a failing sink must not feed back into itself
        eprintln!("log sink '{sink}' failed: {err}");
    }
}

impl LogHandler for FanoutHandler {
    fn emit(&self, cx: &LogContext, mut record: LogRecord) {
        if let Some(trace_id) = &cx.trace_id {
            record
                .attributes
                .push((TRACE_ID_KEY.to_string(), Value::String(trace_id.clone())));
        }

        for sink in &self.sinks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.write(&record)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.report_failure(sink.name(), &err),
                Err(_) => self.report_failure(sink.name(), &SinkError::Panicked),
            }
        }
    }
}

struct WithAttributes {
    parent: SharedHandler,
    attrs: Vec<(String, Value)>,
}

impl LogHandler for WithAttributes {
    fn emit(&self, cx: &LogContext, mut record: LogRecord) {
        let mut merged = Vec::with_capacity(self.attrs.len() + record.attributes.len());
        merged.extend(self.attrs.iter().cloned());
        merged.append(&mut record.attributes);
        record.attributes = merged;

        self.parent.emit(cx, record);
    }
}

struct WithGroup {
    parent: SharedHandler,
    name: String,
}

impl LogHandler for WithGroup {
    fn emit(&self, cx: &LogContext, mut record: LogRecord) {
        for (key, _) in record.attributes.iter_mut() {
            *key = format!("{}.{}", self.name, key);
        }

        self.parent.emit(cx, record);
    }
}
