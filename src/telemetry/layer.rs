//! Bridge from `tracing` to the fan-out handler.
//!
//! Spans that declare a `trace_id` field stash it in their extensions; every
//! event is converted into a `LogRecord` and emitted with the trace id of the
//! closest enclosing span that has one.

use std::fmt;

use serde_json::Value;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
    span,
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use super::handler::SharedHandler;
use super::record::{Level, LogContext, LogRecord, TRACE_ID_KEY};

/// HTTP client crates used by the sinks themselves. Forwarding their events
/// would make an exporting sink log its own exports.
const SINK_TRANSPORT_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

fn is_sink_transport(target: &str) -> bool {
    SINK_TRANSPORT_TARGETS.iter().any(|t| {
        target
            .strip_prefix(t)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

pub struct FanoutLayer {
    handler: SharedHandler,
}

impl FanoutLayer {
    pub fn new(handler: SharedHandler) -> Self {
        Self { handler }
    }
}

struct SpanTraceId(String);

#[derive(Default)]
struct TraceIdVisitor(Option<String>);

impl Visit for TraceIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == TRACE_ID_KEY {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == TRACE_ID_KEY {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    attributes: Vec<(String, Value)>,
}

impl EventVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        self.attributes.push((field.name().to_string(), value));
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.push(field, Value::String(rendered));
        }
    }
}

impl<S> Layer<S> for FanoutLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = TraceIdVisitor::default();
        attrs.record(&mut visitor);

        if let (Some(trace_id), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(SpanTraceId(trace_id));
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = TraceIdVisitor::default();
        values.record(&mut visitor);

        if let (Some(trace_id), Some(span)) = (visitor.0, ctx.span(id)) {
            let mut ext = span.extensions_mut();
            ext.remove::<SpanTraceId>();
            ext.insert(SpanTraceId(trace_id));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if is_sink_transport(event.metadata().target()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let trace_id = ctx.event_scope(event).and_then(|mut scope| {
            scope.find_map(|span| span.extensions().get::<SpanTraceId>().map(|t| t.0.clone()))
        });

        let metadata = event.metadata();
        let mut record = LogRecord::new(
            Level::from(metadata.level()),
            visitor.message.unwrap_or_default(),
        );
        record.attributes = visitor.attributes;
        record
            .attributes
            .push(("target".to_string(), Value::from(metadata.target())));

        let cx = LogContext { trace_id };
        self.handler.emit(&cx, record);
    }
}
