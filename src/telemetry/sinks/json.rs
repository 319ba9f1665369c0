use std::{
    io::{self, Write},
    sync::Mutex,
};

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use super::{LogSink, SinkError};
use crate::telemetry::record::LogRecord;

/// One JSON object per line (`time`, `level`, `msg`, then the attributes).
pub struct JsonSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

pub(crate) fn to_json(record: &LogRecord) -> Value {
    let mut obj = Map::with_capacity(record.attributes.len() + 3);
    obj.insert(
        "time".into(),
        Value::String(record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    obj.insert("level".into(), Value::String(record.level.to_string()));
    obj.insert("msg".into(), Value::String(record.message.clone()));
    for (key, value) in &record.attributes {
        obj.insert(key.clone(), value.clone());
    }
    Value::Object(obj)
}

impl LogSink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&to_json(record))
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        line.push(b'\n');

        let mut out = self.out.lock().map_err(|_| SinkError::Closed)?;
        out.write_all(&line)
            .and_then(|_| out.flush())
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
