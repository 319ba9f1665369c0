use std::sync::{Arc, Mutex};

use super::{LogSink, SinkError};
use crate::telemetry::record::LogRecord;

/// Collects records in memory. Cheap to clone; clones share the buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Closed)?
            .push(record.clone());
        Ok(())
    }
}
