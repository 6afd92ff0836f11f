//! In-memory log buffer fed by a tracing layer, served at `GET /api/logs`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: Map<String, Value>,
    #[serde(skip)]
    severity: Level,
}

/// Bounded, shared ring of recent log entries.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// A tracing layer that records into this buffer.
    pub fn layer(&self) -> LogCaptureLayer {
        LogCaptureLayer {
            buffer: self.clone(),
        }
    }

    fn push(&self, entry: LogEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The newest `limit` entries at `min_level` or more severe, oldest first.
    pub fn recent(&self, limit: usize, min_level: Option<Level>) -> Vec<LogEntry> {
        let limit = limit.clamp(1, self.capacity);
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };

        let mut logs = entries
            .iter()
            .rev()
            .filter(|e| min_level.is_none_or(|min| e.severity <= min))
            .take(limit)
            .cloned()
            .collect::<Vec<_>>();
        logs.reverse();
        logs
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; returns how many were removed.
    pub fn clear(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let cleared = entries.len();
        entries.clear();
        cleared
    }
}

pub struct LogCaptureLayer {
    buffer: LogBuffer,
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let message = visitor.message.unwrap_or_else(|| meta.name().to_string());

        self.buffer.push(LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: meta.level().to_string().to_lowercase(),
            target: meta.target().to_string(),
            message,
            fields: visitor.fields,
            severity: *meta.level(),
        });
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn record_field_value(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
            return;
        }
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field_value(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field_value(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_field_value(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_field_value(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_field_value(field, Value::from(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    fn capture(buffer: &LogBuffer, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(buffer.layer());
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn layer_records_message_and_fields() {
        let buffer = LogBuffer::new(10);
        capture(&buffer, || {
            tracing::info!(round = 3, winner = "alice", "Raffle winner drawn");
        });

        let logs = buffer.recent(10, None);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, "info");
        assert_eq!(logs[0].message, "Raffle winner drawn");
        assert_eq!(logs[0].fields["round"], 3);
        assert_eq!(logs[0].fields["winner"], "alice");
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let buffer = LogBuffer::new(3);
        capture(&buffer, || {
            for idx in 0..5 {
                tracing::info!("m{idx}");
            }
        });

        let logs = buffer.recent(10, None);
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn recent_applies_limit_and_level() {
        let buffer = LogBuffer::default();
        capture(&buffer, || {
            tracing::debug!("noise");
            tracing::warn!("retrying");
            tracing::info!("connected");
            tracing::error!("gave up");
        });

        let last_two = buffer.recent(2, None);
        assert_eq!(last_two[0].message, "connected");
        assert_eq!(last_two[1].message, "gave up");

        let warnings = buffer.recent(10, Some(Level::WARN));
        let messages: Vec<&str> = warnings.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["retrying", "gave up"]);

        assert_eq!(buffer.clear(), 4);
        assert!(buffer.is_empty());
    }
}
