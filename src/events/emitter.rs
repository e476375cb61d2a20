//! Process-wide event emitter.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::{json, Value};

use crate::config::EmitterConfig;
use crate::events::event::{into_fields, Fields};
use crate::events::sink::{DailyFileSink, EventSink, MemorySink};
use crate::events::{Level, LogEvent};
use crate::observability::metrics;

const RESERVED_KEYS: [&str; 3] = ["timestamp", "level", "message"];

struct EmitterInner {
    sink: Box<dyn EventSink>,
    min_level: Level,
    console: bool,
    defaults: Fields,
}

/// Append-only structured event emitter.
///
/// Cheap to clone; all clones share one sink. Every event carries the
/// configured `service` and `environment` fields.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl EventEmitter {
    pub fn new(sink: impl EventSink + 'static, config: &EmitterConfig) -> Self {
        let mut defaults = Fields::new();
        defaults.insert("service".into(), Value::String(config.service.clone()));
        defaults.insert("environment".into(), Value::String(config.environment.clone()));

        Self {
            inner: Arc::new(EmitterInner {
                sink: Box::new(sink),
                min_level: config.effective_min_level(),
                console: config.console_enabled(),
                defaults,
            }),
        }
    }

    /// Emitter writing the daily general and error-only file streams.
    pub fn daily_files(config: &EmitterConfig) -> Self {
        tracing::info!(
            dir = ?config.log_dir,
            service = %config.service,
            max_file_size_bytes = config.max_file_size_bytes,
            "Event streams configured"
        );
        Self::new(DailyFileSink::new(config), config)
    }

    /// Emitter backed by an in-memory buffer, returned alongside it.
    pub fn in_memory(config: &EmitterConfig) -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (Self::new(sink.clone(), config), sink)
    }

    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    pub fn emit(&self, level: Level, message: &str, fields: Value) {
        self.emit_at(Local::now(), level, message, fields);
    }

    /// Emit with an explicit timestamp; the day partition follows `at`.
    pub fn emit_at(&self, at: DateTime<Local>, level: Level, message: &str, fields: Value) {
        if !level.passes(self.inner.min_level) {
            return;
        }

        let mut merged = self.inner.defaults.clone();
        for (key, value) in into_fields(fields) {
            if RESERVED_KEYS.contains(&key.as_str()) {
                merged.insert(format!("_{}", key), value);
            } else {
                merged.insert(key, value);
            }
        }

        let event = LogEvent::new(at, level, message, merged);
        if self.inner.console {
            mirror(&event);
        }
        metrics::record_event(level);

        if let Err(e) = self.inner.sink.write(&event, at.date_naive()) {
            tracing::error!(error = %e, message = %event.message, "Failed to write event");
        }
    }

    pub fn error(&self, message: &str, fields: Value) {
        self.emit(Level::Error, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Value) {
        self.emit(Level::Warn, message, fields);
    }

    pub fn info(&self, message: &str, fields: Value) {
        self.emit(Level::Info, message, fields);
    }

    pub fn debug(&self, message: &str, fields: Value) {
        self.emit(Level::Debug, message, fields);
    }

    /// "Authentication Event" with an `event` discriminator
    /// (`login_success`, `login_failed`, `user_registered`, ...).
    pub fn log_auth(&self, event: &str, user_id: Option<&str>, details: Value) {
        let mut fields = into_fields(json!({
            "event": event,
            "userId": user_id,
        }));
        fields.extend(into_fields(details));
        self.info("Authentication Event", Value::Object(fields));
    }

    /// "Application Error" carrying the error text, its source chain and `context`.
    pub fn log_error(&self, error: &dyn std::error::Error, context: Value) {
        let mut fields = into_fields(json!({
            "error": error.to_string(),
            "stack": error_chain(error),
        }));
        fields.extend(into_fields(context));
        self.error("Application Error", Value::Object(fields));
    }

    /// "Database Operation" record.
    pub fn log_database(&self, operation: &str, collection: &str, details: Value) {
        let mut fields = into_fields(json!({
            "operation": operation,
            "collection": collection,
        }));
        fields.extend(into_fields(details));
        self.info("Database Operation", Value::Object(fields));
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn mirror(event: &LogEvent) {
    let fields = serde_json::to_string(&event.fields).unwrap_or_default();
    match event.level {
        Level::Error => tracing::error!(target: "events", fields = %fields, "{}", event.message),
        Level::Warn => tracing::warn!(target: "events", fields = %fields, "{}", event.message),
        Level::Info => tracing::info!(target: "events", fields = %fields, "{}", event.message),
        Level::Debug => tracing::debug!(target: "events", fields = %fields, "{}", event.message),
    }
}
