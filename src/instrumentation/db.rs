//! Database operation records.

use std::error::Error;
use std::time::Duration;

use serde_json::{json, Value};

use crate::events::EventEmitter;
use crate::instrumentation::performance::format_millis;

/// Emits one event per database call; slow calls are warnings.
#[derive(Clone)]
pub struct DbLogger {
    emitter: EventEmitter,
    slow_threshold: Duration,
}

impl DbLogger {
    pub fn new(emitter: EventEmitter, slow_threshold: Duration) -> Self {
        Self { emitter, slow_threshold }
    }

    pub fn log_query(
        &self,
        model: &str,
        operation: &str,
        query: Value,
        result_count: usize,
        execution_time: Duration,
    ) {
        let mut fields = json!({
            "model": model,
            "operation": operation,
            "query": query,
            "executionTime": format_millis(execution_time),
            "resultCount": result_count,
        });

        if execution_time > self.slow_threshold {
            fields["performance"] = json!("slow_query");
            self.emitter.warn("Slow Database Query", fields);
        } else {
            self.emitter.info("Database Operation", fields);
        }
    }

    pub fn log_error(&self, model: &str, operation: &str, query: Value, error: &dyn Error) {
        self.emitter.error(
            "Database Error",
            json!({
                "model": model,
                "operation": operation,
                "query": query,
                "error": error.to_string(),
                "database": "error",
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmitterConfig;

    #[test]
    fn test_slow_query_flagged() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        let db = DbLogger::new(emitter, Duration::from_millis(1000));

        db.log_query("Recipe", "find", json!({"userId": "u1"}), 3, Duration::from_millis(40));
        db.log_query("Recipe", "find", json!({}), 2500, Duration::from_millis(8200));

        let events = sink.events();
        assert_eq!(events[0].message, "Database Operation");
        assert_eq!(events[0].field("resultCount"), Some(&json!(3)));
        assert_eq!(events[1].message, "Slow Database Query");
        assert_eq!(events[1].str_field("performance"), Some("slow_query"));
        assert_eq!(events[1].str_field("executionTime"), Some("8200ms"));
    }

    #[test]
    fn test_error_record() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        let db = DbLogger::new(emitter, Duration::from_millis(1000));
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "MongoTimeoutError: selection timed out");

        db.log_error("User", "findUser", json!({"email": "a@b"}), &err);

        let event = sink.find("Database Error").unwrap();
        assert_eq!(event.str_field("error"), Some("MongoTimeoutError: selection timed out"));
        assert_eq!(event.str_field("database"), Some("error"));
    }
}
