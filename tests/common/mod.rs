//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use telemetry_pipeline::config::TelemetryConfig;
use telemetry_pipeline::events::{general_log_path, EventEmitter, MemorySink};
use telemetry_pipeline::http::server::{build_router, AppState};
use telemetry_pipeline::http::HttpServer;
use telemetry_pipeline::instrumentation::Instrumentation;
use telemetry_pipeline::lifecycle::Shutdown;

/// Config writing into `log_dir` with the admin API enabled.
pub fn test_config(log_dir: &Path) -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.emitter.log_dir = log_dir.to_path_buf();
    config.emitter.service = "recipes".to_string();
    config.emitter.console = Some(false);
    config.admin.enabled = true;
    config.admin.api_key = "test-key".to_string();
    config
}

/// Router backed by an in-memory sink.
pub fn memory_router(config: &TelemetryConfig) -> (Router, MemorySink, Arc<Instrumentation>) {
    let (emitter, sink) = EventEmitter::in_memory(&config.emitter);
    let instrumentation = Arc::new(Instrumentation::new(&config.instrumentation, emitter).unwrap());
    let state = AppState::new(config, instrumentation.clone());
    (build_router(config, state), sink, instrumentation)
}

/// Run a real host writing daily files. Returns its address.
pub async fn start_host(config: &TelemetryConfig, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let emitter = EventEmitter::daily_files(&config.emitter);
    let instrumentation = Arc::new(Instrumentation::new(&config.instrumentation, emitter).unwrap());
    let server = HttpServer::new(config, instrumentation);
    let (_tx, updates) = tokio::sync::mpsc::unbounded_channel();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, updates, shutdown).await.unwrap();
    });

    addr
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One serialized event line.
pub fn event_line(level: &str, message: &str, fields: Value) -> String {
    let mut obj = json!({
        "timestamp": "2024-05-01 12:00:00",
        "level": level,
        "message": message,
    });
    if let (Some(target), Value::Object(extra)) = (obj.as_object_mut(), fields) {
        target.extend(extra);
    }
    obj.to_string()
}

pub fn request_line(url: &str, response_ms: u64) -> String {
    event_line(
        "info",
        "HTTP Request",
        json!({ "method": "GET", "url": url, "statusCode": 200, "responseTime": format!("{response_ms}ms") }),
    )
}

/// Write `lines` as the general stream of `date`.
pub fn write_day(dir: &Path, service: &str, date: NaiveDate, lines: &[String]) {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    std::fs::write(general_log_path(dir, service, date), text).unwrap();
}
