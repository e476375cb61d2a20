//! Telemetry pipeline: request instrumentation, daily event streams, log
//! analysis and tail monitoring.
//!
//! # Architecture Overview
//!
//! ```text
//!     Request ──▶ http (axum host)
//!                   │
//!                   ▼
//!            instrumentation (observer chain, completion hooks)
//!                   │ LogEvent
//!                   ▼
//!              events (emitter → daily rolling files)
//!                   │
//!          ┌────────┴─────────┐
//!          ▼                  ▼
//!      analysis            tail
//!  (DailyMetrics,      (newest entry →
//!   HealthScore,        callback)
//!   report)
//!
//!  Cross-cutting: config (TOML, hot reload), observability (tracing,
//!  Prometheus), lifecycle (signals, shutdown), admin (bearer-key API)
//! ```

pub mod admin;
pub mod analysis;
pub mod config;
pub mod events;
pub mod http;
pub mod instrumentation;
pub mod lifecycle;
pub mod observability;
pub mod simulate;
pub mod tail;

pub use config::schema::TelemetryConfig;
pub use events::EventEmitter;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
