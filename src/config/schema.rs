//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! telemetry pipeline. All types derive Serde traits for deserialization
//! from TOML files, and every section has defaults so a minimal file works.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::events::Level;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Listener configuration for the instrumented HTTP host.
    pub listener: ListenerConfig,

    /// Event stream files (naming, rotation, retention).
    pub emitter: EmitterConfig,

    /// Request-time observers.
    pub instrumentation: InstrumentationConfig,

    /// Offline log analysis.
    pub analyzer: AnalyzerConfig,

    /// Real-time tail monitor.
    pub tail: TailConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,

    /// Operational logging and metrics of the service itself.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Event emitter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Directory holding the daily stream files.
    pub log_dir: PathBuf,

    /// Service name; prefix of the general stream file and a field on every event.
    pub service: String,

    /// Deployment environment ("production" tightens defaults).
    pub environment: String,

    /// Minimum level written. Defaults to info in production, debug elsewhere.
    pub min_level: Option<Level>,

    /// Size cap of a single stream file before a new segment starts.
    pub max_file_size_bytes: u64,

    /// Days the general stream is kept.
    pub general_retention_days: u32,

    /// Days the error-only stream is kept.
    pub error_retention_days: u32,

    /// Mirror events to the console. Defaults to on outside production.
    pub console: Option<bool>,
}

impl EmitterConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn effective_min_level(&self) -> Level {
        self.min_level.unwrap_or(if self.is_production() {
            Level::Info
        } else {
            Level::Debug
        })
    }

    pub fn console_enabled(&self) -> bool {
        self.console.unwrap_or(!self.is_production())
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            service: "telemetry".to_string(),
            environment: "development".to_string(),
            min_level: None,
            max_file_size_bytes: 20 * 1024 * 1024, // 20MB
            general_retention_days: 7,
            error_retention_days: 14,
            console: None,
        }
    }
}

/// Request-time observer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Responses slower than this are reported as slow.
    pub slow_response_ms: u64,

    /// Emit "HTTP Request" records on completion.
    pub request_logging: bool,

    pub rate_limit: RateLimitConfig,

    pub security: SecurityConfig,

    pub api_version: ApiVersionConfig,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            slow_response_ms: 1000,
            request_logging: true,
            rate_limit: RateLimitConfig::default(),
            security: SecurityConfig::default(),
            api_version: ApiVersionConfig::default(),
        }
    }
}

/// Observe-only rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Requests per client per window before a violation is reported.
    pub max_requests_per_window: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Windows older than this are evicted.
    pub retention_secs: u64,

    /// Interval of the background eviction task.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests_per_window: 100,
            window_secs: 60,
            retention_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

/// Signature scanning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,

    /// Bodies larger than this (by Content-Length) are not buffered for inspection.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// API version tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiVersionConfig {
    pub enabled: bool,

    /// Header carrying the client's API version.
    pub header: String,

    /// Version assumed when the header is absent.
    pub default_version: String,

    /// Exact request URLs considered deprecated.
    pub deprecated_endpoints: Vec<String>,
}

impl Default for ApiVersionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: "API-Version".to_string(),
            default_version: "1.0".to_string(),
            deprecated_endpoints: vec![
                "/api/v1/recipes/old-format".to_string(),
                "/api/auth/legacy-login".to_string(),
            ],
        }
    }
}

/// Log analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Requests slower than this count as slow in daily metrics.
    ///
    /// Deliberately separate from `instrumentation.slow_response_ms`.
    pub slow_request_ms: u64,

    /// Number of endpoints listed in the report.
    pub top_endpoints: usize,

    /// Upper bound for one analysis pass, in seconds.
    pub deadline_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            slow_request_ms: 2000,
            top_endpoints: 10,
            deadline_secs: 30,
        }
    }
}

/// How the tail monitor learns about file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// OS file notifications.
    Notify,
    /// Periodic metadata polling.
    Poll,
}

/// Tail monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TailConfig {
    pub mode: WatchMode,

    /// Polling interval in milliseconds (poll mode).
    pub poll_interval_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Notify,
            poll_interval_ms: 1000,
        }
    }
}

/// Admin endpoints configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter for the service's own diagnostics.
    pub log_level: String,

    /// Emit diagnostics as JSON.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: TelemetryConfig = toml::from_str("").unwrap();
        assert_eq!(config.instrumentation.slow_response_ms, 1000);
        assert_eq!(config.analyzer.slow_request_ms, 2000);
        assert_eq!(config.instrumentation.rate_limit.max_requests_per_window, 100);
        assert_eq!(config.emitter.general_retention_days, 7);
        assert_eq!(config.emitter.error_retention_days, 14);
        assert_eq!(config.tail.mode, WatchMode::Notify);
    }

    #[test]
    fn test_partial_sections() {
        let config: TelemetryConfig = toml::from_str(
            r#"
            [emitter]
            service = "recipes"
            environment = "production"
            min_level = "warn"

            [tail]
            mode = "poll"
            "#,
        )
        .unwrap();
        assert_eq!(config.emitter.service, "recipes");
        assert_eq!(config.emitter.effective_min_level(), Level::Warn);
        assert!(!config.emitter.console_enabled());
        assert_eq!(config.tail.mode, WatchMode::Poll);
        assert_eq!(config.emitter.max_file_size_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_environment_defaults() {
        let mut emitter = EmitterConfig::default();
        assert_eq!(emitter.effective_min_level(), Level::Debug);
        assert!(emitter.console_enabled());

        emitter.environment = "Production".into();
        assert_eq!(emitter.effective_min_level(), Level::Info);
    }
}
