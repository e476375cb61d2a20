//! Configuration validation.
//!
//! Returns every problem found, not just the first. Validation is a pure
//! function of the parsed config and runs before a config is accepted.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::TelemetryConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let emitter = &config.emitter;
    if emitter.service.trim().is_empty() {
        errors.push(ValidationError::new("emitter.service", "must not be empty"));
    } else if emitter.service.contains(['/', '\\']) {
        errors.push(ValidationError::new("emitter.service", "must not contain path separators"));
    }
    if emitter.max_file_size_bytes == 0 {
        errors.push(ValidationError::new("emitter.max_file_size_bytes", "must be > 0"));
    }

    let limit = &config.instrumentation.rate_limit;
    if limit.window_secs == 0 {
        errors.push(ValidationError::new("instrumentation.rate_limit.window_secs", "must be > 0"));
    }
    if limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "instrumentation.rate_limit.sweep_interval_secs",
            "must be > 0",
        ));
    }
    if limit.retention_secs < limit.window_secs {
        errors.push(ValidationError::new(
            "instrumentation.rate_limit.retention_secs",
            "must be at least one window",
        ));
    }

    if config.instrumentation.api_version.header.trim().is_empty() {
        errors.push(ValidationError::new("instrumentation.api_version.header", "must not be empty"));
    }

    if config.analyzer.top_endpoints == 0 {
        errors.push(ValidationError::new("analyzer.top_endpoints", "must be > 0"));
    }
    if config.analyzer.deadline_secs == 0 {
        errors.push(ValidationError::new("analyzer.deadline_secs", "must be > 0"));
    }

    if config.tail.poll_interval_ms == 0 {
        errors.push(ValidationError::new("tail.poll_interval_ms", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TelemetryConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = TelemetryConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.emitter.service = "../escape".into();
        config.instrumentation.rate_limit.retention_secs = 10;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "emitter.service",
                "instrumentation.rate_limit.retention_secs",
            ]
        );
    }
}
