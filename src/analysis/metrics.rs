//! Single-pass aggregation of a day's event stream.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::AnalyzerError;
use crate::events::{Level, LogEvent};

/// Lines between deadline checks.
const DEADLINE_CHECK_EVERY: usize = 1024;

const UNKNOWN_ENDPOINT: &str = "(unknown)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeSummary {
    /// Requests with a positive parsed response time.
    pub count: u64,
    /// Rounded mean in milliseconds; 0 when nothing was observed.
    pub average_ms: u64,
    pub slow_requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFunnel {
    pub logins: u64,
    pub login_failures: u64,
    pub registrations: u64,
}

impl AuthFunnel {
    pub fn attempts(&self) -> u64 {
        self.logins + self.login_failures
    }
}

/// Aggregate view of one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    /// Lines that parsed as events.
    pub parsed_events: u64,
    pub total_requests: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub info_count: u64,
    pub debug_count: u64,
    pub response_times: ResponseTimeSummary,
    pub authentication: AuthFunnel,
    /// Request count per url.
    pub endpoints: BTreeMap<String, u64>,
    /// Occurrences per error signature.
    pub error_types: BTreeMap<String, u64>,
    pub security_events: u64,
    pub performance_issues: u64,
}

impl DailyMetrics {
    /// Endpoints by descending frequency, ties by name.
    pub fn top_endpoints(&self, n: usize) -> Vec<(&str, u64)> {
        ranked(&self.endpoints, n)
    }

    /// Error signatures by descending frequency, ties by name.
    pub fn ranked_error_types(&self) -> Vec<(&str, u64)> {
        ranked(&self.error_types, usize::MAX)
    }
}

fn ranked(histogram: &BTreeMap<String, u64>, n: usize) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = histogram.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(n);
    entries
}

/// Incremental builder for [`DailyMetrics`].
pub struct MetricsAggregator {
    slow_request_ms: u64,
    metrics: DailyMetrics,
    response_time_total: u128,
    lines_seen: usize,
    deadline: Option<Instant>,
}

impl MetricsAggregator {
    pub fn new(slow_request_ms: u64) -> Self {
        Self {
            slow_request_ms,
            metrics: DailyMetrics::default(),
            response_time_total: 0,
            lines_seen: 0,
            deadline: None,
        }
    }

    /// Fail ingestion once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Ingest newline-delimited text. Blank and malformed lines are skipped.
    pub fn ingest_text(&mut self, text: &str) -> Result<(), AnalyzerError> {
        for line in text.lines() {
            self.lines_seen += 1;
            if self.lines_seen % DEADLINE_CHECK_EVERY == 0 {
                self.check_deadline()?;
            }
            if let Some(event) = LogEvent::from_line(line) {
                self.ingest(&event);
            }
        }
        Ok(())
    }

    pub fn ingest(&mut self, event: &LogEvent) {
        let m = &mut self.metrics;
        m.parsed_events += 1;

        match event.level {
            Level::Error => {
                m.error_count += 1;
                if let Some(signature) = error_signature(event) {
                    *m.error_types.entry(signature.to_string()).or_insert(0) += 1;
                }
            }
            Level::Warn => m.warning_count += 1,
            Level::Info => m.info_count += 1,
            Level::Debug => m.debug_count += 1,
        }

        match event.message.as_str() {
            "HTTP Request" => {
                m.total_requests += 1;
                let endpoint = event.str_field("url").unwrap_or(UNKNOWN_ENDPOINT);
                *m.endpoints.entry(endpoint.to_string()).or_insert(0) += 1;

                let response_time = event.field("responseTime").map(parse_millis).unwrap_or(0);
                if response_time > 0 {
                    m.response_times.count += 1;
                    self.response_time_total += u128::from(response_time);
                    if response_time > self.slow_request_ms {
                        m.response_times.slow_requests += 1;
                    }
                }
            }
            "Authentication Event" => match event.str_field("event") {
                Some("login_success") => m.authentication.logins += 1,
                Some("login_failed") => m.authentication.login_failures += 1,
                Some("user_registered") => m.authentication.registrations += 1,
                _ => {}
            },
            _ => {}
        }

        if event.has_flag("security") {
            m.security_events += 1;
        }
        if event.str_field("performance") == Some("slow")
            || event.str_field("warning") == Some("slow_response")
        {
            m.performance_issues += 1;
        }
    }

    pub fn finish(mut self) -> DailyMetrics {
        let count = self.metrics.response_times.count;
        if count > 0 {
            self.metrics.response_times.average_ms =
                (self.response_time_total as f64 / count as f64).round() as u64;
        }
        self.metrics
    }

    fn check_deadline(&self) -> Result<(), AnalyzerError> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(AnalyzerError::DeadlineExceeded {
                lines_processed: self.lines_seen,
            }),
            _ => Ok(()),
        }
    }
}

/// Aggregate a whole day's text in one pass.
pub fn analyze(text: &str, slow_request_ms: u64) -> DailyMetrics {
    let mut aggregator = MetricsAggregator::new(slow_request_ms);
    // Without a deadline ingestion cannot fail.
    let _ = aggregator.ingest_text(text);
    aggregator.finish()
}

/// Normalized error type of an error-level event, if it qualifies.
///
/// The `error` field up to its first colon, falling back to the message.
fn error_signature(event: &LogEvent) -> Option<&str> {
    if !event.has_flag("error") && !event.message.contains("Error") {
        return None;
    }
    let from_field = event
        .str_field("error")
        .and_then(|e| e.split(':').next())
        .filter(|s| !s.is_empty());
    Some(from_field.unwrap_or(event.message.as_str()))
}

/// Leading integer milliseconds of `"850ms"`, `"850"` or `850`; 0 otherwise.
fn parse_millis(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.trunc() as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim_start();
            let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
            s[..digits].parse().unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(level: &str, message: &str, fields: Value) -> String {
        let mut obj = json!({"timestamp": "2024-05-01 10:00:00", "level": level, "message": message});
        if let (Some(target), Value::Object(extra)) = (obj.as_object_mut(), fields) {
            target.extend(extra);
        }
        obj.to_string()
    }

    #[test]
    fn test_parse_millis_forms() {
        assert_eq!(parse_millis(&json!("850ms")), 850);
        assert_eq!(parse_millis(&json!("12.7ms")), 12);
        assert_eq!(parse_millis(&json!(" 40")), 40);
        assert_eq!(parse_millis(&json!(1500)), 1500);
        assert_eq!(parse_millis(&json!(99.9)), 99);
        assert_eq!(parse_millis(&json!("-5ms")), 0);
        assert_eq!(parse_millis(&json!("fast")), 0);
        assert_eq!(parse_millis(&json!(null)), 0);
    }

    #[test]
    fn test_request_aggregation() {
        let text = [
            line("info", "HTTP Request", json!({"url": "/a", "responseTime": "100ms"})),
            line("info", "HTTP Request", json!({"url": "/a", "responseTime": "2500ms"})),
            line("info", "HTTP Request", json!({"url": "/b", "responseTime": "0ms"})),
            line("warn", "HTTP Request Error", json!({"url": "/c", "responseTime": "10ms"})),
        ]
        .join("\n");

        let m = analyze(&text, 2000);
        assert_eq!(m.total_requests, 3);
        assert_eq!(m.endpoints["/a"], 2);
        assert_eq!(m.endpoints["/b"], 1);
        assert!(!m.endpoints.contains_key("/c"));
        assert_eq!(m.response_times.count, 2);
        assert_eq!(m.response_times.average_ms, 1300);
        assert_eq!(m.response_times.slow_requests, 1);
        assert_eq!(m.info_count, 3);
        assert_eq!(m.warning_count, 1);
    }

    #[test]
    fn test_error_signatures() {
        let text = [
            line("error", "Database Error", json!({"error": "MongoTimeoutError: timed out"})),
            line("error", "Database Error", json!({"error": "MongoTimeoutError: again"})),
            line("error", "Security Threat Detected", json!({"security": "threat_detected"})),
            line("error", "Application Error", json!({})),
            line("warn", "Some Error", json!({"error": "IgnoredError: warn level"})),
        ]
        .join("\n");

        let m = analyze(&text, 2000);
        assert_eq!(m.error_count, 4);
        assert_eq!(m.error_types["MongoTimeoutError"], 2);
        assert_eq!(m.error_types["Application Error"], 1);
        assert!(!m.error_types.contains_key("Security Threat Detected"));
        assert!(!m.error_types.contains_key("IgnoredError"));
        assert_eq!(m.security_events, 1);
    }

    #[test]
    fn test_flags_and_auth() {
        let text = [
            line("info", "Authentication Event", json!({"event": "login_success"})),
            line("warn", "Authentication Event", json!({"event": "login_failed"})),
            line("info", "Authentication Event", json!({"event": "user_registered"})),
            line("info", "Authentication Event", json!({"event": "logout"})),
            line("warn", "Slow Response Detected", json!({"performance": "slow"})),
            line("warn", "HTTP Request", json!({"url": "/x", "warning": "slow_response", "responseTime": "8500ms"})),
            line("warn", "Rate Limit Exceeded", json!({"security": "rate_limit_violation"})),
        ]
        .join("\n");

        let m = analyze(&text, 2000);
        assert_eq!(m.authentication, AuthFunnel { logins: 1, login_failures: 1, registrations: 1 });
        assert_eq!(m.performance_issues, 2);
        assert_eq!(m.security_events, 1);
        assert_eq!(m.response_times.slow_requests, 1);
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let valid = line("info", "Performance Metric", json!({}));
        let text = format!(
            "{valid}\nnot json\n{{\"level\":\"info\"}}\n\n{valid}\n{{\"timestamp\":\"t\",\"level\":\"info\",\"mess"
        );

        let m = analyze(&text, 2000);
        assert_eq!(m.parsed_events, 2);
        assert_eq!(m.info_count + m.warning_count + m.error_count + m.debug_count, 2);
    }

    #[test]
    fn test_requests_counted_whatever_the_timestamp() {
        let text = [
            r#"{"timestamp":1714557600,"level":"info","message":"HTTP Request","url":"/a","responseTime":"10ms"}"#,
            r#"{"level":"info","message":"HTTP Request","url":"/a","responseTime":"20ms"}"#,
            r#"{"timestamp":"2024-05-01 10:00:00","level":"info","message":"HTTP Request","url":"/b","responseTime":"30ms"}"#,
        ]
        .join("\n");

        let m = analyze(&text, 2000);
        assert_eq!(m.parsed_events, 3);
        assert_eq!(m.total_requests, 3);
        assert_eq!(m.endpoints["/a"], 2);
        assert_eq!(m.response_times.average_ms, 20);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let mut m = DailyMetrics::default();
        m.endpoints.insert("/b".into(), 5);
        m.endpoints.insert("/a".into(), 5);
        m.endpoints.insert("/c".into(), 9);

        assert_eq!(m.top_endpoints(2), vec![("/c", 9), ("/a", 5)]);
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let text = std::iter::repeat(line("info", "x", json!({})))
            .take(DEADLINE_CHECK_EVERY * 2)
            .collect::<Vec<_>>()
            .join("\n");
        let mut aggregator = MetricsAggregator::new(2000).with_deadline(Instant::now());
        std::thread::sleep(std::time::Duration::from_millis(2));

        let err = aggregator.ingest_text(&text).unwrap_err();
        assert!(matches!(err, AnalyzerError::DeadlineExceeded { lines_processed } if lines_processed == DEADLINE_CHECK_EVERY));
    }
}
