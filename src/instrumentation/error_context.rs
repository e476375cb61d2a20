//! Attaching request context to application errors.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::events::EventEmitter;
use crate::instrumentation::context::RequestContext;

/// Snapshot of the request an error occurred in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub timestamp: String,
    pub headers: BTreeMap<String, String>,
    /// Present for every method except GET.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub query: Map<String, Value>,
}

impl ErrorContext {
    pub fn capture(ctx: &RequestContext, at: DateTime<Utc>) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            method: ctx.method.clone(),
            url: ctx.url.clone(),
            user_id: ctx.user_id.clone(),
            session_id: ctx.session_id.clone(),
            ip: ctx.ip.clone(),
            user_agent: ctx.user_agent().map(str::to_string),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            headers: ctx.headers.clone(),
            body: (!ctx.is_get()).then(|| ctx.body.clone()),
            query: ctx.query.clone(),
        }
    }
}

/// An error together with the request it happened in.
#[derive(Debug, Clone)]
pub struct EnrichedError<E> {
    pub error: E,
    pub context: ErrorContext,
}

/// Wrap `error` with the context of `ctx` as of `at`. Pure; no I/O.
pub fn enrich_error<E>(error: E, ctx: &RequestContext, at: DateTime<Utc>) -> EnrichedError<E> {
    EnrichedError {
        error,
        context: ErrorContext::capture(ctx, at),
    }
}

impl<E: Error> EnrichedError<E> {
    /// Emit as an "Application Error" event.
    pub fn report(&self, emitter: &EventEmitter) {
        emitter.log_error(&self.error, json!({ "context": self.context }));
    }
}

impl<E: fmt::Display> fmt::Display for EnrichedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.error, self.context.method, self.context.url)
    }
}

impl<E: Error + 'static> Error for EnrichedError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmitterConfig;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[error("ValidationError: title is required")]
    struct ValidationError;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_context_fields() {
        let ctx = RequestContext::new("POST", "/api/recipes?draft=1")
            .with_ip("192.168.1.100")
            .with_user("user789")
            .with_session("sess-1")
            .with_header("User-Agent", "Mozilla/5.0")
            .with_body(json!({"title": ""}));

        let enriched = enrich_error(ValidationError, &ctx, at());
        let c = &enriched.context;

        assert_eq!(enriched.error, ValidationError);
        assert_eq!(c.method, "POST");
        assert_eq!(c.url, "/api/recipes?draft=1");
        assert_eq!(c.user_id.as_deref(), Some("user789"));
        assert_eq!(c.session_id.as_deref(), Some("sess-1"));
        assert_eq!(c.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(c.timestamp, "2024-05-01T12:00:00.000Z");
        assert_eq!(c.body, Some(json!({"title": ""})));
        assert_eq!(c.query["draft"], "1");
        assert_eq!(c.headers["user-agent"], "Mozilla/5.0");
    }

    #[test]
    fn test_get_requests_omit_body() {
        let ctx = RequestContext::new("GET", "/api/recipes").with_body(json!({"x": 1}));
        let enriched = enrich_error(ValidationError, &ctx, at());

        assert_eq!(enriched.context.body, None);
        let serialized = serde_json::to_value(&enriched.context).unwrap();
        assert!(serialized.get("body").is_none());
        assert_eq!(serialized["userId"], Value::Null);
    }

    #[test]
    fn test_display_and_source() {
        let ctx = RequestContext::new("DELETE", "/api/recipes/1");
        let enriched = enrich_error(ValidationError, &ctx, at());

        assert_eq!(
            enriched.to_string(),
            "ValidationError: title is required (DELETE /api/recipes/1)"
        );
        assert!(enriched.source().is_some());
    }

    #[test]
    fn test_report_emits_application_error() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        let ctx = RequestContext::new("PUT", "/api/recipes/1");
        enrich_error(ValidationError, &ctx, at()).report(&emitter);

        let event = sink.find("Application Error").unwrap();
        assert_eq!(event.str_field("error"), Some("ValidationError: title is required"));
        assert_eq!(event.field("context").unwrap()["method"], "PUT");
    }
}
