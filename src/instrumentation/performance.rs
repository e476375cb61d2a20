//! Response latency classification.

use std::time::Duration;

use serde_json::json;

use crate::events::EventEmitter;
use crate::instrumentation::chain::{ResponseCompletion, ResponseCompletionHook};
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::ObserverError;
use crate::observability::metrics;

/// `"<n>ms"`, the wire form of response times.
pub fn format_millis(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

pub struct PerformanceMonitor {
    slow_threshold: Duration,
}

impl PerformanceMonitor {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    /// Strictly slower than the threshold.
    pub fn is_slow(&self, duration: Duration) -> bool {
        duration > self.slow_threshold
    }
}

impl ResponseCompletionHook for PerformanceMonitor {
    fn name(&self) -> &'static str {
        "performance_monitor"
    }

    fn on_complete(
        &self,
        ctx: &RequestContext,
        completion: &ResponseCompletion,
        emitter: &EventEmitter,
    ) -> Result<(), ObserverError> {
        metrics::record_request_duration(completion.status, completion.duration);

        if self.is_slow(completion.duration) {
            emitter.warn(
                "Slow Response Detected",
                json!({
                    "method": ctx.method,
                    "url": ctx.url,
                    "responseTime": format_millis(completion.duration),
                    "userId": ctx.user_id,
                    "statusCode": completion.status,
                    "userAgent": ctx.user_agent(),
                    "performance": "slow",
                }),
            );
        } else {
            emitter.info(
                "Performance Metric",
                json!({
                    "method": ctx.method,
                    "url": ctx.url,
                    "responseTime": format_millis(completion.duration),
                    "userId": ctx.user_id,
                    "statusCode": completion.status,
                }),
            );
        }
        Ok(())
    }
}
