//! Per-request access record consumed by the daily analysis.

use serde_json::json;

use crate::events::EventEmitter;
use crate::instrumentation::chain::{ResponseCompletion, ResponseCompletionHook};
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::performance::format_millis;
use crate::instrumentation::ObserverError;

/// Emits "HTTP Request" (info) or, for status >= 400, "HTTP Request Error" (warn).
pub struct RequestLogger;

impl ResponseCompletionHook for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn on_complete(
        &self,
        ctx: &RequestContext,
        completion: &ResponseCompletion,
        emitter: &EventEmitter,
    ) -> Result<(), ObserverError> {
        let fields = json!({
            "method": ctx.method,
            "url": ctx.url,
            "statusCode": completion.status,
            "responseTime": format_millis(completion.duration),
            "userAgent": ctx.user_agent(),
            "ip": ctx.ip,
            "userId": ctx.user_id.as_deref().unwrap_or("anonymous"),
        });

        if completion.status >= 400 {
            emitter.warn("HTTP Request Error", fields);
        } else {
            emitter.info("HTTP Request", fields);
        }
        Ok(())
    }
}
