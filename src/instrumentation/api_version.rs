//! API version usage and deprecated endpoint tracking.

use std::collections::HashSet;

use serde_json::json;

use crate::config::ApiVersionConfig;
use crate::events::EventEmitter;
use crate::instrumentation::chain::RequestObserver;
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::ObserverError;

pub struct ApiVersionMonitor {
    header: String,
    default_version: String,
    deprecated: HashSet<String>,
}

impl ApiVersionMonitor {
    pub fn new(config: &ApiVersionConfig) -> Self {
        Self {
            header: config.header.clone(),
            default_version: config.default_version.clone(),
            deprecated: config.deprecated_endpoints.iter().cloned().collect(),
        }
    }

    pub fn version<'a>(&'a self, ctx: &'a RequestContext) -> &'a str {
        ctx.header(&self.header).unwrap_or(self.default_version.as_str())
    }

    pub fn is_deprecated(&self, url: &str) -> bool {
        self.deprecated.contains(url)
    }
}

impl RequestObserver for ApiVersionMonitor {
    fn name(&self) -> &'static str {
        "api_version_monitor"
    }

    fn observe(&self, ctx: &RequestContext, emitter: &EventEmitter) -> Result<(), ObserverError> {
        let version = self.version(ctx);

        emitter.info(
            "API Version Usage",
            json!({
                "version": version,
                "endpoint": ctx.url,
                "method": ctx.method,
                "userAgent": ctx.user_agent(),
                "userId": ctx.user_id,
            }),
        );

        if self.is_deprecated(&ctx.url) {
            emitter.warn(
                "Deprecated API Usage",
                json!({
                    "endpoint": ctx.url,
                    "version": version,
                    "userAgent": ctx.user_agent(),
                    "userId": ctx.user_id,
                    "deprecation": "deprecated_endpoint",
                }),
            );
        }
        Ok(())
    }
}
