//! Observer traits and the chain that runs them.
//!
//! Every observer runs behind a boundary that swallows both returned errors
//! and panics, so telemetry can never fail the request it watches.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::config::InstrumentationConfig;
use crate::events::EventEmitter;
use crate::instrumentation::api_version::ApiVersionMonitor;
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::performance::PerformanceMonitor;
use crate::instrumentation::rate_limit::{RateLimiter, RateWindowCounter};
use crate::instrumentation::request_log::RequestLogger;
use crate::instrumentation::security::SecurityScanner;
use crate::instrumentation::ObserverError;
use crate::observability::metrics;

/// Runs before the handler, once per request.
pub trait RequestObserver: Send + Sync {
    fn name(&self) -> &'static str;

    fn observe(&self, ctx: &RequestContext, emitter: &EventEmitter) -> Result<(), ObserverError>;
}

/// Final outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCompletion {
    pub status: u16,
    pub duration: Duration,
}

/// Invoked exactly once when the response is complete.
pub trait ResponseCompletionHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_complete(
        &self,
        ctx: &RequestContext,
        completion: &ResponseCompletion,
        emitter: &EventEmitter,
    ) -> Result<(), ObserverError>;
}

/// Ordered set of observers and completion hooks.
#[derive(Default)]
pub struct ObserverChain {
    observers: Vec<Box<dyn RequestObserver>>,
    hooks: Vec<Box<dyn ResponseCompletionHook>>,
    body_limit: Option<usize>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: rate limiter, security scanner and API-version
    /// monitor before the handler; performance monitor and request logger
    /// on completion.
    pub fn from_config(
        config: &InstrumentationConfig,
        counter: Arc<RateWindowCounter>,
    ) -> Result<Self, ObserverError> {
        let mut chain = Self::new();

        if config.rate_limit.enabled {
            chain = chain.with_observer(RateLimiter::new(
                counter,
                config.rate_limit.max_requests_per_window,
            ));
        }
        if config.security.enabled {
            chain = chain
                .with_observer(SecurityScanner::new()?)
                .with_body_limit(config.security.max_body_bytes);
        }
        if config.api_version.enabled {
            chain = chain.with_observer(ApiVersionMonitor::new(&config.api_version));
        }

        chain = chain.with_hook(PerformanceMonitor::new(Duration::from_millis(
            config.slow_response_ms,
        )));
        if config.request_logging {
            chain = chain.with_hook(RequestLogger);
        }

        Ok(chain)
    }

    pub fn with_observer(mut self, observer: impl RequestObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn with_hook(mut self, hook: impl ResponseCompletionHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Buffer request bodies up to `limit` bytes for inspection.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    pub fn observer_names(&self) -> Vec<&'static str> {
        self.observers
            .iter()
            .map(|o| o.name())
            .chain(self.hooks.iter().map(|h| h.name()))
            .collect()
    }

    pub fn observe(&self, ctx: &RequestContext, emitter: &EventEmitter) {
        for observer in &self.observers {
            guarded(observer.name(), || observer.observe(ctx, emitter));
        }
    }

    pub fn complete(&self, ctx: &RequestContext, completion: &ResponseCompletion, emitter: &EventEmitter) {
        for hook in &self.hooks {
            guarded(hook.name(), || hook.on_complete(ctx, completion, emitter));
        }
    }
}

fn guarded(name: &'static str, f: impl FnOnce() -> Result<(), ObserverError>) {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(observer = name, error = %e, "Observer failed");
            metrics::record_observer_failure(name);
        }
        Err(_) => {
            tracing::error!(observer = name, "Observer panicked");
            metrics::record_observer_failure(name);
        }
    }
}
