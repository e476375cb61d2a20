//! Request-time instrumentation.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (snapshot into RequestContext, body buffered if small)
//!     → chain.rs observers: rate_limit.rs → security.rs → api_version.rs
//!     → handler (untouched request)
//!     → chain.rs completion hooks: performance.rs → request_log.rs
//!     → response returned unchanged
//!
//! Outside the request path:
//!     error_context.rs (pure error enrichment)
//!     db.rs (database call records)
//! ```
//!
//! # Design Decisions
//! - Observers are advisory: they emit events and never reject or delay
//! - Observer errors and panics are swallowed at the chain boundary
//! - The rate counter outlives chain rebuilds on config reload

pub mod api_version;
pub mod chain;
pub mod context;
pub mod db;
pub mod error_context;
pub mod middleware;
pub mod performance;
pub mod rate_limit;
pub mod request_log;
pub mod security;

pub use chain::{ObserverChain, RequestObserver, ResponseCompletion, ResponseCompletionHook};
pub use context::{AuthenticatedUser, RequestContext, SessionId};
pub use error_context::{enrich_error, EnrichedError, ErrorContext};
pub use middleware::instrumentation_middleware;
pub use rate_limit::RateWindowCounter;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::InstrumentationConfig;
use crate::events::EventEmitter;

/// Errors raised inside an observer. Never reach the request path.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("invalid signature: {0}")]
    Signature(#[from] regex::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Shared instrumentation service: emitter, rate counter and the active chain.
pub struct Instrumentation {
    emitter: EventEmitter,
    counter: Arc<RateWindowCounter>,
    chain: ArcSwap<ObserverChain>,
}

impl Instrumentation {
    pub fn new(config: &InstrumentationConfig, emitter: EventEmitter) -> Result<Self, ObserverError> {
        let counter = Arc::new(RateWindowCounter::new(
            Duration::from_secs(config.rate_limit.window_secs),
            Duration::from_secs(config.rate_limit.retention_secs),
        ));
        let chain = ObserverChain::from_config(config, counter.clone())?;

        Ok(Self {
            emitter,
            counter,
            chain: ArcSwap::from_pointee(chain),
        })
    }

    /// Rebuild the chain from a new config. Counter windows are kept.
    ///
    /// Window and retention belong to the live counter; changes to them are
    /// logged and take effect after a restart.
    pub fn reload(&self, config: &InstrumentationConfig) -> Result<(), ObserverError> {
        let ignored = self.counter_settings_changed(config);
        if !ignored.is_empty() {
            tracing::warn!(
                settings = ?ignored,
                window_secs = self.counter.window().as_secs(),
                retention_secs = self.counter.retention().as_secs(),
                "Rate counter settings cannot change at runtime; keeping current values until restart"
            );
        }

        let chain = ObserverChain::from_config(config, self.counter.clone())?;
        self.chain.store(Arc::new(chain));
        tracing::info!("Instrumentation chain reloaded");
        Ok(())
    }

    /// Rate counter settings in `config` that differ from the live counter.
    pub fn counter_settings_changed(&self, config: &InstrumentationConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if Duration::from_secs(config.rate_limit.window_secs) != self.counter.window() {
            changed.push("rate_limit.window_secs");
        }
        if Duration::from_secs(config.rate_limit.retention_secs) != self.counter.retention() {
            changed.push("rate_limit.retention_secs");
        }
        changed
    }

    pub fn chain(&self) -> Arc<ObserverChain> {
        self.chain.load_full()
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn rate_counter(&self) -> &Arc<RateWindowCounter> {
        &self.counter
    }
}
