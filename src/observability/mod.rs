//! Observability of the pipeline itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing diagnostics: startup, swallowed failures)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON in production)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Operational diagnostics stay separate from the domain event streams
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
