//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs debounces change signals
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watcher.rs diffs sections against the running config
//!     → server rebuilds the observer chain (counter state kept)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AnalyzerConfig, ApiVersionConfig, EmitterConfig, InstrumentationConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, TailConfig,
    TelemetryConfig, WatchMode,
};
