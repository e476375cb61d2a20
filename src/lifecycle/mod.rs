//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP server drains, eviction task stops, tail watch ends
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
