//! Instrumented HTTP host.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace, instrumentation middleware, timeout)
//!     → handlers: /, /api/health, /admin/*
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
