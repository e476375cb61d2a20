//! Structured event emission.
//!
//! # Data Flow
//! ```text
//! Observers / application code
//!     → emitter.rs (level filter, default metadata, timestamp)
//!     → sink.rs (EventSink: daily files or in-memory)
//!     → rolling.rs (per-day file, size-capped segments, retention sweep)
//!
//! General stream:  <service>-YYYY-MM-DD.log   (all levels, 7 days)
//! Error stream:    error-YYYY-MM-DD.log       (error only, 14 days)
//! ```
//!
//! # Design Decisions
//! - One JSON object per line so the analyzer and tail monitor can parse
//!   lines independently
//! - Emission never fails the caller; sink errors are reported via tracing
//! - Events are immutable once built

pub mod emitter;
pub mod event;
pub mod rolling;
pub mod sink;

pub use emitter::EventEmitter;
pub use event::{Level, LogEvent};
pub use sink::{DailyFileSink, EventSink, MemorySink};

use std::path::{Path, PathBuf};
use chrono::NaiveDate;

/// Errors raised by event sinks.
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File name prefix of the error-only stream.
pub const ERROR_STREAM_PREFIX: &str = "error";

/// Path of the general stream for `date`.
pub fn general_log_path(dir: &Path, service: &str, date: NaiveDate) -> PathBuf {
    dir.join(daily_file_name(service, date))
}

/// Path of the error-only stream for `date`.
pub fn error_log_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(daily_file_name(ERROR_STREAM_PREFIX, date))
}

/// `<prefix>-YYYY-MM-DD.log`
pub fn daily_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.log", prefix, date.format("%Y-%m-%d"))
}
