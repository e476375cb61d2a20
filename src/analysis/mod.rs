//! Offline analysis of the daily event stream.
//!
//! # Data Flow
//! ```text
//! <service>-YYYY-MM-DD.log[.n]
//!     → metrics.rs (line parse, single-pass aggregation → DailyMetrics)
//!     → health.rs  (deductions → HealthScore)
//!     → report.rs  (markdown)
//! ```
//!
//! `analyzer.rs` ties these to the log directory and enforces the pass
//! deadline.

pub mod analyzer;
pub mod health;
pub mod metrics;
pub mod report;

pub use analyzer::{DailyReport, LogAnalyzer};
pub use health::{percent, HealthBand, HealthScore};
pub use metrics::{analyze, AuthFunnel, DailyMetrics, MetricsAggregator, ResponseTimeSummary};
pub use report::render_report;

use std::path::PathBuf;

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("no log file for {date} ({path})")]
    NotFound { date: NaiveDate, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis deadline exceeded after {lines_processed} lines")]
    DeadlineExceeded { lines_processed: usize },
}
