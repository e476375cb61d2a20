//! Daily analysis over the files of one date.
//!
//! Archived `.log.N` segments are read before the active file; a missing
//! active file is reported as `NotFound`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::analysis::metrics::MetricsAggregator;
use crate::analysis::report::render_report;
use crate::analysis::{AnalyzerError, DailyMetrics, HealthScore};
use crate::config::{AnalyzerConfig, TelemetryConfig};
use crate::events::{general_log_path, rolling};

/// Metrics, health and rendered text for one day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub metrics: DailyMetrics,
    pub health: HealthScore,
    pub text: String,
}

/// Reads one day's general stream and aggregates it.
///
/// Stateless between calls; two passes over identical files produce
/// identical results.
#[derive(Debug, Clone)]
pub struct LogAnalyzer {
    log_dir: PathBuf,
    service: String,
    config: AnalyzerConfig,
}

impl LogAnalyzer {
    pub fn new(log_dir: impl Into<PathBuf>, service: impl Into<String>, config: AnalyzerConfig) -> Self {
        Self {
            log_dir: log_dir.into(),
            service: service.into(),
            config,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            config.emitter.log_dir.clone(),
            config.emitter.service.clone(),
            config.analyzer.clone(),
        )
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Active file of `date`'s general stream.
    pub fn log_path(&self, date: NaiveDate) -> PathBuf {
        general_log_path(&self.log_dir, &self.service, date)
    }

    /// Aggregate `date`'s stream, archived segments first.
    pub fn parse_logs_for_date(&self, date: NaiveDate) -> Result<DailyMetrics, AnalyzerError> {
        let active = self.log_path(date);
        if !active.is_file() {
            return Err(AnalyzerError::NotFound { date, path: active });
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.deadline_secs);
        let mut aggregator =
            MetricsAggregator::new(self.config.slow_request_ms).with_deadline(deadline);

        let mut files = rolling::segment_paths(&self.log_dir, &self.service, date);
        files.push(active);
        for path in &files {
            let text = read_lossy(path)?;
            aggregator.ingest_text(&text)?;
        }

        let metrics = aggregator.finish();
        tracing::debug!(
            %date,
            files = files.len(),
            events = metrics.parsed_events,
            requests = metrics.total_requests,
            "Analyzed daily logs"
        );
        Ok(metrics)
    }

    pub fn generate_daily_report(&self, date: NaiveDate) -> Result<DailyReport, AnalyzerError> {
        let metrics = self.parse_logs_for_date(date)?;
        let health = HealthScore::compute(&metrics);
        let text = render_report(
            &self.service,
            date,
            &metrics,
            &health,
            &self.config,
            Local::now(),
        );
        Ok(DailyReport { date, metrics, health, text })
    }
}

/// Invalid UTF-8 is replaced rather than rejected; the line holding it is
/// then dropped by the parser.
fn read_lossy(path: &Path) -> Result<String, AnalyzerError> {
    let bytes = std::fs::read(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
