//! Markdown rendering of a day's metrics.

use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate};

use crate::analysis::health::percent;
use crate::analysis::{DailyMetrics, HealthScore};
use crate::config::AnalyzerConfig;

/// Render the daily report. No figures are computed here beyond percentages.
pub fn render_report(
    service: &str,
    date: NaiveDate,
    metrics: &DailyMetrics,
    health: &HealthScore,
    config: &AnalyzerConfig,
    generated_at: DateTime<Local>,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, service, date, metrics, health, config, generated_at);
    out
}

fn write_report(
    out: &mut String,
    service: &str,
    date: NaiveDate,
    m: &DailyMetrics,
    health: &HealthScore,
    config: &AnalyzerConfig,
    generated_at: DateTime<Local>,
) -> std::fmt::Result {
    let auth = &m.authentication;

    writeln!(out, "# {service} Daily Log Report - {date}")?;
    writeln!(out)?;
    writeln!(out, "## Overview Metrics")?;
    writeln!(out, "- **Total Requests**: {}", m.total_requests)?;
    writeln!(
        out,
        "- **Error Count**: {} ({:.2}%)",
        m.error_count,
        percent(m.error_count, m.total_requests)
    )?;
    writeln!(out, "- **Warning Count**: {}", m.warning_count)?;
    writeln!(out, "- **Average Response Time**: {}ms", m.response_times.average_ms)?;
    writeln!(
        out,
        "- **Slow Requests (>{})**: {}",
        threshold_label(config.slow_request_ms),
        m.response_times.slow_requests
    )?;
    writeln!(out)?;

    writeln!(out, "## Authentication Events")?;
    writeln!(out, "- **Successful Logins**: {}", auth.logins)?;
    writeln!(out, "- **Failed Logins**: {}", auth.login_failures)?;
    writeln!(out, "- **New Registrations**: {}", auth.registrations)?;
    writeln!(
        out,
        "- **Login Success Rate**: {:.2}%",
        percent(auth.logins, auth.attempts())
    )?;
    writeln!(out)?;

    writeln!(out, "## Top Endpoints")?;
    let endpoints = m.top_endpoints(config.top_endpoints);
    if endpoints.is_empty() {
        writeln!(out, "- No requests recorded")?;
    }
    for (endpoint, count) in endpoints {
        writeln!(out, "- **{endpoint}**: {count} requests")?;
    }
    writeln!(out)?;

    writeln!(out, "## Error Types")?;
    let errors = m.ranked_error_types();
    if errors.is_empty() {
        writeln!(out, "- No errors recorded")?;
    }
    for (signature, count) in errors {
        writeln!(out, "- **{signature}**: {count} occurrences")?;
    }
    writeln!(out)?;

    writeln!(out, "## Security & Performance")?;
    writeln!(out, "- **Security Events**: {}", m.security_events)?;
    writeln!(out, "- **Performance Issues**: {}", m.performance_issues)?;
    writeln!(out)?;

    writeln!(out, "## System Health")?;
    writeln!(out, "{health}")?;
    for deduction in &health.deductions {
        writeln!(out, "- {} (-{})", deduction.reason, deduction.points)?;
    }
    writeln!(out)?;
    writeln!(out, "---")?;
    writeln!(
        out,
        "*Report generated on {}*",
        generated_at.format(crate::events::event::TIMESTAMP_FORMAT)
    )?;
    Ok(())
}

/// `2000` renders as `2s`, `1500` as `1500ms`.
fn threshold_label(ms: u64) -> String {
    if ms >= 1000 && ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn render_with(m: &DailyMetrics, config: &AnalyzerConfig) -> String {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let at = Local.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        render_report("recipes", date, m, &HealthScore::compute(m), config, at)
    }

    fn render(m: &DailyMetrics, top: usize) -> String {
        let config = AnalyzerConfig {
            top_endpoints: top,
            ..Default::default()
        };
        render_with(m, &config)
    }

    #[test]
    fn test_empty_report_has_no_nan() {
        let report = render(&DailyMetrics::default(), 10);

        assert!(report.starts_with("# recipes Daily Log Report - 2024-05-01"));
        assert!(report.contains("- **Error Count**: 0 (0.00%)"));
        assert!(report.contains("- **Login Success Rate**: 0.00%"));
        assert!(report.contains("**Health Score: 100/100** (Excellent)"));
        assert!(report.contains("*Report generated on 2024-05-02 09:00:00*"));
        assert!(!report.contains("NaN"));
    }

    #[test]
    fn test_slow_label_follows_threshold() {
        let mut m = DailyMetrics::default();
        m.response_times.slow_requests = 3;

        assert!(render(&m, 10).contains("- **Slow Requests (>2s)**: 3"));

        let config = AnalyzerConfig {
            slow_request_ms: 1500,
            ..Default::default()
        };
        let report = render_with(&m, &config);
        assert!(report.contains("- **Slow Requests (>1500ms)**: 3"));
        assert!(!report.contains("(>2s)"));
    }

    #[test]
    fn test_endpoints_truncated_and_ordered() {
        let mut m = DailyMetrics::default();
        for (i, path) in ["/a", "/b", "/c"].iter().enumerate() {
            m.endpoints.insert(path.to_string(), i as u64 + 1);
        }
        m.error_types.insert("TypeError".into(), 4);

        let report = render(&m, 2);
        let c = report.find("**/c**: 3 requests").unwrap();
        let b = report.find("**/b**: 2 requests").unwrap();
        assert!(c < b);
        assert!(!report.contains("**/a**"));
        assert!(report.contains("- **TypeError**: 4 occurrences"));
    }
}
