//! Composite 0-100 health score derived from daily metrics.

use std::fmt;

use serde::Serialize;

use crate::analysis::DailyMetrics;

/// `numerator / denominator` as a percentage; 0 when the denominator is 0.
pub fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthBand {
    Critical,
    Warning,
    Good,
    Excellent,
}

impl HealthBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            85.. => HealthBand::Excellent,
            70..=84 => HealthBand::Good,
            50..=69 => HealthBand::Warning,
            _ => HealthBand::Critical,
        }
    }
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthBand::Critical => "Critical",
            HealthBand::Warning => "Warning",
            HealthBand::Good => "Good",
            HealthBand::Excellent => "Excellent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deduction {
    pub reason: &'static str,
    pub points: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScore {
    pub score: u8,
    pub band: HealthBand,
    pub deductions: Vec<Deduction>,
}

impl HealthScore {
    pub fn compute(metrics: &DailyMetrics) -> Self {
        let mut deductions = Vec::new();

        let error_rate = percent(metrics.error_count, metrics.total_requests);
        if error_rate > 5.0 {
            deductions.push(Deduction { reason: "error rate above 5%", points: 30 });
        } else if error_rate > 1.0 {
            deductions.push(Deduction { reason: "error rate above 1%", points: 10 });
        }

        let slow_rate = percent(metrics.response_times.slow_requests, metrics.total_requests);
        if slow_rate > 10.0 {
            deductions.push(Deduction { reason: "slow request rate above 10%", points: 20 });
        } else if slow_rate > 5.0 {
            deductions.push(Deduction { reason: "slow request rate above 5%", points: 10 });
        }

        if metrics.security_events > 0 {
            deductions.push(Deduction { reason: "security events recorded", points: 15 });
        }

        let auth = &metrics.authentication;
        let auth_failure_rate = percent(auth.login_failures, auth.attempts());
        if auth_failure_rate > 20.0 {
            deductions.push(Deduction { reason: "login failure rate above 20%", points: 15 });
        } else if auth_failure_rate > 10.0 {
            deductions.push(Deduction { reason: "login failure rate above 10%", points: 5 });
        }

        let lost: u32 = deductions.iter().map(|d| u32::from(d.points)).sum();
        let score = 100u32.saturating_sub(lost).min(100) as u8;

        Self {
            score,
            band: HealthBand::from_score(score),
            deductions,
        }
    }
}

impl fmt::Display for HealthScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**Health Score: {}/100** ({})", self.score, self.band)
    }
}
