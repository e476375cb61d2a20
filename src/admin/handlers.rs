//! Admin API handlers: host status and per-day metrics and reports.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::analysis::{AnalyzerError, DailyReport};
use crate::http::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub uptime_secs: u64,
    pub observers: Vec<&'static str>,
    pub rate_window_keys: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let chain = state.instrumentation.chain();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service: state.analyzer.service().to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        observers: chain.observer_names(),
        rate_window_keys: state.instrumentation.rate_counter().len(),
    })
}

pub async fn get_daily_metrics(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Response {
    match daily_report(&state, &date).await {
        Ok(report) => Json(json!({
            "date": report.date,
            "metrics": report.metrics,
            "health": report.health,
        }))
        .into_response(),
        Err(response) => response,
    }
}

pub async fn get_daily_report(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Response {
    match daily_report(&state, &date).await {
        Ok(report) => (
            [(axum::http::header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            report.text,
        )
            .into_response(),
        Err(response) => response,
    }
}

/// File reads run on the blocking pool.
async fn daily_report(state: &AppState, date: &str) -> Result<DailyReport, Response> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD"))?;

    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.generate_daily_report(date))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Analysis task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "analysis failed")
        })?;

    result.map_err(|e| {
        let status = match &e {
            AnalyzerError::NotFound { .. } => StatusCode::NOT_FOUND,
            AnalyzerError::DeadlineExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AnalyzerError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::NOT_FOUND {
            tracing::warn!(error = %e, "Daily analysis failed");
        }
        error_response(status, &e.to_string())
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}
