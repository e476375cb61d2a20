//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router (health routes, admin routes, 404 fallback)
//! - Wire middleware (request id, tracing, instrumentation, timeout)
//! - Apply configuration reloads to the live observer chain
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::analysis::LogAnalyzer;
use crate::config::{AdminConfig, TelemetryConfig};
use crate::instrumentation::{instrumentation_middleware, Instrumentation};
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub instrumentation: Arc<Instrumentation>,
    pub analyzer: Arc<LogAnalyzer>,
    pub admin: Arc<ArcSwap<AdminConfig>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &TelemetryConfig, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            instrumentation,
            analyzer: Arc::new(LogAnalyzer::from_config(config)),
            admin: Arc::new(ArcSwap::from_pointee(config.admin.clone())),
            started_at: Instant::now(),
        }
    }
}

/// Instrumented HTTP host.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: &TelemetryConfig, instrumentation: Arc<Instrumentation>) -> Self {
        let state = AppState::new(config, instrumentation);
        let router = build_router(config, state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configurations arriving on `config_updates` replace the observer chain
    /// and admin key. Listener and router shape are fixed at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<TelemetryConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let mut reload_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reload_shutdown.recv() => break,
                    update = config_updates.recv() => {
                        let Some(config) = update else { break };
                        apply_reload(&state, &config);
                    }
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_reload(state: &AppState, config: &TelemetryConfig) {
    match state.instrumentation.reload(&config.instrumentation) {
        Ok(()) => {
            state.admin.store(Arc::new(config.admin.clone()));
            tracing::info!("Configuration reload applied");
        }
        Err(e) => tracing::error!(
            error = %e,
            "Failed to rebuild observer chain. Keeping current configuration."
        ),
    }
}

/// Build the router with all middleware layers.
///
/// Instrumentation wraps the timeout so timed-out requests still complete
/// with a status.
#[allow(deprecated)]
pub fn build_router(config: &TelemetryConfig, state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health));

    if config.admin.enabled {
        router = router.merge(admin::setup_admin_router(state.clone()));
    }

    router
        .fallback(not_found)
        .with_state(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )))
        .layer(middleware::from_fn_with_state(
            state.instrumentation,
            instrumentation_middleware,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": format!("{} telemetry host is running", state.analyzer.service()),
        "status": "healthy",
        "timestamp": now_rfc3339(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let chain = state.instrumentation.chain();
    Json(json!({
        "status": "healthy",
        "observers": chain.observer_names(),
        "rateWindowKeys": state.instrumentation.rate_counter().len(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "timestamp": now_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
