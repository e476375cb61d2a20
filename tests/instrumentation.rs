//! Request instrumentation through the full middleware stack.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use telemetry_pipeline::events::Level;

mod common;
use common::{memory_router, test_config};

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_plain_request_logs_version_and_metric() {
    let dir = tempfile::tempdir().unwrap();
    let (router, sink, _) = memory_router(&test_config(dir.path()));

    let response = router
        .oneshot(Request::get("/").header("API-Version", "2.0").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let messages = sink.messages();
    assert_eq!(
        messages,
        vec!["API Version Usage", "Performance Metric", "HTTP Request"]
    );
    let version = sink.find("API Version Usage").unwrap();
    assert_eq!(version.str_field("version"), Some("2.0"));
    assert_eq!(version.str_field("service"), Some("recipes"));
}

#[tokio::test]
async fn test_rate_limit_warns_only_past_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    // one window for the whole test
    config.instrumentation.rate_limit.window_secs = 86_400;
    config.instrumentation.rate_limit.retention_secs = 86_400;
    let (router, sink, _) = memory_router(&config);

    for _ in 0..100 {
        let response = router.clone().oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(sink.find("Rate Limit Exceeded").is_none());

    let response = router.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let warning = sink.find("Rate Limit Exceeded").unwrap();
    assert_eq!(warning.level, Level::Warn);
    assert_eq!(warning.field("count"), Some(&json!(101)));
    assert_eq!(warning.str_field("security"), Some("rate_limit_violation"));
}

#[tokio::test]
async fn test_threat_in_body_is_reported_and_body_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let (router, sink, _) = memory_router(&test_config(dir.path()));
    let payload = r#"{"title":"<script>steal()</script>"}"#;

    let response = router
        .oneshot(
            Request::post("/api/recipes")
                .header("content-type", "application/json")
                .header("content-length", payload.len())
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let threat = sink.find("Security Threat Detected").unwrap();
    assert_eq!(threat.level, Level::Error);
    assert_eq!(threat.str_field("surface"), Some("body"));
    assert_eq!(threat.str_field("security"), Some("threat_detected"));
    assert!(sink.find("HTTP Request Error").is_some());
}

#[tokio::test]
async fn test_first_signature_wins_across_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let (router, sink, _) = memory_router(&test_config(dir.path()));

    router
        .oneshot(get("/files/../etc?q=1%20UNION%20SELECT%20password"))
        .await
        .unwrap();

    let threats: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| e.message == "Security Threat Detected")
        .collect();
    assert_eq!(threats.len(), 1);
    assert_eq!(threats[0].str_field("category"), Some("path_traversal"));
}

#[tokio::test]
async fn test_deprecated_endpoint_warning() {
    let dir = tempfile::tempdir().unwrap();
    let (router, sink, _) = memory_router(&test_config(dir.path()));

    router.oneshot(get("/api/auth/legacy-login")).await.unwrap();

    let warning = sink.find("Deprecated API Usage").unwrap();
    assert_eq!(warning.str_field("deprecation"), Some("deprecated_endpoint"));
}

#[tokio::test]
async fn test_disabled_observers_stay_silent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.instrumentation.security.enabled = false;
    config.instrumentation.api_version.enabled = false;
    let (router, sink, instrumentation) = memory_router(&config);

    router.oneshot(get("/x/../y")).await.unwrap();

    assert!(sink.find("Security Threat Detected").is_none());
    assert!(sink.find("API Version Usage").is_none());
    assert!(sink.find("HTTP Request Error").is_some());
    assert!(!instrumentation.chain().observer_names().contains(&"security_scanner"));
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let dir = tempfile::tempdir().unwrap();
    let (router, _, _) = memory_router(&test_config(dir.path()));

    let denied = router.clone().oneshot(get("/admin/status")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = router
        .oneshot(
            Request::get("/admin/status")
                .header("authorization", "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_metrics_for_missing_day() {
    let dir = tempfile::tempdir().unwrap();
    let (router, _, _) = memory_router(&test_config(dir.path()));

    let response = router
        .clone()
        .oneshot(
            Request::get("/admin/metrics/2024-05-01")
                .header("authorization", "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(
            Request::get("/admin/metrics/yesterday")
                .header("authorization", "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
