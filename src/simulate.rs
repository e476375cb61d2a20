//! Synthetic traffic for demos and manual checks of the analyzer and tail
//! monitor.

use std::time::Duration;

use serde_json::json;

use crate::events::EventEmitter;
use crate::instrumentation::db::DbLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    Normal,
    Auth,
    Performance,
    Security,
    Database,
    All,
}

impl Scenario {
    fn parts(self) -> &'static [Scenario] {
        match self {
            Scenario::All => &[
                Scenario::Normal,
                Scenario::Auth,
                Scenario::Performance,
                Scenario::Security,
                Scenario::Database,
            ],
            Scenario::Normal => &[Scenario::Normal],
            Scenario::Auth => &[Scenario::Auth],
            Scenario::Performance => &[Scenario::Performance],
            Scenario::Security => &[Scenario::Security],
            Scenario::Database => &[Scenario::Database],
        }
    }
}

pub fn run(emitter: &EventEmitter, scenario: Scenario) {
    for part in scenario.parts() {
        tracing::info!(scenario = ?part, "Simulating");
        match part {
            Scenario::Normal => normal_operations(emitter),
            Scenario::Auth => authentication_issues(emitter),
            Scenario::Performance => performance_issues(emitter),
            Scenario::Security => security_events(emitter),
            Scenario::Database => database_activity(emitter),
            Scenario::All => {}
        }
    }
}

fn normal_operations(emitter: &EventEmitter) {
    let endpoints = [
        "/api/recipes",
        "/api/auth/me",
        "/api/recipes/favorites",
        "/dashboard",
        "/api/user/profile",
    ];
    for (i, url) in endpoints.iter().enumerate() {
        emitter.info(
            "HTTP Request",
            json!({
                "method": "GET",
                "url": url,
                "statusCode": 200,
                "responseTime": format!("{}ms", 150 + i * 50),
                "userId": format!("user{}", i + 1),
                "userAgent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
            }),
        );
    }

    for i in 1..=3 {
        emitter.log_auth(
            "user_registered",
            Some(&format!("newuser{i}")),
            json!({ "email": format!("newuser{i}@example.com"), "registrationMethod": "form" }),
        );
    }
}

fn authentication_issues(emitter: &EventEmitter) {
    for i in 0..5 {
        emitter.warn(
            "Authentication Event",
            json!({
                "event": "login_failed",
                "email": format!("user{i}@example.com"),
                "reason": "invalid_password",
                "ip": format!("192.168.1.{}", 100 + i),
                "attempt": i + 1,
            }),
        );
    }

    emitter.error(
        "Database Error",
        json!({
            "operation": "findUser",
            "collection": "users",
            "error": "MongoTimeoutError: Server selection timed out after 30000 ms",
            "database": "error",
        }),
    );

    emitter.log_auth(
        "login_success",
        Some("user123"),
        json!({ "email": "user@example.com", "ip": "192.168.1.100" }),
    );
}

fn performance_issues(emitter: &EventEmitter) {
    emitter.warn(
        "HTTP Request",
        json!({
            "method": "GET",
            "url": "/api/recipes/user/user456",
            "statusCode": 200,
            "responseTime": "8500ms",
            "userId": "user456",
            "warning": "slow_response",
        }),
    );

    emitter.warn(
        "Slow Database Query",
        json!({
            "model": "recipes",
            "operation": "find",
            "query": { "userId": "user456" },
            "executionTime": "8200ms",
            "resultCount": 2500,
            "performance": "slow_query",
        }),
    );

    emitter.error(
        "Application Error",
        json!({
            "error": "ValidationError: Recipe validation failed: Title is required",
            "context": { "operation": "create_recipe", "userId": "user789" },
        }),
    );
}

fn security_events(emitter: &EventEmitter) {
    emitter.error(
        "Security Threat Detected",
        json!({
            "type": "script_injection",
            "ip": "10.0.0.50",
            "method": "POST",
            "url": "/api/recipes",
            "body": "{\"title\":\"<script>alert(\\\"xss\\\")</script>\"}",
            "security": "threat_detected",
        }),
    );

    emitter.warn(
        "Rate Limit Exceeded",
        json!({
            "ip": "192.168.1.200",
            "count": 150,
            "endpoint": "/api/auth/login",
            "method": "POST",
            "userAgent": "Bot/1.0",
            "security": "rate_limit_violation",
        }),
    );

    emitter.error(
        "Security Threat Detected",
        json!({
            "type": "sql_injection",
            "ip": "203.0.113.50",
            "method": "GET",
            "url": "/api/recipes?search=' UNION SELECT * FROM users--",
            "userAgent": "sqlmap/1.5",
            "security": "threat_detected",
        }),
    );
}

fn database_activity(emitter: &EventEmitter) {
    let db = DbLogger::new(emitter.clone(), Duration::from_millis(1000));

    db.log_query(
        "Recipe",
        "find",
        json!({ "category": "dessert" }),
        12,
        Duration::from_millis(45),
    );
    db.log_query(
        "Recipe",
        "aggregate",
        json!({ "$group": { "_id": "$authorId" } }),
        840,
        Duration::from_millis(3400),
    );

    let err = std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "MongoNetworkError: connection reset by peer",
    );
    db.log_error("User", "updateOne", json!({ "_id": "user123" }), &err);

    emitter.log_database(
        "insertOne",
        "recipes",
        json!({ "documentId": "rec_1042", "durationMs": 18 }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, HealthScore};
    use crate::config::EmitterConfig;

    #[test]
    fn test_all_scenarios_feed_the_analyzer() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        run(&emitter, Scenario::All);

        let text = sink
            .events()
            .iter()
            .map(|e| e.to_line().unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let metrics = analyze(&text, 2000);

        assert_eq!(metrics.total_requests, 6);
        assert_eq!(metrics.response_times.slow_requests, 1);
        assert_eq!(metrics.authentication.login_failures, 5);
        assert_eq!(metrics.authentication.logins, 1);
        assert_eq!(metrics.authentication.registrations, 3);
        assert_eq!(metrics.security_events, 3);
        assert_eq!(metrics.performance_issues, 1);
        assert_eq!(metrics.error_types["MongoTimeoutError"], 1);
        assert_eq!(metrics.error_types["ValidationError"], 1);
        assert_eq!(metrics.error_types["MongoNetworkError"], 1);
        assert!(HealthScore::compute(&metrics).score < 100);
    }

    #[test]
    fn test_database_scenario() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        run(&emitter, Scenario::Database);

        let events = sink.events();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Database Operation",
                "Slow Database Query",
                "Database Error",
                "Database Operation"
            ]
        );
        assert_eq!(events[1].str_field("executionTime"), Some("3400ms"));
        assert_eq!(events[3].str_field("collection"), Some("recipes"));

        let text = events
            .iter()
            .map(|e| e.to_line().unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let metrics = analyze(&text, 2000);
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.warning_count, 1);
        assert_eq!(metrics.error_types["MongoNetworkError"], 1);
    }
}
