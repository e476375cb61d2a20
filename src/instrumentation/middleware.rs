//! Axum binding of the observer chain.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::instrumentation::chain::ResponseCompletion;
use crate::instrumentation::context::{
    parse_body, parse_query, AuthenticatedUser, RequestContext, SessionId,
};
use crate::instrumentation::Instrumentation;

/// Observe the request, run the handler, then report completion.
///
/// The request and response pass through unchanged.
pub async fn instrumentation_middleware(
    State(instrumentation): State<Arc<Instrumentation>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let chain = instrumentation.chain();

    let (request, mut ctx) = capture_request(request, chain.body_limit()).await;
    chain.observe(&ctx, instrumentation.emitter());

    let response = next.run(request).await;

    // Auth layers inside the stack may only know the user once the handler ran.
    if let Some(AuthenticatedUser(user)) = response.extensions().get::<AuthenticatedUser>() {
        ctx.user_id = Some(user.clone());
    }

    let completion = ResponseCompletion {
        status: response.status().as_u16(),
        duration: started.elapsed(),
    };
    chain.complete(&ctx, &completion, instrumentation.emitter());

    response
}

/// Snapshot a request, buffering its body when it declares a length within
/// `body_limit`. Returns a request carrying the same bytes.
pub async fn capture_request(
    request: Request<Body>,
    body_limit: Option<usize>,
) -> (Request<Body>, RequestContext) {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    let (body, bytes) = match (body_limit, declared) {
        (Some(limit), Some(len)) if len > 0 && len <= limit => {
            match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
                Err(e) => {
                    tracing::debug!(error = %e, "Request body unreadable");
                    (Body::empty(), None)
                }
            }
        }
        _ => (body, None),
    };

    let ctx = context_from_parts(&parts, bytes.as_deref().unwrap_or_default());
    (Request::from_parts(parts, body), ctx)
}

fn context_from_parts(parts: &Parts, body: &[u8]) -> RequestContext {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in parts.headers.iter() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let body = parse_body(headers.get("content-type").map(String::as_str), body);
    let ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let request_id = headers
        .get("x-request-id")
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    RequestContext {
        request_id,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(parse_query).unwrap_or_default(),
        body,
        url,
        ip,
        user_id: parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|u| u.0.clone()),
        session_id: parts.extensions.get::<SessionId>().map(|s| s.0.clone()),
        headers,
        received_at: Utc::now(),
    }
}
