use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::domain::AuditEntry;
use crate::errors::HrError;
use crate::http::response::{CorrelationId, CurrentUser};
use crate::http::SharedState;
use crate::ratelimit::RouteClass;
use crate::types::AuditAction;

const CORRELATION_HEADER: &str = "x-correlation-id";
const PAYLOAD_CAPTURE_LIMIT: usize = 2 << 20;

/// first of X-Forwarded-For, else X-Real-IP, else the peer address
pub fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// accept or mint the correlation id; every response echoes it
pub async fn correlation(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// token buckets per (remote ip, route class); refusals carry Retry-After
pub async fn rate_limit(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions());
    let class = RouteClass::for_path(request.uri().path());
    match state.limiter.check(&ip, class) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            tracing::debug!(%ip, ?class, retry_after_secs, "rate limited");
            HrError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// per-request deadline; expiry maps to the Timeout error class
pub async fn deadline(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(state.config.request_deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => HrError::Timeout.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// authentication filter and deny-by-default authorization guard
///
/// every route resolves to a required-role predicate; requests matching no
/// rule are refused before any handler runs. denials for authenticated
/// callers are recorded inline as ACCESS_DENIED audit events.
pub async fn authorize(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let user = match bearer_token(request.headers()) {
        Some(token) => match state.tokens.verify(token, state.clock.now()) {
            Ok(claims) => Some(CurrentUser { username: claims.sub, roles: claims.roles }),
            Err(err) => {
                let required = state.policy.required_for(&method, &path);
                if matches!(required, Some(crate::auth::RequiredRole::Public)) {
                    None
                } else {
                    return err.into_response();
                }
            }
        },
        None => None,
    };

    let Some(required) = state.policy.required_for(&method, &path) else {
        return HrError::not_found("route", format!("{method} {path}")).into_response();
    };

    let roles = user.as_ref().map(|u| u.roles.as_slice());
    if !required.permits(roles) {
        if let Some(user) = &user {
            let entry = AuditEntry::new(
                user.username.clone(),
                AuditAction::AccessDenied,
                "route",
                format!("{method} {path}"),
                serde_json::json!({ "roles": user.roles }),
                client_ip(request.headers(), request.extensions()),
                header_string(request.headers(), header::USER_AGENT),
                request.extensions().get::<CorrelationId>().map(|c| c.0.clone()),
                state.clock.now(),
            );
            if let Err(err) = state.audit.record_inline(entry) {
                tracing::warn!(error = %err, "failed to record access denial");
            }
            return HrError::Unauthorized("insufficient role for this operation".to_string())
                .into_response();
        }
        return HrError::Unauthenticated("authentication required".to_string()).into_response();
    }

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn action_for(method: &Method) -> Option<AuditAction> {
    match *method {
        Method::POST => Some(AuditAction::Create),
        Method::PUT => Some(AuditAction::Update),
        Method::DELETE => Some(AuditAction::Delete),
        _ => None,
    }
}

/// `/api/v1/employees/EMP1/...` -> (entity kind, path entity id)
fn entity_from_path(path: &str) -> (String, Option<String>) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // segments[0] = "api", [1] = "v1", [2] = resource, [3] = id
    let kind = segments.get(2).unwrap_or(&"unknown").to_string();
    let id = segments.get(3).map(|s| s.to_string());
    (kind, id)
}

/// automatic audit capture of successful mutating calls
///
/// runs inside the authentication filter; buffers request and response
/// bodies (bounded) so the entry carries the full JSON payload. auth
/// endpoints record their own events inline and are skipped here.
pub async fn audit_capture(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(action) = action_for(&method) else {
        return next.run(request).await;
    };
    if path.starts_with("/api/v1/auth/") {
        return next.run(request).await;
    }

    let actor = request
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| "system".to_string());
    let remote_ip = client_ip(request.headers(), request.extensions());
    let user_agent = header_string(request.headers(), header::USER_AGENT);
    let correlation_id = request.extensions().get::<CorrelationId>().map(|c| c.0.clone());

    let (parts, body) = request.into_parts();
    let request_bytes = match to_bytes(body, PAYLOAD_CAPTURE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return HrError::invalid("request body too large").into_response();
        }
    };
    let request = Request::from_parts(parts, Body::from(request_bytes.clone()));

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let response_bytes = match to_bytes(body, PAYLOAD_CAPTURE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return HrError::internal("response body capture failed").into_response(),
    };
    let response_json: Option<serde_json::Value> = serde_json::from_slice(&response_bytes).ok();

    let (kind, path_id) = entity_from_path(&path);
    let entity_id = response_json
        .as_ref()
        .and_then(|v| v.get("data"))
        .and_then(|d| d.get("id"))
        .and_then(|id| id.as_str().map(str::to_string))
        .or(path_id)
        .unwrap_or_default();

    let request_json: Option<serde_json::Value> = serde_json::from_slice(&request_bytes).ok();
    let payload = serde_json::json!({
        "request": request_json,
        "response": response_json.as_ref().and_then(|v| v.get("data")),
    });

    state.audit.enqueue(AuditEntry::new(
        actor,
        action,
        kind,
        entity_id,
        payload,
        remote_ip,
        user_agent,
        correlation_id,
        state.clock.now(),
    ));

    Response::from_parts(parts, Body::from(response_bytes))
}
