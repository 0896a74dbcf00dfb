use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::SharedState;

/// GET /health
pub async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

/// GET /health/ready — store reachability plus audit queue pressure
pub async fn ready(State(state): State<SharedState>) -> Response {
    match state.store.ping() {
        Ok(()) => Json(json!({
            "ready": true,
            "auditQueueDepth": state.audit.queue_depth(),
            "auditDropped": state.audit.dropped_count(),
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ready": false, "reason": "store unreachable" })),
            )
                .into_response()
        }
    }
}

/// GET /health/live
pub async fn live() -> Response {
    Json(json!({ "alive": true })).into_response()
}
