use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::errors::{FieldError, HrError};
use crate::types::Role;

/// standard response envelope: `{ success, message, data }`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// 200 envelope
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    with_status(StatusCode::OK, message, data)
}

/// 201 envelope
pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    with_status(StatusCode::CREATED, message, data)
}

pub fn with_status<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> Response {
    let envelope = Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
        errors: None,
    };
    (status, Json(envelope)).into_response()
}

/// success with no payload
pub fn ok_empty(message: impl Into<String>) -> Response {
    let envelope: Envelope<()> =
        Envelope { success: true, message: message.into(), data: None, errors: None };
    (StatusCode::OK, Json(envelope)).into_response()
}

impl IntoResponse for HrError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let errors = match self.field_errors() {
            [] => None,
            fields => Some(fields.to_vec()),
        };
        let envelope = json!({
            "success": false,
            "message": self.client_message(),
            "data": null,
            "errors": errors,
        });

        let mut response = (status, Json(envelope)).into_response();
        if let HrError::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// request identity injected by the authentication filter
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    /// HR, MANAGER and ADMIN act on records they do not own
    pub fn is_privileged(&self) -> bool {
        self.roles.iter().any(|r| r.rank() >= Role::Hr.rank())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// correlation id minted or accepted by the pipeline
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope_shape() {
        let response = ok("employee found", json!({"id": "EMP12345678"}));
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("employee found"));
        assert_eq!(body["data"]["id"], json!("EMP12345678"));
    }

    #[tokio::test]
    async fn test_error_envelope_carries_field_errors() {
        let response = HrError::invalid_input("hraPercent", "must be 0-100").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["data"], json!(null));
        assert_eq!(body["errors"][0]["field"], json!("hraPercent"));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = HrError::RateLimited { retry_after_secs: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }

    #[tokio::test]
    async fn test_internal_error_is_masked() {
        let response = HrError::internal("sled io error: /var/db corrupt").into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], json!("internal error"));
    }

    #[test]
    fn test_privilege_helper() {
        let hr = CurrentUser { username: "hr1".into(), roles: vec![Role::Hr] };
        assert!(hr.is_privileged());
        let emp = CurrentUser { username: "e1".into(), roles: vec![Role::Employee] };
        assert!(!emp.is_privileged());
        let user = CurrentUser { username: "u1".into(), roles: vec![Role::User] };
        assert!(!user.is_privileged());
    }
}
