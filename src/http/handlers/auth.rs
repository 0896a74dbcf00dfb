use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::TokenKind;
use crate::domain::{AuditEntry, User};
use crate::errors::HrError;
use crate::http::middleware::client_ip;
use crate::http::response::{self, CorrelationId, CurrentUser};
use crate::http::SharedState;
use crate::types::{AuditAction, Role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub enabled: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            enabled: user.enabled,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in_secs: u64,
    pub user: UserProfile,
}

fn auth_audit(
    state: &SharedState,
    headers: &HeaderMap,
    correlation: Option<&CorrelationId>,
    username: &str,
    action: AuditAction,
) -> AuditEntry {
    AuditEntry::new(
        username,
        action,
        "auth",
        username,
        serde_json::json!({}),
        client_ip(headers, &axum::http::Extensions::new()),
        headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(String::from),
        correlation.map(|c| c.0.clone()),
        state.clock.now(),
    )
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<SharedState>,
    correlation: Option<Extension<CorrelationId>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, HrError> {
    let invalid = || HrError::Unauthenticated("invalid username or password".to_string());

    let mut user = state.store.user_by_username(&request.username)?.ok_or_else(invalid)?;
    if !user.enabled {
        return Err(HrError::Unauthenticated("account is disabled".to_string()));
    }
    if !state.passwords.verify(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    let now = state.clock.now();
    let token = state.tokens.issue(&user.username, &user.roles, TokenKind::Access, now)?;
    let refresh_token = state.tokens.issue(&user.username, &user.roles, TokenKind::Refresh, now)?;

    user.record_login(now);
    state.store.update_user(&user)?;

    // auth events are durable before the response completes
    state.audit.record_inline(auth_audit(
        &state,
        &headers,
        correlation.as_deref(),
        &user.username,
        AuditAction::Login,
    ))?;

    Ok(response::ok(
        "login successful",
        TokenResponse {
            token,
            refresh_token,
            token_type: "Bearer",
            expires_in_secs: state.tokens.access_ttl().as_secs(),
            user: UserProfile::from(&user),
        },
    ))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<SharedState>,
    correlation: Option<Extension<CorrelationId>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, HrError> {
    if request.password.chars().count() < 8 {
        return Err(HrError::invalid_input("password", "password must be at least 8 characters"));
    }

    let hash = state.passwords.hash(&request.password);
    // self-registration always lands at the USER role
    let user = User::new(request.username, request.email, hash, vec![Role::User], state.clock.now())?;
    state.store.insert_user(&user)?;

    state.audit.record_inline(auth_audit(
        &state,
        &headers,
        correlation.as_deref(),
        &user.username,
        AuditAction::Create,
    ))?;

    Ok(response::created("user registered", UserProfile::from(&user)))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<SharedState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Response, HrError> {
    let now = state.clock.now();
    let claims = state.tokens.verify(&request.refresh_token, now)?;
    if claims.kind != TokenKind::Refresh {
        return Err(HrError::Unauthenticated("refresh requires a refresh token".to_string()));
    }

    let user = state
        .store
        .user_by_username(&claims.sub)?
        .filter(|u| u.enabled)
        .ok_or_else(|| HrError::Unauthenticated("account is unavailable".to_string()))?;

    let token = state.tokens.issue(&user.username, &user.roles, TokenKind::Access, now)?;
    Ok(response::ok(
        "token refreshed",
        serde_json::json!({
            "token": token,
            "tokenType": "Bearer",
            "expiresInSecs": state.tokens.access_ttl().as_secs(),
        }),
    ))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, HrError> {
    let user = state
        .store
        .user_by_username(&current.username)?
        .ok_or_else(|| HrError::not_found("user", current.username.clone()))?;
    Ok(response::ok("profile", UserProfile::from(&user)))
}

/// POST /api/v1/auth/logout
///
/// tokens are stateless, so logout is an audit event; clients drop the token
pub async fn logout(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    correlation: Option<Extension<CorrelationId>>,
    headers: HeaderMap,
) -> Result<Response, HrError> {
    state.audit.record_inline(auth_audit(
        &state,
        &headers,
        correlation.as_deref(),
        &current.username,
        AuditAction::Logout,
    ))?;
    Ok(response::ok_empty("logged out"))
}
