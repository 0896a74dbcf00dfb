use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::AuditQuery;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;
use crate::types::AuditAction;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogFilter {
    /// actor username
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    /// entity kind
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// GET /api/v1/admin/audit-logs
pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<Response, HrError> {
    let action = filter.action.as_deref().map(str::parse::<AuditAction>).transpose()?;
    let query = AuditQuery {
        actor: filter.user,
        action,
        entity_kind: filter.entity,
        from: filter.from,
        to: filter.to,
        limit: filter.limit,
        offset: filter.offset,
    };
    Ok(response::ok("audit entries", state.store.audit_entries(&query)?))
}
