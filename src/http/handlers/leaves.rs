use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::HrError;
use crate::http::response::{self, CurrentUser};
use crate::http::SharedState;
use crate::leave::CreateLeave;
use crate::types::EmployeeId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub comments: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRequest {
    pub reason: String,
}

/// true when the current user is the employee the record belongs to;
/// users map to employees through the official email
fn owns_employee(
    state: &SharedState,
    current: &CurrentUser,
    employee_id: &EmployeeId,
) -> Result<bool, HrError> {
    let Some(user) = state.store.user_by_username(&current.username)? else {
        return Ok(false);
    };
    let Some(employee) = state.store.employee(employee_id)? else {
        return Ok(false);
    };
    Ok(employee.employment.official_email.eq_ignore_ascii_case(&user.email))
}

fn ensure_owner_or_privileged(
    state: &SharedState,
    current: &CurrentUser,
    employee_id: &EmployeeId,
) -> Result<(), HrError> {
    if current.is_privileged() || owns_employee(state, current, employee_id)? {
        return Ok(());
    }
    Err(HrError::Unauthorized("not the owner of this leave record".to_string()))
}

/// POST /api/v1/leaves
pub async fn create(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateLeave>,
) -> Result<Response, HrError> {
    ensure_owner_or_privileged(&state, &current, &request.employee_id)?;
    let leave = state.leaves.create(request).await?;
    Ok(response::created("leave requested", leave))
}

/// GET /api/v1/leaves/:id
pub async fn get(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let leave = state.leaves.get(&id)?;
    ensure_owner_or_privileged(&state, &current, &leave.employee_id)?;
    Ok(response::ok("leave request", leave))
}

/// GET /api/v1/leaves/employee/:eid
pub async fn by_employee(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(eid): Path<String>,
) -> Result<Response, HrError> {
    let employee_id: EmployeeId = eid.parse()?;
    ensure_owner_or_privileged(&state, &current, &employee_id)?;
    Ok(response::ok("leave requests", state.leaves.for_employee(&employee_id)?))
}

/// PUT /api/v1/leaves/:id/manager-approve
pub async fn manager_approve(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, HrError> {
    let leave = state.leaves.manager_approve(id, &current.username, request.comments).await?;
    Ok(response::ok("leave approved by manager", leave))
}

/// PUT /api/v1/leaves/:id/admin-approve
pub async fn admin_approve(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, HrError> {
    let leave = state.leaves.admin_approve(id, &current.username, request.comments).await?;
    Ok(response::ok("leave approved", leave))
}

/// PUT /api/v1/leaves/:id/reject
pub async fn reject(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectionRequest>,
) -> Result<Response, HrError> {
    let leave =
        state.leaves.reject(id, &current.username, &current.roles, request.reason).await?;
    Ok(response::ok("leave rejected", leave))
}

/// PUT /api/v1/leaves/:id/cancel — owner or HR/MANAGER/ADMIN
pub async fn cancel(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let leave = state.leaves.get(&id)?;
    ensure_owner_or_privileged(&state, &current, &leave.employee_id)?;
    let leave = state.leaves.cancel(id).await?;
    Ok(response::ok("leave cancelled", leave))
}
