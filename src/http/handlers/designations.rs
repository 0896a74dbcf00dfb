use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::Designation;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignationRequest {
    pub title: String,
    pub department: String,
    pub level: u8,
    #[serde(default)]
    pub reports_to: Option<String>,
}

/// POST /api/v1/designations
pub async fn create(
    State(state): State<SharedState>,
    Json(request): Json<DesignationRequest>,
) -> Result<Response, HrError> {
    let designation = Designation::new(
        request.title,
        request.department,
        request.level,
        request.reports_to,
        state.clock.now(),
    )?;
    state.store.insert_designation(&designation)?;
    Ok(response::created("designation created", designation))
}

/// GET /api/v1/designations
pub async fn list(State(state): State<SharedState>) -> Result<Response, HrError> {
    Ok(response::ok("designations", state.store.designations()?))
}

/// GET /api/v1/designations/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let designation = state
        .store
        .designation(&id)?
        .ok_or_else(|| HrError::not_found("designation", id.to_string()))?;
    Ok(response::ok("designation", designation))
}

/// PUT /api/v1/designations/:id
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DesignationRequest>,
) -> Result<Response, HrError> {
    let existing = state
        .store
        .designation(&id)?
        .ok_or_else(|| HrError::not_found("designation", id.to_string()))?;

    let updated = Designation {
        id: existing.id,
        title: request.title,
        department: request.department,
        level: request.level,
        reports_to: request.reports_to,
        created_at: existing.created_at,
        updated_at: state.clock.now(),
    };
    updated.validate()?;
    state.store.update_designation(&updated)?;
    Ok(response::ok("designation updated", updated))
}

/// DELETE /api/v1/designations/:id — refused while employees hold the title
pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let designation = state
        .store
        .designation(&id)?
        .ok_or_else(|| HrError::not_found("designation", id.to_string()))?;

    let in_use = state
        .store
        .employees()?
        .iter()
        .any(|e| e.employment.designation.eq_ignore_ascii_case(&designation.title));
    if in_use {
        return Err(HrError::Conflict(format!(
            "designation '{}' is referenced by employees",
            designation.title
        )));
    }

    state.store.delete_designation(&id)?;
    Ok(response::ok_empty("designation deleted"))
}
