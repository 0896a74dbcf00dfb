use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::Advance;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;
use crate::money::Money;
use crate::types::{AdvanceStatus, EmployeeId, Month, PayPeriod};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub employee_id: EmployeeId,
    pub advance_month: Month,
    pub advance_year: i32,
    pub paid_amount: Money,
    pub deduction_month: Month,
    pub deduction_year: i32,
    #[serde(default)]
    pub partial_allowed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceFilter {
    pub employee_id: EmployeeId,
}

/// POST /api/v1/advances
pub async fn create(
    State(state): State<SharedState>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Response, HrError> {
    if state.store.employee(&request.employee_id)?.is_none() {
        return Err(HrError::not_found("employee", request.employee_id.to_string()));
    }
    let advance = Advance::new(
        request.employee_id,
        PayPeriod::new(request.advance_month, request.advance_year)?,
        request.paid_amount,
        PayPeriod::new(request.deduction_month, request.deduction_year)?,
        request.partial_allowed,
        state.clock.now(),
    )?;
    state.store.insert_advance(&advance)?;
    Ok(response::created("advance recorded", advance))
}

/// GET /api/v1/advances?employeeId=EMP...
pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<AdvanceFilter>,
) -> Result<Response, HrError> {
    Ok(response::ok("advances", state.store.advances_for_employee(&filter.employee_id)?))
}

/// GET /api/v1/advances/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let advance = state
        .store
        .advance(&id)?
        .ok_or_else(|| HrError::not_found("advance", id.to_string()))?;
    Ok(response::ok("advance", advance))
}

/// PUT /api/v1/advances/:id — only while recovery has not started
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Response, HrError> {
    let existing = state
        .store
        .advance(&id)?
        .ok_or_else(|| HrError::not_found("advance", id.to_string()))?;
    if existing.status != AdvanceStatus::Pending {
        return Err(HrError::Conflict(format!(
            "advance {id} has started recovery and cannot be modified"
        )));
    }

    let mut updated = Advance::new(
        request.employee_id,
        PayPeriod::new(request.advance_month, request.advance_year)?,
        request.paid_amount,
        PayPeriod::new(request.deduction_month, request.deduction_year)?,
        request.partial_allowed,
        state.clock.now(),
    )?;
    updated.id = existing.id;
    updated.created_at = existing.created_at;
    state.store.update_advance(&updated)?;
    Ok(response::ok("advance updated", updated))
}

/// DELETE /api/v1/advances/:id — only while recovery has not started
pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let existing = state
        .store
        .advance(&id)?
        .ok_or_else(|| HrError::not_found("advance", id.to_string()))?;
    if existing.status != AdvanceStatus::Pending {
        return Err(HrError::Conflict(format!(
            "advance {id} is referenced by payroll and cannot be deleted"
        )));
    }
    state.store.delete_advance(&id)?;
    Ok(response::ok_empty("advance deleted"))
}
