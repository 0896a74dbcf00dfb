use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::domain::employee::{BankInfo, CompensationInput, EmploymentInfo, PersonalInfo};
use crate::domain::Employee;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;
use crate::payroll::decompose;
use crate::types::{EmployeeId, EmployeeStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    pub personal: PersonalInfo,
    pub employment: EmploymentInfo,
    pub compensation: CompensationInput,
    #[serde(default)]
    pub bank: Option<BankInfo>,
    /// only honored on update
    #[serde(default)]
    pub status: Option<EmployeeStatus>,
}

fn parse_id(raw: &str) -> Result<EmployeeId, HrError> {
    raw.parse::<EmployeeId>()
}

/// POST /api/v1/employees
pub async fn create(
    State(state): State<SharedState>,
    Json(request): Json<EmployeeRequest>,
) -> Result<Response, HrError> {
    let monthly = decompose(&request.compensation, &state.config.statutory)?;
    let employee = Employee::new(
        request.personal,
        request.employment,
        request.compensation,
        monthly,
        request.bank,
        state.clock.now(),
    )?;
    state.store.insert_employee(&employee)?;
    Ok(response::created("employee created", employee))
}

/// GET /api/v1/employees
pub async fn list(State(state): State<SharedState>) -> Result<Response, HrError> {
    let employees = state.store.employees()?;
    Ok(response::ok("employees", employees))
}

/// GET /api/v1/employees/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, HrError> {
    let id = parse_id(&id)?;
    let employee = state
        .store
        .employee(&id)?
        .ok_or_else(|| HrError::not_found("employee", id.to_string()))?;
    Ok(response::ok("employee", employee))
}

/// PUT /api/v1/employees/:id
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<EmployeeRequest>,
) -> Result<Response, HrError> {
    let id = parse_id(&id)?;
    let existing = state
        .store
        .employee(&id)?
        .ok_or_else(|| HrError::not_found("employee", id.to_string()))?;

    let now = state.clock.now();
    let monthly = decompose(&request.compensation, &state.config.statutory)?;
    let updated = Employee {
        id: existing.id.clone(),
        personal: request.personal,
        employment: request.employment,
        compensation_input: request.compensation,
        compensation: monthly,
        bank: request.bank,
        status: request.status.unwrap_or(existing.status),
        created_at: existing.created_at,
        updated_at: now,
    };
    updated.validate(now.date_naive())?;
    state.store.update_employee(&updated)?;
    Ok(response::ok("employee updated", updated))
}

/// DELETE /api/v1/employees/:id
///
/// refused while payroll, loan, advance or leave records reference the
/// employee; flip status to INACTIVE instead
pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, HrError> {
    let id = parse_id(&id)?;
    if state.store.employee(&id)?.is_none() {
        return Err(HrError::not_found("employee", id.to_string()));
    }

    let has_dependents = !state.store.loans_for_employee(&id)?.is_empty()
        || !state.store.advances_for_employee(&id)?.is_empty()
        || !state.store.leaves_for_employee(&id)?.is_empty()
        || !state.store.attendance_for_employee(&id)?.is_empty();
    if has_dependents {
        return Err(HrError::Conflict(format!(
            "employee {id} has payroll or leave records; deactivate instead of deleting"
        )));
    }

    state.store.delete_employee(&id)?;
    Ok(response::ok_empty("employee deleted"))
}
