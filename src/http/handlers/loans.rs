use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::Loan;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;
use crate::money::{Money, Rate};
use crate::types::{EmployeeId, Month, PayPeriod};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub employee_id: EmployeeId,
    pub principal: Money,
    #[serde(default)]
    pub annual_interest_rate: Rate,
    pub emi_count: u32,
    pub start_month: Month,
    pub start_year: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanFilter {
    pub employee_id: EmployeeId,
}

/// POST /api/v1/loans
pub async fn create(
    State(state): State<SharedState>,
    Json(request): Json<LoanRequest>,
) -> Result<Response, HrError> {
    if state.store.employee(&request.employee_id)?.is_none() {
        return Err(HrError::not_found("employee", request.employee_id.to_string()));
    }
    let loan = Loan::originate(
        request.employee_id,
        request.principal,
        request.annual_interest_rate,
        request.emi_count,
        PayPeriod::new(request.start_month, request.start_year)?,
        state.clock.now(),
    )?;
    state.store.insert_loan(&loan)?;
    Ok(response::created("loan created", loan))
}

/// GET /api/v1/loans?employeeId=EMP...
pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<LoanFilter>,
) -> Result<Response, HrError> {
    Ok(response::ok("loans", state.store.loans_for_employee(&filter.employee_id)?))
}

/// GET /api/v1/loans/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let loan =
        state.store.loan(&id)?.ok_or_else(|| HrError::not_found("loan", id.to_string()))?;
    Ok(response::ok("loan", loan))
}

/// PUT /api/v1/loans/:id — terms change only before the first EMI
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LoanRequest>,
) -> Result<Response, HrError> {
    let existing =
        state.store.loan(&id)?.ok_or_else(|| HrError::not_found("loan", id.to_string()))?;
    if existing.paid_emi_count > 0 || existing.status != crate::types::LoanStatus::Active {
        return Err(HrError::Conflict(format!(
            "loan {id} has started repayment and its terms are frozen"
        )));
    }

    let mut updated = Loan::originate(
        request.employee_id,
        request.principal,
        request.annual_interest_rate,
        request.emi_count,
        PayPeriod::new(request.start_month, request.start_year)?,
        state.clock.now(),
    )?;
    updated.id = existing.id;
    updated.created_at = existing.created_at;
    state.store.update_loan(&updated)?;
    Ok(response::ok("loan updated", updated))
}

/// PUT /api/v1/loans/:id/cancel — ADMIN only, freezes the unpaid tail
pub async fn cancel(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let mut loan =
        state.store.loan(&id)?.ok_or_else(|| HrError::not_found("loan", id.to_string()))?;
    loan.cancel(state.clock.now())?;
    state.store.update_loan(&loan)?;
    Ok(response::ok("loan cancelled", loan))
}

/// DELETE /api/v1/loans/:id — only before the first EMI
pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let existing =
        state.store.loan(&id)?.ok_or_else(|| HrError::not_found("loan", id.to_string()))?;
    if existing.paid_emi_count > 0 {
        return Err(HrError::Conflict(format!(
            "loan {id} is referenced by payroll and cannot be deleted; cancel it instead"
        )));
    }
    state.store.delete_loan(&id)?;
    Ok(response::ok_empty("loan deleted"))
}
