use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::AttendanceRecord;
use crate::errors::HrError;
use crate::http::response;
use crate::http::SharedState;
use crate::types::{EmployeeId, Month, PayPeriod};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub employee_id: EmployeeId,
    pub month: Month,
    pub year: i32,
    pub total_working_days: u8,
    pub present_days: u8,
    pub absent_days: u8,
    pub paid_leave_days: u8,
    pub unpaid_leave_days: u8,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilter {
    pub employee_id: EmployeeId,
}

/// refuse writes for a period whose pay-run has already consumed attendance
fn ensure_period_open(state: &SharedState, period: PayPeriod) -> Result<(), HrError> {
    if state.store.payrun_for_period(period)?.is_some() {
        return Err(HrError::Conflict(format!(
            "attendance for {period} is frozen: its pay run was already generated"
        )));
    }
    Ok(())
}

fn build_record(
    state: &SharedState,
    request: AttendanceRequest,
) -> Result<AttendanceRecord, HrError> {
    let period = PayPeriod::new(request.month, request.year)?;
    if state.store.employee(&request.employee_id)?.is_none() {
        return Err(HrError::not_found("employee", request.employee_id.to_string()));
    }
    ensure_period_open(state, period)?;

    let now = state.clock.now();
    let mut record = AttendanceRecord::compute(
        request.employee_id,
        period,
        request.total_working_days,
        request.present_days,
        request.absent_days,
        request.paid_leave_days,
        request.unpaid_leave_days,
        request.remarks,
        now,
    )?;

    // upsert by (employee, period): keep the original identity
    if let Some(existing) = state.store.attendance_for(&record.employee_id, period)? {
        record.id = existing.id;
        record.created_at = existing.created_at;
    }
    Ok(record)
}

/// POST /api/v1/attendance — upsert by (employee, month, year)
pub async fn upsert(
    State(state): State<SharedState>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Response, HrError> {
    let record = build_record(&state, request)?;
    state.store.upsert_attendance(&record)?;
    Ok(response::created("attendance recorded", record))
}

/// GET /api/v1/attendance?employeeId=EMP...
pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<AttendanceFilter>,
) -> Result<Response, HrError> {
    Ok(response::ok(
        "attendance records",
        state.store.attendance_for_employee(&filter.employee_id)?,
    ))
}

/// GET /api/v1/attendance/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let record = state
        .store
        .attendance_by_id(&id)?
        .ok_or_else(|| HrError::not_found("attendance record", id.to_string()))?;
    Ok(response::ok("attendance record", record))
}

/// PUT /api/v1/attendance/:id
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Response, HrError> {
    let existing = state
        .store
        .attendance_by_id(&id)?
        .ok_or_else(|| HrError::not_found("attendance record", id.to_string()))?;
    // the record addressed by id must be the one for (employee, period)
    let period = PayPeriod::new(request.month, request.year)?;
    if existing.employee_id != request.employee_id || existing.period != period {
        return Err(HrError::invalid(
            "attendance identity (employee, month, year) cannot change; file a new record",
        ));
    }

    let record = build_record(&state, request)?;
    state.store.upsert_attendance(&record)?;
    Ok(response::ok("attendance updated", record))
}

/// DELETE /api/v1/attendance/:id
pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let existing = state
        .store
        .attendance_by_id(&id)?
        .ok_or_else(|| HrError::not_found("attendance record", id.to_string()))?;
    ensure_period_open(&state, existing.period)?;
    state.store.delete_attendance(&id)?;
    Ok(response::ok_empty("attendance deleted"))
}
