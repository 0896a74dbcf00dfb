use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::HrError;
use crate::http::response::{self, CurrentUser};
use crate::http::SharedState;
use crate::types::{Month, PayPeriod};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub month: Month,
    pub year: i32,
}

/// POST /api/v1/payruns/generate
pub async fn generate(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, HrError> {
    let period = PayPeriod::new(request.month, request.year)?;
    let payrun = state.payruns.generate(period, &current.username)?;
    Ok(response::created(format!("pay run generated for {period}"), payrun))
}

/// GET /api/v1/payruns
pub async fn list(State(state): State<SharedState>) -> Result<Response, HrError> {
    Ok(response::ok("pay runs", state.store.payruns()?))
}

/// GET /api/v1/payruns/:id
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let payrun = state
        .store
        .payrun(&id)?
        .ok_or_else(|| HrError::not_found("pay run", id.to_string()))?;
    Ok(response::ok("pay run", payrun))
}

/// GET /api/v1/payruns/:id/export — CSV derived from the stored line items
pub async fn export(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HrError> {
    let payrun = state
        .store
        .payrun(&id)?
        .ok_or_else(|| HrError::not_found("pay run", id.to_string()))?;

    let filename = format!(
        "payrun-{}-{}.csv",
        payrun.period.year,
        payrun.period.month.as_str().to_lowercase()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        payrun.to_csv(),
    )
        .into_response())
}
