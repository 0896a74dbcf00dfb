use serde::Serialize;
use thiserror::Error;

/// one field-localized validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum HrError {
    #[error("{message}")]
    InvalidInput {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("illegal state transition: {from} -> {to}")]
    IllegalStateTransition { from: String, to: String },

    #[error("{0}")]
    DomainRuleViolation(String),

    #[error("pay run generation failed for employee {employee_id}: {reason}")]
    PayRunGenerationFailed { employee_id: String, reason: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("request deadline exceeded")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl HrError {
    /// single-field validation failure
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        HrError::InvalidInput {
            message: message.clone(),
            errors: vec![FieldError { field, message }],
        }
    }

    /// validation failure not attached to one field
    pub fn invalid(message: impl Into<String>) -> Self {
        HrError::InvalidInput { message: message.into(), errors: Vec::new() }
    }

    /// multi-field validation failure
    pub fn invalid_fields(errors: Vec<FieldError>) -> Self {
        let message = errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "validation failed".to_string());
        HrError::InvalidInput { message, errors }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        HrError::NotFound { kind, id: id.into() }
    }

    pub fn illegal_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        HrError::IllegalStateTransition { from: from.into(), to: to.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HrError::Internal(message.into())
    }

    /// HTTP status class for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            HrError::InvalidInput { .. } => 400,
            HrError::Unauthenticated(_) => 401,
            HrError::Unauthorized(_) => 403,
            HrError::NotFound { .. } => 404,
            HrError::Conflict(_) => 409,
            HrError::IllegalStateTransition { .. } => 422,
            HrError::DomainRuleViolation(_) => 422,
            HrError::PayRunGenerationFailed { .. } => 422,
            HrError::RateLimited { .. } => 429,
            HrError::Timeout => 504,
            HrError::Internal(_) => 500,
        }
    }

    /// message safe to show to clients; internals are masked
    pub fn client_message(&self) -> String {
        match self {
            HrError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            HrError::InvalidInput { errors, .. } => errors,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, HrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(HrError::invalid("bad").status_code(), 400);
        assert_eq!(HrError::Unauthenticated("no token".into()).status_code(), 401);
        assert_eq!(HrError::Unauthorized("role missing".into()).status_code(), 403);
        assert_eq!(HrError::not_found("employee", "EMP00000000").status_code(), 404);
        assert_eq!(HrError::Conflict("duplicate".into()).status_code(), 409);
        assert_eq!(HrError::illegal_transition("PENDING", "ADMIN_APPROVED").status_code(), 422);
        assert_eq!(HrError::RateLimited { retry_after_secs: 60 }.status_code(), 429);
        assert_eq!(HrError::Timeout.status_code(), 504);
        assert_eq!(HrError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_internal_details_masked() {
        let err = HrError::internal("sled tree corrupted at byte 12");
        assert_eq!(err.client_message(), "internal error");

        let err = HrError::Conflict("pay run already generated for January 2025".into());
        assert_eq!(err.client_message(), "pay run already generated for January 2025");
    }

    #[test]
    fn test_field_errors_carried() {
        let err = HrError::invalid_input("hraPercent", "must be between 0 and 100");
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "hraPercent");
    }
}
