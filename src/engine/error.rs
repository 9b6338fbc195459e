use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Every failure the payroll core can surface to a caller.
#[derive(Debug, Error)]
pub enum PayrollError {
    /// Missing or unresolvable payment field / statutory rule reference.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("payroll {payroll_id} total {stored} diverges from field values sum {computed}")]
    Consistency {
        payroll_id: u64,
        stored: Decimal,
        computed: Decimal,
    },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("payroll run already exists for site {site_id} {month:02}/{year}")]
    DuplicateRun { site_id: u64, month: u32, year: i32 },

    #[error("payroll {0} is approved and can no longer be modified")]
    RunLocked(u64),

    #[error("cannot move payroll from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),
}

impl PayrollError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PayrollError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Errors that only invalidate one employee's entry during a run build.
    pub fn is_employee_scoped(&self) -> bool {
        matches!(
            self,
            PayrollError::Configuration(_) | PayrollError::NotFound { .. }
        )
    }
}

impl From<sqlx::Error> for PayrollError {
    fn from(err: sqlx::Error) -> Self {
        PayrollError::Database(err.to_string())
    }
}

impl ResponseError for PayrollError {
    fn status_code(&self) -> StatusCode {
        match self {
            PayrollError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PayrollError::Consistency { .. } => StatusCode::CONFLICT,
            PayrollError::Permission(_) => StatusCode::FORBIDDEN,
            PayrollError::NotFound { .. } => StatusCode::NOT_FOUND,
            PayrollError::DuplicateRun { .. } => StatusCode::CONFLICT,
            PayrollError::RunLocked(_) => StatusCode::CONFLICT,
            PayrollError::InvalidTransition { .. } => StatusCode::CONFLICT,
            PayrollError::Validation(_) => StatusCode::BAD_REQUEST,
            PayrollError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // never leak driver messages
            PayrollError::Database(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
