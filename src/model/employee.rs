use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Read model of an employee as the payroll core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub company_id: u64,

    #[schema(example = 4)]
    pub site_id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

impl Employee {
    /// Active and already hired by the end of the period.
    pub fn is_payable(&self, period_end: NaiveDate) -> bool {
        self.status == "active" && self.hire_date <= period_end
    }
}
