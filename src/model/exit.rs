use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Final settlement of an employee leaving the company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ExitRecord {
    pub id: u64,
    pub company_id: u64,
    pub employee_id: u64,
    #[schema(example = "2025-03-31", value_type = String, format = "date")]
    pub exit_date: NaiveDate,
    pub reason: Option<String>,
    #[schema(example = "5000.00")]
    pub bonus: Decimal,
    #[schema(example = "2000.00")]
    pub leave_encashment: Decimal,
    #[schema(example = "10000.00")]
    pub gratuity: Decimal,
    #[schema(example = "1500.00")]
    pub deduction: Decimal,
    #[schema(example = "15500.00")]
    pub net_pay: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewExit {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "2025-03-31", value_type = String, format = "date")]
    pub exit_date: NaiveDate,
    pub reason: Option<String>,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub leave_encashment: Decimal,
    #[serde(default)]
    pub gratuity: Decimal,
    #[serde(default)]
    pub deduction: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExitPatch {
    #[schema(example = "2025-04-15", value_type = Option<String>, format = "date")]
    pub exit_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub bonus: Option<Decimal>,
    pub leave_encashment: Option<Decimal>,
    pub gratuity: Option<Decimal>,
    pub deduction: Option<Decimal>,
}
