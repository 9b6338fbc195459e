use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::payment_field::FieldType;

/// One employee's row in a payroll run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalaryEntry {
    pub id: u64,
    pub payroll_id: u64,
    pub employee_id: u64,
    #[schema(example = "26")]
    pub present_days: Decimal,
    #[schema(example = "4.5")]
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewSalaryEntry {
    pub payroll_id: u64,
    pub employee_id: u64,
    pub present_days: Decimal,
    pub overtime_hours: Decimal,
}

/// One earning or deduction line in a salary entry. `amount` is never
/// negative; `field_type` alone decides the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryFieldValue {
    pub id: u64,
    pub salary_entry_id: u64,
    pub payroll_field_id: u64,
    pub name: String,
    #[schema(example = "1000.00")]
    pub amount: Decimal,
    pub field_type: FieldType,
}

impl SalaryFieldValue {
    pub fn contribution(&self) -> Decimal {
        self.field_type.signed(self.amount)
    }
}

#[derive(Debug, Clone)]
pub struct NewSalaryFieldValue {
    pub salary_entry_id: u64,
    pub payroll_field_id: u64,
    pub name: String,
    pub amount: Decimal,
    pub field_type: FieldType,
}

/// Net contribution of a set of values: earnings minus deductions.
pub fn net_contribution<'a>(values: impl IntoIterator<Item = &'a SalaryFieldValue>) -> Decimal {
    values.into_iter().map(SalaryFieldValue::contribution).sum()
}
