use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatutoryKind {
    /// Employees' provident fund.
    Epf,
    /// Employees' state insurance.
    Esi,
    /// Professional tax.
    Pt,
    /// Labour welfare fund.
    Lwf,
    StatutoryBonus,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Percentage,
    Fixed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeductionCycle {
    Monthly,
    Yearly,
}

/// Company-configured statutory rule. Percentages are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatutoryRule {
    pub id: u64,
    pub company_id: u64,
    pub kind: StatutoryKind,
    pub value_kind: ValueKind,
    pub employee_contribution: Decimal,
    pub employer_contribution: Decimal,
    pub deduction_cycle: DeductionCycle,
    /// Only pay out in this month (1-12). Used by statutory bonus.
    pub payout_month: Option<u32>,
    /// EPF: contribution base cap. ESI: eligibility ceiling on the base.
    pub wage_ceiling: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStatutoryRule {
    pub value_kind: ValueKind,
    pub employee_contribution: Decimal,
    #[serde(default)]
    pub employer_contribution: Decimal,
    pub deduction_cycle: DeductionCycle,
    pub payout_month: Option<u32>,
    pub wage_ceiling: Option<Decimal>,
}

/// A yearly-cycle rule charged to an employee, keyed by the value that
/// carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatutoryApplication {
    pub employee_id: u64,
    pub kind: StatutoryKind,
    pub year: i32,
    pub salary_field_value_id: u64,
}
