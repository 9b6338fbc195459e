use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Pending,
    Approved,
}

impl PayrollStatus {
    pub fn can_transition_to(self, next: PayrollStatus) -> bool {
        matches!(
            (self, next),
            (PayrollStatus::Draft, PayrollStatus::Pending)
                | (PayrollStatus::Pending, PayrollStatus::Draft)
                | (PayrollStatus::Pending, PayrollStatus::Approved)
        )
    }
}

/// One payroll cycle for a site and month.
///
/// `total_net_amount` is maintained by the engine on every mutation and must
/// always equal the signed sum of the run's field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollRun {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1)]
    pub company_id: u64,
    #[schema(example = 4)]
    pub site_id: u64,
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    pub status: PayrollStatus,
    #[schema(example = 3)]
    pub total_employees: u32,
    #[schema(example = "2640.00")]
    pub total_net_amount: Decimal,
}

impl PayrollRun {
    pub fn ensure_mutable(&self) -> Result<(), crate::engine::error::PayrollError> {
        if self.status == PayrollStatus::Approved {
            Err(crate::engine::error::PayrollError::RunLocked(self.id))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayrollRun {
    pub company_id: u64,
    pub site_id: u64,
    pub month: u32,
    pub year: i32,
}

/// Calendar month of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayPeriod {
    pub month: u32,
    pub year: i32,
}

impl PayPeriod {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { month, year })
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or_default()
    }

    pub fn days_in_month(&self) -> u32 {
        use chrono::Datelike;
        self.last_day().day()
    }
}
