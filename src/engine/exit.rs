//! Exit / final settlement.
//!
//! `compute_net_pay` backs both the live preview endpoint and the value that
//! is persisted, so both always agree. Net pay is recomputed on every write.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::engine::money::{ensure_non_negative, round_money};
use crate::model::exit::{ExitPatch, ExitRecord, NewExit};
use crate::model::role::Role;
use crate::store::PayrollStore;
use utoipa::ToSchema;

/// Working days per month used by the gratuity and encashment formulas.
const WORKING_DAYS_PER_MONTH: Decimal = dec!(26);
const GRATUITY_DAYS_PER_YEAR: Decimal = dec!(15);
const GRATUITY_MIN_YEARS: u32 = 5;

pub fn compute_net_pay(
    bonus: Decimal,
    leave_encashment: Decimal,
    gratuity: Decimal,
    deduction: Decimal,
) -> Decimal {
    bonus + leave_encashment + gratuity - deduction
}

/// Fifteen days of the last basic per completed year, nothing before five
/// completed years.
pub fn compute_gratuity(last_monthly_basic: Decimal, completed_years: u32) -> Decimal {
    if completed_years < GRATUITY_MIN_YEARS {
        return Decimal::ZERO;
    }
    round_money(
        last_monthly_basic * GRATUITY_DAYS_PER_YEAR / WORKING_DAYS_PER_MONTH
            * Decimal::from(completed_years),
    )
}

pub fn compute_leave_encashment(last_monthly_basic: Decimal, unused_days: Decimal) -> Decimal {
    round_money(last_monthly_basic / WORKING_DAYS_PER_MONTH * unused_days)
}

fn validate_inputs(
    bonus: Decimal,
    leave_encashment: Decimal,
    gratuity: Decimal,
    deduction: Decimal,
) -> Result<(), PayrollError> {
    ensure_non_negative(bonus, "bonus")?;
    ensure_non_negative(leave_encashment, "leave_encashment")?;
    ensure_non_negative(gratuity, "gratuity")?;
    ensure_non_negative(deduction, "deduction")
}

#[instrument(skip(store, exit), fields(company_id = ctx.company_id, employee_id = exit.employee_id))]
pub async fn create_exit(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    exit: &NewExit,
) -> Result<ExitRecord, PayrollError> {
    ctx.require_payroll_write()?;
    validate_inputs(exit.bonus, exit.leave_encashment, exit.gratuity, exit.deduction)?;

    let net_pay = compute_net_pay(exit.bonus, exit.leave_encashment, exit.gratuity, exit.deduction);

    let mut tx = store.begin().await?;
    let record = tx.insert_exit(ctx.company_id, exit, net_pay).await?;
    tx.commit().await?;

    info!(exit_id = record.id, net_pay = %record.net_pay, "Exit settlement recorded");
    Ok(record)
}

#[instrument(skip(store, patch), fields(company_id = ctx.company_id))]
pub async fn update_exit(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    exit_id: u64,
    patch: &ExitPatch,
) -> Result<ExitRecord, PayrollError> {
    ctx.require_payroll_write()?;

    let mut tx = store.begin().await?;
    let mut record = tx
        .get_exit(ctx.company_id, exit_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("exit", exit_id))?;

    if let Some(date) = patch.exit_date {
        record.exit_date = date;
    }
    if let Some(reason) = &patch.reason {
        record.reason = Some(reason.clone());
    }
    record.bonus = patch.bonus.unwrap_or(record.bonus);
    record.leave_encashment = patch.leave_encashment.unwrap_or(record.leave_encashment);
    record.gratuity = patch.gratuity.unwrap_or(record.gratuity);
    record.deduction = patch.deduction.unwrap_or(record.deduction);
    validate_inputs(record.bonus, record.leave_encashment, record.gratuity, record.deduction)?;

    record.net_pay = compute_net_pay(
        record.bonus,
        record.leave_encashment,
        record.gratuity,
        record.deduction,
    );
    tx.update_exit(&record).await?;
    tx.commit().await?;

    info!(exit_id, net_pay = %record.net_pay, "Exit settlement updated");
    Ok(record)
}

/// Payroll staff see any exit of the company; an employee only their own.
pub async fn get_exit(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    exit_id: u64,
    own_employee_id: Option<u64>,
) -> Result<ExitRecord, PayrollError> {
    let mut tx = store.begin().await?;
    let record = tx
        .get_exit(ctx.company_id, exit_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("exit", exit_id))?;
    tx.commit().await?;

    if ctx.role == Role::Employee && own_employee_id != Some(record.employee_id) {
        return Err(PayrollError::Permission(
            "employees may only read their own settlement".to_string(),
        ));
    }
    Ok(record)
}

/// Inputs to a settlement preview. Explicit amounts win; gratuity and leave
/// encashment are otherwise derived from the last monthly basic.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettlementInputs {
    #[serde(default)]
    pub bonus: Decimal,
    pub leave_encashment: Option<Decimal>,
    pub gratuity: Option<Decimal>,
    #[serde(default)]
    pub deduction: Decimal,
    #[schema(example = "26000.00")]
    pub last_monthly_basic: Option<Decimal>,
    #[schema(example = 6)]
    pub completed_years: Option<u32>,
    #[schema(example = "12")]
    pub unused_leave_days: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SettlementPreview {
    pub bonus: Decimal,
    pub leave_encashment: Decimal,
    pub gratuity: Decimal,
    pub deduction: Decimal,
    pub net_pay: Decimal,
}

/// Computes a settlement without storing anything.
pub fn preview_settlement(
    ctx: &PayrollContext,
    inputs: &SettlementInputs,
) -> Result<SettlementPreview, PayrollError> {
    ctx.require_payroll_read()?;

    let gratuity = match (inputs.gratuity, inputs.last_monthly_basic, inputs.completed_years) {
        (Some(amount), _, _) => amount,
        (None, Some(basic), Some(years)) => compute_gratuity(basic, years),
        _ => Decimal::ZERO,
    };
    let leave_encashment = match (
        inputs.leave_encashment,
        inputs.last_monthly_basic,
        inputs.unused_leave_days,
    ) {
        (Some(amount), _, _) => amount,
        (None, Some(basic), Some(days)) => {
            ensure_non_negative(days, "unused_leave_days")?;
            compute_leave_encashment(basic, days)
        }
        _ => Decimal::ZERO,
    };
    if let Some(basic) = inputs.last_monthly_basic {
        ensure_non_negative(basic, "last_monthly_basic")?;
    }
    validate_inputs(inputs.bonus, leave_encashment, gratuity, inputs.deduction)?;

    Ok(SettlementPreview {
        bonus: inputs.bonus,
        leave_encashment,
        gratuity,
        deduction: inputs.deduction,
        net_pay: compute_net_pay(inputs.bonus, leave_encashment, gratuity, inputs.deduction),
    })
}
