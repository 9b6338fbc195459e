//! Incremental maintenance of `PayrollRun::total_net_amount`.
//!
//! Every mutation applies a signed delta to the stored total instead of
//! summing the run again. The value write and the total write happen in the
//! same transaction, after the run row is locked, so two concurrent edits on
//! one run cannot both start from the same stale total.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::engine::money::ensure_non_negative;
use crate::engine::statutory::get_rule;
use crate::model::payment_field::{CalculationBasis, FieldType};
use crate::model::payroll::PayrollRun;
use crate::model::salary_entry::{net_contribution, NewSalaryFieldValue, SalaryFieldValue};
use crate::model::statutory::StatutoryApplication;
use crate::store::{PayrollStore, StoreTx};

/// Change in net pay when a value of `field_type` moves from `previous` to
/// `new`.
pub fn edit_delta(field_type: FieldType, previous: Decimal, new: Decimal) -> Decimal {
    match field_type {
        FieldType::Earning => new - previous,
        FieldType::Deduction => previous - new,
    }
}

async fn lock_run(
    ctx: &PayrollContext,
    tx: &mut dyn StoreTx,
    payroll_id: u64,
) -> Result<PayrollRun, PayrollError> {
    tx.lock_payroll_run(ctx.company_id, payroll_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("payroll", payroll_id))
}

/// Locks the run owning `value_id`, then reads the value under that lock.
async fn lock_value_and_run(
    ctx: &PayrollContext,
    tx: &mut dyn StoreTx,
    value_id: u64,
) -> Result<(PayrollRun, SalaryFieldValue), PayrollError> {
    let value = tx
        .get_field_value(value_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("salary field value", value_id))?;
    let entry = tx
        .get_salary_entry(value.salary_entry_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("salary entry", value.salary_entry_id))?;
    let run = lock_run(ctx, tx, entry.payroll_id).await?;

    // the pre-lock read may be stale
    let value = tx
        .get_field_value(value_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("salary field value", value_id))?;
    Ok((run, value))
}

#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn apply_field_value_edit(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    value_id: u64,
    new_amount: Decimal,
) -> Result<PayrollRun, PayrollError> {
    ctx.require_payroll_write()?;
    ensure_non_negative(new_amount, "amount")?;

    let mut tx = store.begin().await?;
    let (mut run, value) = lock_value_and_run(ctx, &mut *tx, value_id).await?;
    run.ensure_mutable()?;

    let delta = edit_delta(value.field_type, value.amount, new_amount);
    tx.update_field_value_amount(value.id, new_amount).await?;
    run.total_net_amount += delta;
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(
        payroll_id = run.id,
        value_id,
        previous = %value.amount,
        new = %new_amount,
        delta = %delta,
        total_net_amount = %run.total_net_amount,
        "Field value edited"
    );
    Ok(run)
}

/// Adds `field_id` at its default amount to every entry currently in the run.
/// A field under a yearly statutory rule skips employees already charged that
/// year and records the charge for the rest.
#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn add_field_to_run(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    payroll_id: u64,
    field_id: u64,
) -> Result<PayrollRun, PayrollError> {
    ctx.require_payroll_write()?;

    let mut tx = store.begin().await?;
    let field = tx
        .get_payment_field(ctx.company_id, field_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("payment field", field_id))?;
    let amount = field.default_amount.unwrap_or(Decimal::ZERO);
    ensure_non_negative(amount, "default_amount")?;

    let mut run = lock_run(ctx, &mut *tx, payroll_id).await?;
    run.ensure_mutable()?;

    // count taken under the run lock
    let entries = tx.list_salary_entries(run.id).await?;
    let existing = tx.list_run_field_values(run.id).await?;
    if let Some(dup) = existing.iter().find(|v| v.payroll_field_id == field.id) {
        return Err(PayrollError::Validation(format!(
            "field '{}' is already present on salary entry {}",
            field.name, dup.salary_entry_id
        )));
    }

    let yearly_kind = match field.calculation_basis {
        CalculationBasis::Statutory { statutory, .. } => {
            let rule = get_rule(ctx, &mut *tx, statutory).await?;
            rule.is_yearly().then_some(statutory)
        }
        _ => None,
    };

    let mut added = 0u64;
    for entry in &entries {
        if let Some(kind) = yearly_kind {
            if tx
                .has_statutory_application(entry.employee_id, kind, run.year)
                .await?
            {
                debug!(employee_id = entry.employee_id, %kind, year = run.year, "Yearly charge already applied, entry skipped");
                continue;
            }
        }
        let value = tx
            .insert_field_value(&NewSalaryFieldValue {
                salary_entry_id: entry.id,
                payroll_field_id: field.id,
                name: field.name.clone(),
                amount,
                field_type: field.field_type,
            })
            .await?;
        if let Some(kind) = yearly_kind {
            tx.record_statutory_application(&StatutoryApplication {
                employee_id: entry.employee_id,
                kind,
                year: run.year,
                salary_field_value_id: value.id,
            })
            .await?;
        }
        added += 1;
    }

    let delta = field.field_type.signed(amount) * Decimal::from(added);
    run.total_net_amount += delta;
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(
        payroll_id = run.id,
        field = %field.name,
        entries = added,
        delta = %delta,
        total_net_amount = %run.total_net_amount,
        "Field added to payroll"
    );
    Ok(run)
}

#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn remove_field_value(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    value_id: u64,
) -> Result<PayrollRun, PayrollError> {
    ctx.require_payroll_write()?;

    let mut tx = store.begin().await?;
    let (mut run, value) = lock_value_and_run(ctx, &mut *tx, value_id).await?;
    run.ensure_mutable()?;

    tx.release_statutory_applications(&[value.id]).await?;
    tx.delete_field_value(value.id).await?;
    run.total_net_amount -= value.contribution();
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(
        payroll_id = run.id,
        value_id,
        total_net_amount = %run.total_net_amount,
        "Field value removed"
    );
    Ok(run)
}

/// Removes an employee's entry and retracts its whole contribution.
#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn delete_salary_entry(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    entry_id: u64,
) -> Result<PayrollRun, PayrollError> {
    ctx.require_payroll_write()?;

    let mut tx = store.begin().await?;
    let entry = tx
        .get_salary_entry(entry_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("salary entry", entry_id))?;
    let mut run = lock_run(ctx, &mut *tx, entry.payroll_id).await?;
    run.ensure_mutable()?;

    // a concurrent delete that won the lock already retracted it
    let entry = tx
        .get_salary_entry(entry_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("salary entry", entry_id))?;

    let values = tx.list_field_values(entry.id).await?;
    let contribution = net_contribution(&values);
    let value_ids: Vec<u64> = values.iter().map(|v| v.id).collect();

    tx.release_statutory_applications(&value_ids).await?;
    tx.delete_salary_entry(entry.id).await?;
    run.total_net_amount -= contribution;
    run.total_employees = run.total_employees.saturating_sub(1);
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(
        payroll_id = run.id,
        entry_id,
        employee_id = entry.employee_id,
        retracted = %contribution,
        total_net_amount = %run.total_net_amount,
        "Salary entry deleted"
    );
    Ok(run)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Reconciliation {
    pub payroll_id: u64,
    pub stored_total: Decimal,
    pub computed_total: Decimal,
    pub drift: Decimal,
    pub stored_employees: u32,
    pub computed_employees: u32,
    pub repaired: bool,
}

/// Recomputes the run total from its field values and compares it with the
/// stored aggregate. A mismatch is a consistency error unless `repair` is
/// set, in which case the stored aggregate is overwritten.
#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn reconcile_run(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    payroll_id: u64,
    repair: bool,
) -> Result<Reconciliation, PayrollError> {
    ctx.require_payroll_read()?;
    if repair {
        ctx.require_admin()?;
    }

    let mut tx = store.begin().await?;
    let mut run = lock_run(ctx, &mut *tx, payroll_id).await?;
    let entries = tx.list_salary_entries(run.id).await?;
    let values = tx.list_run_field_values(run.id).await?;

    let computed_total = net_contribution(&values);
    let computed_employees = entries.len() as u32;
    let mut report = Reconciliation {
        payroll_id,
        stored_total: run.total_net_amount,
        computed_total,
        drift: run.total_net_amount - computed_total,
        stored_employees: run.total_employees,
        computed_employees,
        repaired: false,
    };

    if report.drift.is_zero() && report.stored_employees == computed_employees {
        tx.commit().await?;
        return Ok(report);
    }

    if !repair {
        warn!(
            payroll_id,
            stored = %report.stored_total,
            computed = %report.computed_total,
            "Payroll total diverges from field values"
        );
        return Err(PayrollError::Consistency {
            payroll_id,
            stored: report.stored_total,
            computed: report.computed_total,
        });
    }

    run.total_net_amount = computed_total;
    run.total_employees = computed_employees;
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;
    report.repaired = true;

    warn!(
        payroll_id,
        drift = %report.drift,
        "Payroll total repaired from field values"
    );
    Ok(report)
}
