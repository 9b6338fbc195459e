//! Payroll run status transitions, reads and deletion.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::model::payroll::{PayrollRun, PayrollStatus};
use crate::model::salary_entry::{net_contribution, SalaryEntry, SalaryFieldValue};
use crate::store::PayrollStore;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntryDetail {
    pub entry: SalaryEntry,
    pub values: Vec<SalaryFieldValue>,
    pub net_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunDetail {
    pub run: PayrollRun,
    pub entries: Vec<EntryDetail>,
}

/// Moves a run along draft -> pending -> approved. Approval is Admin only
/// and final.
#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn transition_status(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    payroll_id: u64,
    next: PayrollStatus,
) -> Result<PayrollRun, PayrollError> {
    ctx.require_payroll_write()?;
    if next == PayrollStatus::Approved {
        ctx.require_admin()?;
    }

    let mut tx = store.begin().await?;
    let mut run = tx
        .lock_payroll_run(ctx.company_id, payroll_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("payroll", payroll_id))?;

    if !run.status.can_transition_to(next) {
        return Err(PayrollError::InvalidTransition {
            from: run.status.to_string(),
            to: next.to_string(),
        });
    }

    let previous = run.status;
    run.status = next;
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(payroll_id, from = %previous, to = %next, "Payroll status changed");
    Ok(run)
}

pub async fn get_run(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    payroll_id: u64,
) -> Result<RunDetail, PayrollError> {
    ctx.require_payroll_read()?;

    let mut tx = store.begin().await?;
    let run = tx
        .lock_payroll_run(ctx.company_id, payroll_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("payroll", payroll_id))?;

    let mut entries = Vec::new();
    for entry in tx.list_salary_entries(run.id).await? {
        let values = tx.list_field_values(entry.id).await?;
        let net_amount = net_contribution(&values);
        entries.push(EntryDetail {
            entry,
            values,
            net_amount,
        });
    }
    tx.commit().await?;

    Ok(RunDetail { run, entries })
}

pub async fn list_runs(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    site_id: Option<u64>,
) -> Result<Vec<PayrollRun>, PayrollError> {
    ctx.require_payroll_read()?;

    let mut tx = store.begin().await?;
    let runs = tx.list_payroll_runs(ctx.company_id, site_id).await?;
    tx.commit().await?;
    Ok(runs)
}

/// Deletes a run that is not yet approved, with everything it owns.
#[instrument(skip(store), fields(company_id = ctx.company_id))]
pub async fn delete_run(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    payroll_id: u64,
) -> Result<(), PayrollError> {
    ctx.require_admin()?;

    let mut tx = store.begin().await?;
    let run = tx
        .lock_payroll_run(ctx.company_id, payroll_id)
        .await?
        .ok_or_else(|| PayrollError::not_found("payroll", payroll_id))?;
    run.ensure_mutable()?;

    let value_ids: Vec<u64> = tx
        .list_run_field_values(run.id)
        .await?
        .iter()
        .map(|v| v.id)
        .collect();
    tx.release_statutory_applications(&value_ids).await?;
    tx.delete_payroll_run(run.id).await?;
    tx.commit().await?;

    info!(payroll_id, "Payroll run deleted");
    Ok(())
}
