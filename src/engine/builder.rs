//! Salary entry builder: materializes a payroll run for a site and month.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::attendance::AttendanceSource;
use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::engine::template::resolve_fields_for_employee;
use crate::model::payroll::{NewPayrollRun, PayPeriod, PayrollRun};
use crate::model::salary_entry::{NewSalaryEntry, NewSalaryFieldValue};
use crate::model::statutory::StatutoryApplication;
use crate::store::PayrollStore;

/// An employee left out of the run, and why.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeFailure {
    pub employee_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BuildOutcome {
    pub run: PayrollRun,
    pub failures: Vec<EmployeeFailure>,
    /// Employer statutory cost for the entries created. Not part of the run total.
    #[schema(example = "1440.00")]
    pub employer_contributions: Decimal,
}

/// Creates the run with one salary entry per payable employee of the site.
///
/// A configuration problem with one employee's template skips that employee
/// only; the run total covers the entries that were created. Storage errors
/// abort the whole build. A second build for the same site and month is
/// rejected.
#[instrument(skip(store, attendance), fields(company_id = ctx.company_id))]
pub async fn build_run(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    attendance: &dyn AttendanceSource,
    site_id: u64,
    month: u32,
    year: i32,
) -> Result<BuildOutcome, PayrollError> {
    ctx.require_payroll_write()?;
    let period = PayPeriod::new(month, year).ok_or_else(|| {
        PayrollError::Validation(format!("invalid pay period {}/{}", month, year))
    })?;

    let mut tx = store.begin().await?;

    if tx
        .find_payroll_run(ctx.company_id, site_id, month, year)
        .await?
        .is_some()
    {
        return Err(PayrollError::DuplicateRun {
            site_id,
            month,
            year,
        });
    }

    let employees = tx
        .list_active_employees(ctx.company_id, site_id, period.last_day())
        .await?;

    let mut run = tx
        .insert_payroll_run(&NewPayrollRun {
            company_id: ctx.company_id,
            site_id,
            month,
            year,
        })
        .await?;

    let mut total = Decimal::ZERO;
    let mut employer_contributions = Decimal::ZERO;
    let mut created = 0u32;
    let mut failures = Vec::new();

    for employee in employees
        .iter()
        .filter(|e| e.is_payable(period.last_day()))
    {
        let summary = match attendance
            .summary(ctx.company_id, employee.id, period)
            .await
        {
            Ok(summary) => summary,
            Err(e) if e.is_employee_scoped() => {
                warn!(employee_id = employee.id, error = %e, "Attendance unavailable, employee skipped");
                failures.push(EmployeeFailure {
                    employee_id: employee.id,
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let resolved =
            match resolve_fields_for_employee(ctx, &mut *tx, employee, period, summary).await {
                Ok(resolved) => resolved,
                Err(e) if e.is_employee_scoped() => {
                    warn!(employee_id = employee.id, error = %e, "Template resolution failed, employee skipped");
                    failures.push(EmployeeFailure {
                        employee_id: employee.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

        let entry = tx
            .insert_salary_entry(&NewSalaryEntry {
                payroll_id: run.id,
                employee_id: employee.id,
                present_days: summary.present_days,
                overtime_hours: summary.overtime_hours,
            })
            .await?;

        for field in &resolved {
            let value = tx
                .insert_field_value(&NewSalaryFieldValue {
                    salary_entry_id: entry.id,
                    payroll_field_id: field.field_id,
                    name: field.name.clone(),
                    amount: field.amount,
                    field_type: field.field_type,
                })
                .await?;
            total += value.contribution();
            employer_contributions += field.employer_amount;

            if let (Some(kind), true) = (field.statutory, field.yearly) {
                tx.record_statutory_application(&StatutoryApplication {
                    employee_id: employee.id,
                    kind,
                    year,
                    salary_field_value_id: value.id,
                })
                .await?;
            }
        }
        created += 1;
    }

    run.total_employees = created;
    run.total_net_amount = total;
    tx.update_payroll_run(&run).await?;
    tx.commit().await?;

    info!(
        payroll_id = run.id,
        site_id,
        month,
        year,
        employees = created,
        skipped = failures.len(),
        total_net_amount = %run.total_net_amount,
        employer_contributions = %employer_contributions,
        "Payroll run built"
    );

    Ok(BuildOutcome {
        run,
        failures,
        employer_contributions,
    })
}
