//! MySQL store.
//!
//! One `sqlx::Transaction` per core operation. The payroll row is taken with
//! `SELECT ... FOR UPDATE`; connections run at READ COMMITTED (set in
//! `db::init_db`) so reads issued after that lock see the latest committed
//! field values rather than the transaction's first snapshot.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::error;

use crate::engine::error::PayrollError;
use crate::model::employee::Employee;
use crate::model::exit::{ExitRecord, NewExit};
use crate::model::payment_field::{CalculationBasis, FieldType, PaymentField};
use crate::model::payment_template::{PaymentTemplate, TemplateAssignment};
use crate::model::payroll::{NewPayrollRun, PayrollRun, PayrollStatus};
use crate::model::salary_entry::{NewSalaryEntry, NewSalaryFieldValue, SalaryEntry, SalaryFieldValue};
use crate::model::statutory::{NewStatutoryRule, StatutoryApplication, StatutoryKind, StatutoryRule};
use crate::store::{PayrollStore, StoreResult, StoreTx};

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            PayrollError::from(e)
        })?;
        Ok(Box::new(MySqlTx { tx }))
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, PayrollError> {
    value
        .parse()
        .map_err(|_| PayrollError::Database(format!("unexpected {} value '{}'", column, value)))
}

#[derive(sqlx::FromRow)]
struct FieldRow {
    id: u64,
    company_id: u64,
    name: String,
    field_type: String,
    default_amount: Option<Decimal>,
    calculation_basis: String,
}

impl TryFrom<FieldRow> for PaymentField {
    type Error = PayrollError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        let calculation_basis: CalculationBasis = serde_json::from_str(&row.calculation_basis)
            .map_err(|e| {
                PayrollError::Configuration(format!(
                    "payment field '{}' has an unreadable calculation basis: {}",
                    row.name, e
                ))
            })?;
        Ok(PaymentField {
            id: row.id,
            company_id: row.company_id,
            field_type: parse_column("field_type", &row.field_type)?,
            name: row.name,
            default_amount: row.default_amount,
            calculation_basis,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: u64,
    company_id: u64,
    name: String,
    site_id: Option<u64>,
    employee_id: Option<u64>,
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    field_id: u64,
    position: u32,
    amount_override: Option<Decimal>,
    percentage_override: Option<Decimal>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: u64,
    company_id: u64,
    kind: String,
    value_kind: String,
    employee_contribution: Decimal,
    employer_contribution: Decimal,
    deduction_cycle: String,
    payout_month: Option<u32>,
    wage_ceiling: Option<Decimal>,
}

impl TryFrom<RuleRow> for StatutoryRule {
    type Error = PayrollError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        Ok(StatutoryRule {
            id: row.id,
            company_id: row.company_id,
            kind: parse_column("kind", &row.kind)?,
            value_kind: parse_column("value_kind", &row.value_kind)?,
            employee_contribution: row.employee_contribution,
            employer_contribution: row.employer_contribution,
            deduction_cycle: parse_column("deduction_cycle", &row.deduction_cycle)?,
            payout_month: row.payout_month,
            wage_ceiling: row.wage_ceiling,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PayrollRow {
    id: u64,
    company_id: u64,
    site_id: u64,
    month: u32,
    year: i32,
    status: String,
    total_employees: u32,
    total_net_amount: Decimal,
}

impl TryFrom<PayrollRow> for PayrollRun {
    type Error = PayrollError;

    fn try_from(row: PayrollRow) -> Result<Self, Self::Error> {
        Ok(PayrollRun {
            id: row.id,
            company_id: row.company_id,
            site_id: row.site_id,
            month: row.month,
            year: row.year,
            status: parse_column::<PayrollStatus>("status", &row.status)?,
            total_employees: row.total_employees,
            total_net_amount: row.total_net_amount,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ValueRow {
    id: u64,
    salary_entry_id: u64,
    payroll_field_id: u64,
    name: String,
    amount: Decimal,
    field_type: String,
}

impl TryFrom<ValueRow> for SalaryFieldValue {
    type Error = PayrollError;

    fn try_from(row: ValueRow) -> Result<Self, Self::Error> {
        Ok(SalaryFieldValue {
            id: row.id,
            salary_entry_id: row.salary_entry_id,
            payroll_field_id: row.payroll_field_id,
            field_type: parse_column::<FieldType>("field_type", &row.field_type)?,
            name: row.name,
            amount: row.amount,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = PayrollError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const PAYROLL_COLUMNS: &str =
    "id, company_id, site_id, month, year, status, total_employees, total_net_amount";
const RULE_COLUMNS: &str = "id, company_id, kind, value_kind, employee_contribution, \
     employer_contribution, deduction_cycle, payout_month, wage_ceiling";
const VALUE_COLUMNS: &str = "id, salary_entry_id, payroll_field_id, name, amount, field_type";
const EXIT_COLUMNS: &str = "id, company_id, employee_id, exit_date, reason, bonus, \
     leave_encashment, gratuity, deduction, net_pay";

#[async_trait]
impl StoreTx for MySqlTx {
    async fn list_active_employees(
        &mut self,
        company_id: u64,
        site_id: u64,
        period_end: NaiveDate,
    ) -> StoreResult<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, company_id, site_id, employee_code, hire_date, status
            FROM employees
            WHERE company_id = ? AND site_id = ? AND status = 'active' AND hire_date <= ?
            ORDER BY id
            "#,
        )
        .bind(company_id)
        .bind(site_id)
        .bind(period_end)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(employees)
    }

    async fn get_payment_field(&mut self, company_id: u64, field_id: u64) -> StoreResult<Option<PaymentField>> {
        let row = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT id, company_id, name, field_type, default_amount, calculation_basis
            FROM payment_fields
            WHERE company_id = ? AND id = ?
            "#,
        )
        .bind(company_id)
        .bind(field_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(PaymentField::try_from).transpose()
    }

    async fn find_template(
        &mut self,
        company_id: u64,
        employee_id: u64,
        site_id: u64,
    ) -> StoreResult<Option<PaymentTemplate>> {
        // employee assignment sorts first
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, company_id, name, site_id, employee_id
            FROM payment_templates
            WHERE company_id = ?
              AND (employee_id = ? OR (employee_id IS NULL AND site_id = ?))
            ORDER BY employee_id IS NULL, id
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .bind(employee_id)
        .bind(site_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let assignments = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT field_id, position, amount_override, percentage_override
            FROM payment_template_fields
            WHERE template_id = ?
            ORDER BY position, id
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(PaymentTemplate {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            site_id: row.site_id,
            employee_id: row.employee_id,
            assignments: assignments
                .into_iter()
                .map(|a| TemplateAssignment {
                    field_id: a.field_id,
                    position: a.position,
                    amount_override: a.amount_override,
                    percentage_override: a.percentage_override,
                })
                .collect(),
        }))
    }

    async fn get_statutory_rule(&mut self, company_id: u64, kind: StatutoryKind) -> StoreResult<Option<StatutoryRule>> {
        let sql = format!(
            "SELECT {} FROM statutory_rules WHERE company_id = ? AND kind = ?",
            RULE_COLUMNS
        );
        let row = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(company_id)
            .bind(kind.as_ref())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(StatutoryRule::try_from).transpose()
    }

    async fn list_statutory_rules(&mut self, company_id: u64) -> StoreResult<Vec<StatutoryRule>> {
        let sql = format!(
            "SELECT {} FROM statutory_rules WHERE company_id = ? ORDER BY kind",
            RULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(company_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert_all(rows)
    }

    async fn upsert_statutory_rule(
        &mut self,
        company_id: u64,
        kind: StatutoryKind,
        rule: &NewStatutoryRule,
    ) -> StoreResult<StatutoryRule> {
        sqlx::query(
            r#"
            INSERT INTO statutory_rules
            (company_id, kind, value_kind, employee_contribution, employer_contribution,
             deduction_cycle, payout_month, wage_ceiling)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                value_kind = VALUES(value_kind),
                employee_contribution = VALUES(employee_contribution),
                employer_contribution = VALUES(employer_contribution),
                deduction_cycle = VALUES(deduction_cycle),
                payout_month = VALUES(payout_month),
                wage_ceiling = VALUES(wage_ceiling)
            "#,
        )
        .bind(company_id)
        .bind(kind.as_ref())
        .bind(rule.value_kind.as_ref())
        .bind(rule.employee_contribution)
        .bind(rule.employer_contribution)
        .bind(rule.deduction_cycle.as_ref())
        .bind(rule.payout_month)
        .bind(rule.wage_ceiling)
        .execute(&mut *self.tx)
        .await?;

        self.get_statutory_rule(company_id, kind)
            .await?
            .ok_or_else(|| PayrollError::not_found("statutory rule", kind))
    }

    async fn has_statutory_application(&mut self, employee_id: u64, kind: StatutoryKind, year: i32) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM statutory_applications
                WHERE employee_id = ? AND kind = ? AND year = ?
            )
            "#,
        )
        .bind(employee_id)
        .bind(kind.as_ref())
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn record_statutory_application(&mut self, application: &StatutoryApplication) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO statutory_applications (employee_id, kind, year, salary_field_value_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(application.employee_id)
        .bind(application.kind.as_ref())
        .bind(application.year)
        .bind(application.salary_field_value_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23000") => {
                PayrollError::Validation(format!(
                    "{} already charged to employee {} in {}",
                    application.kind, application.employee_id, application.year
                ))
            }
            other => PayrollError::from(other),
        })?;
        Ok(())
    }

    async fn release_statutory_applications(&mut self, value_ids: &[u64]) -> StoreResult<()> {
        for value_id in value_ids {
            sqlx::query("DELETE FROM statutory_applications WHERE salary_field_value_id = ?")
                .bind(value_id)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn find_payroll_run(
        &mut self,
        company_id: u64,
        site_id: u64,
        month: u32,
        year: i32,
    ) -> StoreResult<Option<PayrollRun>> {
        let sql = format!(
            "SELECT {} FROM payroll WHERE company_id = ? AND site_id = ? AND month = ? AND year = ?",
            PAYROLL_COLUMNS
        );
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(company_id)
            .bind(site_id)
            .bind(month)
            .bind(year)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(PayrollRun::try_from).transpose()
    }

    async fn lock_payroll_run(&mut self, company_id: u64, payroll_id: u64) -> StoreResult<Option<PayrollRun>> {
        let sql = format!(
            "SELECT {} FROM payroll WHERE company_id = ? AND id = ? FOR UPDATE",
            PAYROLL_COLUMNS
        );
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(company_id)
            .bind(payroll_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(PayrollRun::try_from).transpose()
    }

    async fn list_payroll_runs(&mut self, company_id: u64, site_id: Option<u64>) -> StoreResult<Vec<PayrollRun>> {
        let sql = format!(
            "SELECT {} FROM payroll WHERE company_id = ? AND (? IS NULL OR site_id = ?) \
             ORDER BY year DESC, month DESC, id DESC",
            PAYROLL_COLUMNS
        );
        let rows = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(company_id)
            .bind(site_id)
            .bind(site_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert_all(rows)
    }

    async fn insert_payroll_run(&mut self, run: &NewPayrollRun) -> StoreResult<PayrollRun> {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll (company_id, site_id, month, year, status, total_employees, total_net_amount)
            VALUES (?, ?, ?, ?, ?, 0, 0)
            "#,
        )
        .bind(run.company_id)
        .bind(run.site_id)
        .bind(run.month)
        .bind(run.year)
        .bind(PayrollStatus::Draft.as_ref())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23000") => {
                PayrollError::DuplicateRun {
                    site_id: run.site_id,
                    month: run.month,
                    year: run.year,
                }
            }
            other => PayrollError::from(other),
        })?;

        Ok(PayrollRun {
            id: result.last_insert_id(),
            company_id: run.company_id,
            site_id: run.site_id,
            month: run.month,
            year: run.year,
            status: PayrollStatus::Draft,
            total_employees: 0,
            total_net_amount: Decimal::ZERO,
        })
    }

    async fn update_payroll_run(&mut self, run: &PayrollRun) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE payroll
            SET status = ?, total_employees = ?, total_net_amount = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.as_ref())
        .bind(run.total_employees)
        .bind(run.total_net_amount)
        .bind(run.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_payroll_run(&mut self, payroll_id: u64) -> StoreResult<()> {
        // entries and values cascade
        sqlx::query("DELETE FROM payroll WHERE id = ?")
            .bind(payroll_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_salary_entry(&mut self, entry: &NewSalaryEntry) -> StoreResult<SalaryEntry> {
        let result = sqlx::query(
            r#"
            INSERT INTO salary_entries (payroll_id, employee_id, present_days, overtime_hours)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.payroll_id)
        .bind(entry.employee_id)
        .bind(entry.present_days)
        .bind(entry.overtime_hours)
        .execute(&mut *self.tx)
        .await?;

        Ok(SalaryEntry {
            id: result.last_insert_id(),
            payroll_id: entry.payroll_id,
            employee_id: entry.employee_id,
            present_days: entry.present_days,
            overtime_hours: entry.overtime_hours,
        })
    }

    async fn get_salary_entry(&mut self, entry_id: u64) -> StoreResult<Option<SalaryEntry>> {
        let entry = sqlx::query_as::<_, SalaryEntry>(
            r#"
            SELECT id, payroll_id, employee_id, present_days, overtime_hours
            FROM salary_entries
            WHERE id = ?
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn list_salary_entries(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryEntry>> {
        let entries = sqlx::query_as::<_, SalaryEntry>(
            r#"
            SELECT id, payroll_id, employee_id, present_days, overtime_hours
            FROM salary_entries
            WHERE payroll_id = ?
            ORDER BY id
            "#,
        )
        .bind(payroll_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn delete_salary_entry(&mut self, entry_id: u64) -> StoreResult<()> {
        sqlx::query("DELETE FROM salary_entries WHERE id = ?")
            .bind(entry_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_field_value(&mut self, value: &NewSalaryFieldValue) -> StoreResult<SalaryFieldValue> {
        let result = sqlx::query(
            r#"
            INSERT INTO salary_field_values (salary_entry_id, payroll_field_id, name, amount, field_type)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(value.salary_entry_id)
        .bind(value.payroll_field_id)
        .bind(&value.name)
        .bind(value.amount)
        .bind(value.field_type.as_ref())
        .execute(&mut *self.tx)
        .await?;

        Ok(SalaryFieldValue {
            id: result.last_insert_id(),
            salary_entry_id: value.salary_entry_id,
            payroll_field_id: value.payroll_field_id,
            name: value.name.clone(),
            amount: value.amount,
            field_type: value.field_type,
        })
    }

    async fn get_field_value(&mut self, value_id: u64) -> StoreResult<Option<SalaryFieldValue>> {
        let sql = format!("SELECT {} FROM salary_field_values WHERE id = ?", VALUE_COLUMNS);
        let row = sqlx::query_as::<_, ValueRow>(&sql)
            .bind(value_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(SalaryFieldValue::try_from).transpose()
    }

    async fn update_field_value_amount(&mut self, value_id: u64, amount: Decimal) -> StoreResult<()> {
        let result = sqlx::query("UPDATE salary_field_values SET amount = ? WHERE id = ?")
            .bind(amount)
            .bind(value_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PayrollError::not_found("salary field value", value_id));
        }
        Ok(())
    }

    async fn delete_field_value(&mut self, value_id: u64) -> StoreResult<()> {
        sqlx::query("DELETE FROM salary_field_values WHERE id = ?")
            .bind(value_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_field_values(&mut self, entry_id: u64) -> StoreResult<Vec<SalaryFieldValue>> {
        let sql = format!(
            "SELECT {} FROM salary_field_values WHERE salary_entry_id = ? ORDER BY id",
            VALUE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ValueRow>(&sql)
            .bind(entry_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert_all(rows)
    }

    async fn list_run_field_values(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryFieldValue>> {
        let rows = sqlx::query_as::<_, ValueRow>(
            r#"
            SELECT v.id, v.salary_entry_id, v.payroll_field_id, v.name, v.amount, v.field_type
            FROM salary_field_values v
            JOIN salary_entries e ON e.id = v.salary_entry_id
            WHERE e.payroll_id = ?
            ORDER BY v.id
            "#,
        )
        .bind(payroll_id)
        .fetch_all(&mut *self.tx)
        .await?;
        convert_all(rows)
    }

    async fn insert_exit(&mut self, company_id: u64, exit: &NewExit, net_pay: Decimal) -> StoreResult<ExitRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO exits
            (company_id, employee_id, exit_date, reason, bonus, leave_encashment, gratuity, deduction, net_pay)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(company_id)
        .bind(exit.employee_id)
        .bind(exit.exit_date)
        .bind(&exit.reason)
        .bind(exit.bonus)
        .bind(exit.leave_encashment)
        .bind(exit.gratuity)
        .bind(exit.deduction)
        .bind(net_pay)
        .execute(&mut *self.tx)
        .await?;

        Ok(ExitRecord {
            id: result.last_insert_id(),
            company_id,
            employee_id: exit.employee_id,
            exit_date: exit.exit_date,
            reason: exit.reason.clone(),
            bonus: exit.bonus,
            leave_encashment: exit.leave_encashment,
            gratuity: exit.gratuity,
            deduction: exit.deduction,
            net_pay,
        })
    }

    async fn get_exit(&mut self, company_id: u64, exit_id: u64) -> StoreResult<Option<ExitRecord>> {
        let sql = format!(
            "SELECT {} FROM exits WHERE company_id = ? AND id = ?",
            EXIT_COLUMNS
        );
        let record = sqlx::query_as::<_, ExitRecord>(&sql)
            .bind(company_id)
            .bind(exit_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn update_exit(&mut self, exit: &ExitRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE exits
            SET exit_date = ?, reason = ?, bonus = ?, leave_encashment = ?,
                gratuity = ?, deduction = ?, net_pay = ?
            WHERE id = ? AND company_id = ?
            "#,
        )
        .bind(exit.exit_date)
        .bind(&exit.reason)
        .bind(exit.bonus)
        .bind(exit.leave_encashment)
        .bind(exit.gratuity)
        .bind(exit.deduction)
        .bind(exit.net_pay)
        .bind(exit.id)
        .bind(exit.company_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit transaction");
            PayrollError::from(e)
        })
    }
}
