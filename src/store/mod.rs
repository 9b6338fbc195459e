//! Persistence port for the payroll core.
//!
//! Every core operation opens exactly one [`StoreTx`], does all of its reads
//! and writes through it and commits once. A transaction that is dropped
//! without `commit` leaves the store untouched, so a failed edit never
//! applies half a delta.
//!
//! `lock_payroll_run` must serialize concurrent transactions on the same run
//! (row lock in MySQL, store lock in memory); the run total is the only
//! contended value and every mutation locks the run before reading the
//! values it is about to change.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::engine::error::PayrollError;
use crate::model::employee::Employee;
use crate::model::exit::{ExitRecord, NewExit};
use crate::model::payment_field::PaymentField;
use crate::model::payment_template::PaymentTemplate;
use crate::model::payroll::{NewPayrollRun, PayrollRun};
use crate::model::salary_entry::{NewSalaryEntry, NewSalaryFieldValue, SalaryEntry, SalaryFieldValue};
use crate::model::statutory::{NewStatutoryRule, StatutoryApplication, StatutoryKind, StatutoryRule};

pub type StoreResult<T> = Result<T, PayrollError>;

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    // Employees
    async fn list_active_employees(
        &mut self,
        company_id: u64,
        site_id: u64,
        period_end: NaiveDate,
    ) -> StoreResult<Vec<Employee>>;

    // Fields and templates
    async fn get_payment_field(&mut self, company_id: u64, field_id: u64) -> StoreResult<Option<PaymentField>>;
    async fn find_template(
        &mut self,
        company_id: u64,
        employee_id: u64,
        site_id: u64,
    ) -> StoreResult<Option<PaymentTemplate>>;

    // Statutory rules and the yearly application ledger
    async fn get_statutory_rule(&mut self, company_id: u64, kind: StatutoryKind) -> StoreResult<Option<StatutoryRule>>;
    async fn list_statutory_rules(&mut self, company_id: u64) -> StoreResult<Vec<StatutoryRule>>;
    async fn upsert_statutory_rule(
        &mut self,
        company_id: u64,
        kind: StatutoryKind,
        rule: &NewStatutoryRule,
    ) -> StoreResult<StatutoryRule>;
    async fn has_statutory_application(&mut self, employee_id: u64, kind: StatutoryKind, year: i32) -> StoreResult<bool>;
    async fn record_statutory_application(&mut self, application: &StatutoryApplication) -> StoreResult<()>;
    async fn release_statutory_applications(&mut self, value_ids: &[u64]) -> StoreResult<()>;

    // Payroll runs
    async fn find_payroll_run(
        &mut self,
        company_id: u64,
        site_id: u64,
        month: u32,
        year: i32,
    ) -> StoreResult<Option<PayrollRun>>;
    /// Reads the run and holds it against concurrent mutation until commit.
    async fn lock_payroll_run(&mut self, company_id: u64, payroll_id: u64) -> StoreResult<Option<PayrollRun>>;
    async fn list_payroll_runs(&mut self, company_id: u64, site_id: Option<u64>) -> StoreResult<Vec<PayrollRun>>;
    async fn insert_payroll_run(&mut self, run: &NewPayrollRun) -> StoreResult<PayrollRun>;
    async fn update_payroll_run(&mut self, run: &PayrollRun) -> StoreResult<()>;
    /// Removes the run with its entries and values.
    async fn delete_payroll_run(&mut self, payroll_id: u64) -> StoreResult<()>;

    // Salary entries
    async fn insert_salary_entry(&mut self, entry: &NewSalaryEntry) -> StoreResult<SalaryEntry>;
    async fn get_salary_entry(&mut self, entry_id: u64) -> StoreResult<Option<SalaryEntry>>;
    async fn list_salary_entries(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryEntry>>;
    /// Removes the entry with its values.
    async fn delete_salary_entry(&mut self, entry_id: u64) -> StoreResult<()>;

    // Salary field values
    async fn insert_field_value(&mut self, value: &NewSalaryFieldValue) -> StoreResult<SalaryFieldValue>;
    async fn get_field_value(&mut self, value_id: u64) -> StoreResult<Option<SalaryFieldValue>>;
    async fn update_field_value_amount(&mut self, value_id: u64, amount: Decimal) -> StoreResult<()>;
    async fn delete_field_value(&mut self, value_id: u64) -> StoreResult<()>;
    async fn list_field_values(&mut self, entry_id: u64) -> StoreResult<Vec<SalaryFieldValue>>;
    async fn list_run_field_values(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryFieldValue>>;

    // Exits
    async fn insert_exit(&mut self, company_id: u64, exit: &NewExit, net_pay: Decimal) -> StoreResult<ExitRecord>;
    async fn get_exit(&mut self, company_id: u64, exit_id: u64) -> StoreResult<Option<ExitRecord>>;
    async fn update_exit(&mut self, exit: &ExitRecord) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
