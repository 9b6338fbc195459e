//! In-process store.
//!
//! A transaction holds the store-wide lock for its whole lifetime and works
//! on a copy of the state; `commit` swaps the copy in. Transactions are
//! therefore fully serialized, and a dropped transaction changes nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::engine::error::PayrollError;
use crate::model::employee::Employee;
use crate::model::exit::{ExitRecord, NewExit};
use crate::model::payment_field::PaymentField;
use crate::model::payment_template::PaymentTemplate;
use crate::model::payroll::{NewPayrollRun, PayrollRun, PayrollStatus};
use crate::model::salary_entry::{NewSalaryEntry, NewSalaryFieldValue, SalaryEntry, SalaryFieldValue};
use crate::model::statutory::{NewStatutoryRule, StatutoryApplication, StatutoryKind, StatutoryRule};
use crate::store::{PayrollStore, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: u64,
    employees: BTreeMap<u64, Employee>,
    fields: BTreeMap<u64, PaymentField>,
    templates: BTreeMap<u64, PaymentTemplate>,
    rules: BTreeMap<u64, StatutoryRule>,
    applications: Vec<StatutoryApplication>,
    runs: BTreeMap<u64, PayrollRun>,
    entries: BTreeMap<u64, SalaryEntry>,
    values: BTreeMap<u64, SalaryFieldValue>,
    exits: BTreeMap<u64, ExitRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Stores `employee` under a fresh id and returns it.
    pub fn insert_employee(&mut self, mut employee: Employee) -> u64 {
        employee.id = self.next_id();
        let id = employee.id;
        self.employees.insert(id, employee);
        id
    }

    pub fn insert_field(&mut self, mut field: PaymentField) -> u64 {
        field.id = self.next_id();
        let id = field.id;
        self.fields.insert(id, field);
        id
    }

    pub fn insert_template(&mut self, mut template: PaymentTemplate) -> u64 {
        template.id = self.next_id();
        let id = template.id;
        self.templates.insert(id, template);
        id
    }

    pub fn template_mut(&mut self, template_id: u64) -> Option<&mut PaymentTemplate> {
        self.templates.get_mut(&template_id)
    }

    pub fn insert_rule(&mut self, mut rule: StatutoryRule) -> u64 {
        rule.id = self.next_id();
        let id = rule.id;
        self.rules.insert(id, rule);
        id
    }

    pub fn run(&self, payroll_id: u64) -> Option<&PayrollRun> {
        self.runs.get(&payroll_id)
    }

    pub fn run_mut(&mut self, payroll_id: u64) -> Option<&mut PayrollRun> {
        self.runs.get_mut(&payroll_id)
    }

    pub fn entries(&self, payroll_id: u64) -> Vec<&SalaryEntry> {
        self.entries
            .values()
            .filter(|e| e.payroll_id == payroll_id)
            .collect()
    }

    pub fn values(&self, entry_id: u64) -> Vec<&SalaryFieldValue> {
        self.values
            .values()
            .filter(|v| v.salary_entry_id == entry_id)
            .collect()
    }

    pub fn applications(&self) -> &[StatutoryApplication] {
        &self.applications
    }

    fn remove_entry(&mut self, entry_id: u64) {
        self.values.retain(|_, v| v.salary_entry_id != entry_id);
        self.entries.remove(&entry_id);
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the committed state, outside any transaction.
    pub async fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn list_active_employees(
        &mut self,
        company_id: u64,
        site_id: u64,
        period_end: NaiveDate,
    ) -> StoreResult<Vec<Employee>> {
        Ok(self
            .work
            .employees
            .values()
            .filter(|e| e.company_id == company_id && e.site_id == site_id)
            .filter(|e| e.is_payable(period_end))
            .cloned()
            .collect())
    }

    async fn get_payment_field(&mut self, company_id: u64, field_id: u64) -> StoreResult<Option<PaymentField>> {
        Ok(self
            .work
            .fields
            .get(&field_id)
            .filter(|f| f.company_id == company_id)
            .cloned())
    }

    async fn find_template(
        &mut self,
        company_id: u64,
        employee_id: u64,
        site_id: u64,
    ) -> StoreResult<Option<PaymentTemplate>> {
        let templates = || {
            self.work
                .templates
                .values()
                .filter(move |t| t.company_id == company_id)
        };
        let by_employee = templates().find(|t| t.employee_id == Some(employee_id));
        let by_site = || templates().find(|t| t.employee_id.is_none() && t.site_id == Some(site_id));
        Ok(by_employee.or_else(by_site).cloned())
    }

    async fn get_statutory_rule(&mut self, company_id: u64, kind: StatutoryKind) -> StoreResult<Option<StatutoryRule>> {
        Ok(self
            .work
            .rules
            .values()
            .find(|r| r.company_id == company_id && r.kind == kind)
            .cloned())
    }

    async fn list_statutory_rules(&mut self, company_id: u64) -> StoreResult<Vec<StatutoryRule>> {
        Ok(self
            .work
            .rules
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn upsert_statutory_rule(
        &mut self,
        company_id: u64,
        kind: StatutoryKind,
        rule: &NewStatutoryRule,
    ) -> StoreResult<StatutoryRule> {
        let existing = self
            .work
            .rules
            .values()
            .find(|r| r.company_id == company_id && r.kind == kind)
            .map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => self.work.next_id(),
        };
        let saved = StatutoryRule {
            id,
            company_id,
            kind,
            value_kind: rule.value_kind,
            employee_contribution: rule.employee_contribution,
            employer_contribution: rule.employer_contribution,
            deduction_cycle: rule.deduction_cycle,
            payout_month: rule.payout_month,
            wage_ceiling: rule.wage_ceiling,
        };
        self.work.rules.insert(id, saved.clone());
        Ok(saved)
    }

    async fn has_statutory_application(&mut self, employee_id: u64, kind: StatutoryKind, year: i32) -> StoreResult<bool> {
        Ok(self
            .work
            .applications
            .iter()
            .any(|a| a.employee_id == employee_id && a.kind == kind && a.year == year))
    }

    async fn record_statutory_application(&mut self, application: &StatutoryApplication) -> StoreResult<()> {
        let duplicate = self.work.applications.iter().any(|a| {
            a.employee_id == application.employee_id
                && a.kind == application.kind
                && a.year == application.year
        });
        if duplicate {
            return Err(PayrollError::Validation(format!(
                "{} already charged to employee {} in {}",
                application.kind, application.employee_id, application.year
            )));
        }
        self.work.applications.push(application.clone());
        Ok(())
    }

    async fn release_statutory_applications(&mut self, value_ids: &[u64]) -> StoreResult<()> {
        self.work
            .applications
            .retain(|a| !value_ids.contains(&a.salary_field_value_id));
        Ok(())
    }

    async fn find_payroll_run(
        &mut self,
        company_id: u64,
        site_id: u64,
        month: u32,
        year: i32,
    ) -> StoreResult<Option<PayrollRun>> {
        Ok(self
            .work
            .runs
            .values()
            .find(|r| {
                r.company_id == company_id && r.site_id == site_id && r.month == month && r.year == year
            })
            .cloned())
    }

    async fn lock_payroll_run(&mut self, company_id: u64, payroll_id: u64) -> StoreResult<Option<PayrollRun>> {
        Ok(self
            .work
            .runs
            .get(&payroll_id)
            .filter(|r| r.company_id == company_id)
            .cloned())
    }

    async fn list_payroll_runs(&mut self, company_id: u64, site_id: Option<u64>) -> StoreResult<Vec<PayrollRun>> {
        let mut runs: Vec<PayrollRun> = self
            .work
            .runs
            .values()
            .filter(|r| r.company_id == company_id)
            .filter(|r| site_id.is_none_or(|s| r.site_id == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| (b.year, b.month, b.id).cmp(&(a.year, a.month, a.id)));
        Ok(runs)
    }

    async fn insert_payroll_run(&mut self, run: &NewPayrollRun) -> StoreResult<PayrollRun> {
        let saved = PayrollRun {
            id: self.work.next_id(),
            company_id: run.company_id,
            site_id: run.site_id,
            month: run.month,
            year: run.year,
            status: PayrollStatus::Draft,
            total_employees: 0,
            total_net_amount: Decimal::ZERO,
        };
        self.work.runs.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_payroll_run(&mut self, run: &PayrollRun) -> StoreResult<()> {
        match self.work.runs.get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(PayrollError::not_found("payroll", run.id)),
        }
    }

    async fn delete_payroll_run(&mut self, payroll_id: u64) -> StoreResult<()> {
        let entry_ids: Vec<u64> = self
            .work
            .entries
            .values()
            .filter(|e| e.payroll_id == payroll_id)
            .map(|e| e.id)
            .collect();
        for entry_id in entry_ids {
            self.work.remove_entry(entry_id);
        }
        self.work.runs.remove(&payroll_id);
        Ok(())
    }

    async fn insert_salary_entry(&mut self, entry: &NewSalaryEntry) -> StoreResult<SalaryEntry> {
        let exists = self
            .work
            .entries
            .values()
            .any(|e| e.payroll_id == entry.payroll_id && e.employee_id == entry.employee_id);
        if exists {
            return Err(PayrollError::Validation(format!(
                "employee {} already has an entry in payroll {}",
                entry.employee_id, entry.payroll_id
            )));
        }
        let saved = SalaryEntry {
            id: self.work.next_id(),
            payroll_id: entry.payroll_id,
            employee_id: entry.employee_id,
            present_days: entry.present_days,
            overtime_hours: entry.overtime_hours,
        };
        self.work.entries.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_salary_entry(&mut self, entry_id: u64) -> StoreResult<Option<SalaryEntry>> {
        Ok(self.work.entries.get(&entry_id).cloned())
    }

    async fn list_salary_entries(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryEntry>> {
        Ok(self.work.entries(payroll_id).into_iter().cloned().collect())
    }

    async fn delete_salary_entry(&mut self, entry_id: u64) -> StoreResult<()> {
        self.work.remove_entry(entry_id);
        Ok(())
    }

    async fn insert_field_value(&mut self, value: &NewSalaryFieldValue) -> StoreResult<SalaryFieldValue> {
        let saved = SalaryFieldValue {
            id: self.work.next_id(),
            salary_entry_id: value.salary_entry_id,
            payroll_field_id: value.payroll_field_id,
            name: value.name.clone(),
            amount: value.amount,
            field_type: value.field_type,
        };
        self.work.values.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_field_value(&mut self, value_id: u64) -> StoreResult<Option<SalaryFieldValue>> {
        Ok(self.work.values.get(&value_id).cloned())
    }

    async fn update_field_value_amount(&mut self, value_id: u64, amount: Decimal) -> StoreResult<()> {
        match self.work.values.get_mut(&value_id) {
            Some(value) => {
                value.amount = amount;
                Ok(())
            }
            None => Err(PayrollError::not_found("salary field value", value_id)),
        }
    }

    async fn delete_field_value(&mut self, value_id: u64) -> StoreResult<()> {
        self.work.values.remove(&value_id);
        Ok(())
    }

    async fn list_field_values(&mut self, entry_id: u64) -> StoreResult<Vec<SalaryFieldValue>> {
        Ok(self.work.values(entry_id).into_iter().cloned().collect())
    }

    async fn list_run_field_values(&mut self, payroll_id: u64) -> StoreResult<Vec<SalaryFieldValue>> {
        let entry_ids: Vec<u64> = self.work.entries(payroll_id).iter().map(|e| e.id).collect();
        Ok(self
            .work
            .values
            .values()
            .filter(|v| entry_ids.contains(&v.salary_entry_id))
            .cloned()
            .collect())
    }

    async fn insert_exit(&mut self, company_id: u64, exit: &NewExit, net_pay: Decimal) -> StoreResult<ExitRecord> {
        let saved = ExitRecord {
            id: self.work.next_id(),
            company_id,
            employee_id: exit.employee_id,
            exit_date: exit.exit_date,
            reason: exit.reason.clone(),
            bonus: exit.bonus,
            leave_encashment: exit.leave_encashment,
            gratuity: exit.gratuity,
            deduction: exit.deduction,
            net_pay,
        };
        self.work.exits.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_exit(&mut self, company_id: u64, exit_id: u64) -> StoreResult<Option<ExitRecord>> {
        Ok(self
            .work
            .exits
            .get(&exit_id)
            .filter(|e| e.company_id == company_id)
            .cloned())
    }

    async fn update_exit(&mut self, exit: &ExitRecord) -> StoreResult<()> {
        match self.work.exits.get_mut(&exit.id) {
            Some(stored) => {
                *stored = exit.clone();
                Ok(())
            }
            None => Err(PayrollError::not_found("exit", exit.id)),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
