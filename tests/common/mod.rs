#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;

use payroll_engine::attendance::StaticAttendance;
use payroll_engine::engine::PayrollContext;
use payroll_engine::model::attendance::AttendanceSummary;
use payroll_engine::model::employee::Employee;
use payroll_engine::model::payment_field::{CalculationBasis, FieldRef, FieldType, PaymentField};
use payroll_engine::model::payment_template::{PaymentTemplate, TemplateAssignment};
use payroll_engine::model::role::Role;
use payroll_engine::model::salary_entry::SalaryFieldValue;
use payroll_engine::model::statutory::{DeductionCycle, StatutoryKind, StatutoryRule, ValueKind};
use payroll_engine::store::memory::{MemoryState, MemoryStore};

pub const COMPANY: u64 = 1;
pub const SITE: u64 = 10;

pub fn hr() -> PayrollContext {
    PayrollContext::new(COMPANY, 501, Role::Hr)
}

pub fn admin() -> PayrollContext {
    PayrollContext::new(COMPANY, 500, Role::Admin)
}

pub fn employee(site_id: u64, code: &str) -> Employee {
    Employee {
        id: 0,
        company_id: COMPANY,
        site_id,
        employee_code: code.to_string(),
        hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        status: "active".to_string(),
    }
}

pub fn fixed(name: &str, field_type: FieldType, amount: Decimal) -> PaymentField {
    PaymentField {
        id: 0,
        company_id: COMPANY,
        name: name.to_string(),
        field_type,
        default_amount: Some(amount),
        calculation_basis: CalculationBasis::Fixed { prorate: false },
    }
}

pub fn derived(name: &str, field_type: FieldType, basis: CalculationBasis) -> PaymentField {
    PaymentField {
        id: 0,
        company_id: COMPANY,
        name: name.to_string(),
        field_type,
        default_amount: None,
        calculation_basis: basis,
    }
}

pub fn statutory_field(name: &str, field_type: FieldType, kind: StatutoryKind, base: FieldRef) -> PaymentField {
    derived(name, field_type, CalculationBasis::Statutory { statutory: kind, base })
}

pub fn assign(field_ids: &[u64]) -> Vec<TemplateAssignment> {
    field_ids
        .iter()
        .enumerate()
        .map(|(position, &field_id)| TemplateAssignment {
            field_id,
            position: position as u32,
            amount_override: None,
            percentage_override: None,
        })
        .collect()
}

pub fn site_template(site_id: u64, assignments: Vec<TemplateAssignment>) -> PaymentTemplate {
    PaymentTemplate {
        id: 0,
        company_id: COMPANY,
        name: format!("site-{}", site_id),
        site_id: Some(site_id),
        employee_id: None,
        assignments,
    }
}

pub fn employee_template(employee_id: u64, assignments: Vec<TemplateAssignment>) -> PaymentTemplate {
    PaymentTemplate {
        id: 0,
        company_id: COMPANY,
        name: format!("employee-{}", employee_id),
        site_id: None,
        employee_id: Some(employee_id),
        assignments,
    }
}

pub fn rule(
    kind: StatutoryKind,
    value_kind: ValueKind,
    employee_contribution: Decimal,
    cycle: DeductionCycle,
) -> StatutoryRule {
    StatutoryRule {
        id: 0,
        company_id: COMPANY,
        kind,
        value_kind,
        employee_contribution,
        employer_contribution: Decimal::ZERO,
        deduction_cycle: cycle,
        payout_month: None,
        wage_ceiling: None,
    }
}

/// Ids created by [`seed_basic_site`].
pub struct Seeded {
    pub employees: Vec<u64>,
    pub basic: u64,
    pub pf: u64,
    pub template: u64,
}

/// `count` employees on `SITE` sharing a template of `basic=1000` earning
/// and `pf=120` deduction.
pub fn seed_basic_site(state: &mut MemoryState, count: usize) -> Seeded {
    let basic = state.insert_field(fixed("basic", FieldType::Earning, Decimal::from(1000)));
    let pf = state.insert_field(fixed("pf", FieldType::Deduction, Decimal::from(120)));
    let template = state.insert_template(site_template(SITE, assign(&[basic, pf])));
    let employees = (0..count)
        .map(|i| state.insert_employee(employee(SITE, &format!("EMP-{:03}", i + 1))))
        .collect();
    Seeded {
        employees,
        basic,
        pf,
        template,
    }
}

pub fn attendance() -> StaticAttendance {
    StaticAttendance::new(AttendanceSummary::default())
}

/// Signed sum of every live value in the run.
pub async fn live_total(store: &MemoryStore, payroll_id: u64) -> Decimal {
    store
        .with_state(|s| {
            s.entries(payroll_id)
                .iter()
                .flat_map(|e| s.values(e.id))
                .map(SalaryFieldValue::contribution)
                .sum()
        })
        .await
}

pub async fn stored_total(store: &MemoryStore, payroll_id: u64) -> Decimal {
    store
        .with_state(|s| s.run(payroll_id).map(|r| r.total_net_amount).unwrap_or_default())
        .await
}

/// Id of the value named `name` on `employee_id`'s entry in the run.
pub async fn value_id(store: &MemoryStore, payroll_id: u64, employee_id: u64, name: &str) -> Option<u64> {
    store
        .with_state(|s| {
            let entry = s
                .entries(payroll_id)
                .into_iter()
                .find(|e| e.employee_id == employee_id)?;
            s.values(entry.id)
                .into_iter()
                .find(|v| v.name == name)
                .map(|v| v.id)
        })
        .await
}

pub async fn entry_id(store: &MemoryStore, payroll_id: u64, employee_id: u64) -> Option<u64> {
    store
        .with_state(|s| {
            s.entries(payroll_id)
                .into_iter()
                .find(|e| e.employee_id == employee_id)
                .map(|e| e.id)
        })
        .await
}
