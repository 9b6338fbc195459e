//! Payment template resolution.
//!
//! A template is an ordered list of payment fields. Fixed and overtime
//! fields are leaves; percentage and statutory fields depend on a base,
//! which is either another field of the same template or `gross`. Gross is
//! itself a node depending on every earning that is not derived from gross.
//! The graph is evaluated in topological order, so a percentage field may
//! name a base that appears later in the template; a cycle is reported as a
//! configuration error naming the fields involved.

use std::collections::{HashMap, HashSet, VecDeque};

use rust_decimal::Decimal;
use tracing::debug;

use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::engine::money::round_money;
use crate::model::attendance::AttendanceSummary;
use crate::model::employee::Employee;
use crate::model::payment_field::{CalculationBasis, FieldRef, FieldType, PaymentField};
use crate::model::payroll::PayPeriod;
use crate::model::statutory::{StatutoryKind, StatutoryRule};
use crate::store::StoreTx;

/// A payment field as placed in a template, overrides applied on top.
#[derive(Debug, Clone)]
pub struct TemplateField {
    pub field: PaymentField,
    pub amount_override: Option<Decimal>,
    pub percentage_override: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionInputs {
    pub period: Option<PayPeriod>,
    pub attendance: AttendanceSummary,
    pub rules: HashMap<StatutoryKind, StatutoryRule>,
    /// Yearly rules already charged to this employee in the period's year.
    pub applied_yearly: HashSet<StatutoryKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub field_id: u64,
    pub name: String,
    pub field_type: FieldType,
    pub amount: Decimal,
    pub statutory: Option<StatutoryKind>,
    /// Charged under a yearly-cycle rule; must be recorded in the ledger.
    pub yearly: bool,
    /// Employer share of a statutory field. Not part of net pay.
    pub employer_amount: Decimal,
}

/// Evaluates `fields` into amounts, in template order. Fields whose rule does
/// not apply this period are left out and count as zero for dependents.
pub fn resolve(
    fields: &[TemplateField],
    inputs: &ResolutionInputs,
) -> Result<Vec<ResolvedField>, PayrollError> {
    let n = fields.len();
    let gross = n;

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, tf) in fields.iter().enumerate() {
        if index.insert(tf.field.name.as_str(), i).is_some() {
            return Err(PayrollError::Configuration(format!(
                "field '{}' appears twice in the template",
                tf.field.name
            )));
        }
    }

    let mut base_of: Vec<Option<usize>> = Vec::with_capacity(n);
    for tf in fields {
        let dep = match tf.field.calculation_basis.base() {
            None => None,
            Some(FieldRef::Gross) => Some(gross),
            Some(FieldRef::Field(name)) => Some(*index.get(name.as_str()).ok_or_else(|| {
                PayrollError::Configuration(format!(
                    "field '{}' references unknown base field '{}'",
                    tf.field.name, name
                ))
            })?),
        };
        base_of.push(dep);
    }

    // Monotone fixed point: a field is derived from gross if its base is
    // gross or a field derived from gross.
    let mut from_gross = vec![false; n];
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..n {
            if from_gross[i] {
                continue;
            }
            if let Some(d) = base_of[i] {
                if d == gross || from_gross[d] {
                    from_gross[i] = true;
                    changed = true;
                }
            }
        }
    }
    let feeds_gross =
        |i: usize| fields[i].field.field_type == FieldType::Earning && !from_gross[i];

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
    let mut indegree = vec![0usize; n + 1];
    for i in 0..n {
        if let Some(d) = base_of[i] {
            dependents[d].push(i);
            indegree[i] += 1;
        }
        if feeds_gross(i) {
            dependents[i].push(gross);
            indegree[gross] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..=n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n + 1);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &dependents[node] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() <= n {
        let stuck: Vec<&str> = (0..n)
            .filter(|&i| indegree[i] > 0)
            .map(|i| fields[i].field.name.as_str())
            .collect();
        return Err(PayrollError::Configuration(format!(
            "circular dependency between fields: {}",
            stuck.join(", ")
        )));
    }

    // a yearly kind is charged by the first field that resolves it
    let mut charged_yearly: HashSet<StatutoryKind> = HashSet::new();
    let mut values: Vec<Option<Decimal>> = vec![None; n + 1];
    for node in order {
        values[node] = if node == gross {
            Some(
                (0..n)
                    .filter(|&i| feeds_gross(i))
                    .filter_map(|i| values[i])
                    .sum(),
            )
        } else {
            let base = base_of[node]
                .and_then(|d| values[d])
                .unwrap_or(Decimal::ZERO);
            let value = evaluate(&fields[node], base, inputs)?;
            match yearly_kind(&fields[node], inputs) {
                Some(kind) if value.is_some() && !charged_yearly.insert(kind) => None,
                _ => value,
            }
        };
    }

    Ok(fields
        .iter()
        .enumerate()
        .filter_map(|(i, tf)| {
            let amount = values[i]?;
            let statutory = match tf.field.calculation_basis {
                CalculationBasis::Statutory { statutory, .. } => Some(statutory),
                _ => None,
            };
            let rule = statutory.and_then(|kind| inputs.rules.get(&kind));
            let base = base_of[i].and_then(|d| values[d]).unwrap_or(Decimal::ZERO);
            Some(ResolvedField {
                field_id: tf.field.id,
                name: tf.field.name.clone(),
                field_type: tf.field.field_type,
                amount,
                statutory,
                yearly: rule.is_some_and(StatutoryRule::is_yearly),
                employer_amount: rule
                    .and_then(|rule| rule.employer_amount(base))
                    .unwrap_or(Decimal::ZERO),
            })
        })
        .collect())
}

fn yearly_kind(tf: &TemplateField, inputs: &ResolutionInputs) -> Option<StatutoryKind> {
    match tf.field.calculation_basis {
        CalculationBasis::Statutory { statutory, .. } => inputs
            .rules
            .get(&statutory)
            .filter(|rule| rule.is_yearly())
            .map(|_| statutory),
        _ => None,
    }
}

fn evaluate(
    tf: &TemplateField,
    base: Decimal,
    inputs: &ResolutionInputs,
) -> Result<Option<Decimal>, PayrollError> {
    let field = &tf.field;
    let amount = match &field.calculation_basis {
        CalculationBasis::Fixed { prorate } => {
            let amount = tf
                .amount_override
                .or(field.default_amount)
                .unwrap_or(Decimal::ZERO);
            match (*prorate, inputs.period) {
                (true, Some(period)) => {
                    let days = Decimal::from(period.days_in_month());
                    let present = inputs.attendance.present_days.min(days);
                    round_money(amount * present / days)
                }
                _ => amount,
            }
        }
        CalculationBasis::PerOvertimeHour { rate } => {
            let rate = tf.amount_override.unwrap_or(*rate);
            round_money(rate * inputs.attendance.overtime_hours)
        }
        CalculationBasis::PercentageOf { percentage, .. } => {
            let percentage = tf.percentage_override.unwrap_or(*percentage);
            if percentage.is_sign_negative() {
                return Err(PayrollError::Configuration(format!(
                    "field '{}' has negative percentage {}",
                    field.name, percentage
                )));
            }
            round_money(base * percentage)
        }
        CalculationBasis::Statutory { statutory, .. } => {
            let rule = inputs.rules.get(statutory).ok_or_else(|| {
                PayrollError::Configuration(format!(
                    "field '{}' needs a {} statutory rule, none is configured",
                    field.name, statutory
                ))
            })?;
            let month = inputs.period.map(|p| p.month).unwrap_or(0);
            if !rule.applies_in_month(month) {
                return Ok(None);
            }
            if rule.is_yearly() && inputs.applied_yearly.contains(statutory) {
                return Ok(None);
            }
            match rule.employee_amount(base) {
                Some(amount) => amount,
                None => return Ok(None),
            }
        }
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PayrollError::Configuration(format!(
            "field '{}' resolves to negative amount {}",
            field.name, amount
        )));
    }
    Ok(Some(amount))
}

/// Loads the employee's template (employee assignment first, then site),
/// the referenced fields and statutory rules, and resolves them.
pub async fn resolve_fields_for_employee(
    ctx: &PayrollContext,
    tx: &mut dyn StoreTx,
    employee: &Employee,
    period: PayPeriod,
    attendance: AttendanceSummary,
) -> Result<Vec<ResolvedField>, PayrollError> {
    let template = tx
        .find_template(ctx.company_id, employee.id, employee.site_id)
        .await?
        .ok_or_else(|| {
            PayrollError::Configuration(format!(
                "no payment template assigned to employee {} or site {}",
                employee.id, employee.site_id
            ))
        })?;

    let mut fields = Vec::with_capacity(template.assignments.len());
    for assignment in template.ordered_assignments() {
        let field = tx
            .get_payment_field(ctx.company_id, assignment.field_id)
            .await?
            .ok_or_else(|| {
                PayrollError::Configuration(format!(
                    "template '{}' references missing payment field {}",
                    template.name, assignment.field_id
                ))
            })?;
        fields.push(TemplateField {
            field,
            amount_override: assignment.amount_override,
            percentage_override: assignment.percentage_override,
        });
    }

    let mut inputs = ResolutionInputs {
        period: Some(period),
        attendance,
        ..Default::default()
    };
    for tf in &fields {
        if let CalculationBasis::Statutory { statutory, .. } = tf.field.calculation_basis {
            if inputs.rules.contains_key(&statutory) {
                continue;
            }
            if let Some(rule) = tx.get_statutory_rule(ctx.company_id, statutory).await? {
                if rule.is_yearly()
                    && tx
                        .has_statutory_application(employee.id, statutory, period.year)
                        .await?
                {
                    inputs.applied_yearly.insert(statutory);
                }
                inputs.rules.insert(statutory, rule);
            }
        }
    }

    let resolved = resolve(&fields, &inputs)?;
    debug!(
        employee_id = employee.id,
        template_id = template.id,
        fields = resolved.len(),
        "Resolved payment fields"
    );
    Ok(resolved)
}
