//! Statutory rule lookups and amount computation.
//!
//! Rules are read-only inputs to a run. Percentages are fractions and are
//! multiplied in directly. A yearly-cycle rule is charged at most once per
//! employee per calendar year; the application ledger in the store records
//! which salary field value carried the charge.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::engine::context::PayrollContext;
use crate::engine::error::PayrollError;
use crate::engine::money::{ensure_non_negative, round_money};
use crate::model::statutory::{
    DeductionCycle, NewStatutoryRule, StatutoryKind, StatutoryRule, ValueKind,
};
use crate::store::{PayrollStore, StoreTx};

impl StatutoryRule {
    /// Employee share for `base`, or `None` when the rule does not apply to
    /// this base (above the ESI ceiling).
    pub fn employee_amount(&self, base: Decimal) -> Option<Decimal> {
        self.share(base, self.employee_contribution)
    }

    pub fn employer_amount(&self, base: Decimal) -> Option<Decimal> {
        self.share(base, self.employer_contribution)
    }

    fn share(&self, base: Decimal, contribution: Decimal) -> Option<Decimal> {
        let mut base = base;
        match (self.kind, self.wage_ceiling) {
            (StatutoryKind::Esi, Some(ceiling)) if base > ceiling => return None,
            (StatutoryKind::Epf, Some(ceiling)) => base = base.min(ceiling),
            _ => {}
        }
        let amount = match self.value_kind {
            ValueKind::Percentage => base * contribution,
            ValueKind::Fixed => contribution,
        };
        Some(round_money(amount))
    }

    /// Whether the rule pays out or deducts in `month` at all.
    pub fn applies_in_month(&self, month: u32) -> bool {
        self.payout_month.is_none_or(|m| m == month)
    }

    pub fn is_yearly(&self) -> bool {
        self.deduction_cycle == DeductionCycle::Yearly
    }
}

pub async fn get_rule(
    ctx: &PayrollContext,
    tx: &mut dyn StoreTx,
    kind: StatutoryKind,
) -> Result<StatutoryRule, PayrollError> {
    tx.get_statutory_rule(ctx.company_id, kind)
        .await?
        .ok_or_else(|| PayrollError::not_found("statutory rule", kind))
}

pub async fn list_rules(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
) -> Result<Vec<StatutoryRule>, PayrollError> {
    ctx.require_payroll_read()?;
    let mut tx = store.begin().await?;
    let rules = tx.list_statutory_rules(ctx.company_id).await?;
    tx.commit().await?;
    Ok(rules)
}

fn validate_rule(rule: &NewStatutoryRule) -> Result<(), PayrollError> {
    ensure_non_negative(rule.employee_contribution, "employee_contribution")?;
    ensure_non_negative(rule.employer_contribution, "employer_contribution")?;
    if let Some(ceiling) = rule.wage_ceiling {
        ensure_non_negative(ceiling, "wage_ceiling")?;
    }
    if rule.value_kind == ValueKind::Percentage
        && (rule.employee_contribution > Decimal::ONE || rule.employer_contribution > Decimal::ONE)
    {
        return Err(PayrollError::Validation(
            "percentage contributions are fractions and must not exceed 1".to_string(),
        ));
    }
    if let Some(month) = rule.payout_month {
        if !(1..=12).contains(&month) {
            return Err(PayrollError::Validation(format!(
                "payout_month must be 1-12, got {}",
                month
            )));
        }
    }
    Ok(())
}

#[instrument(skip(store, rule), fields(company_id = ctx.company_id, kind = %kind))]
pub async fn upsert_rule(
    ctx: &PayrollContext,
    store: &dyn PayrollStore,
    kind: StatutoryKind,
    rule: &NewStatutoryRule,
) -> Result<StatutoryRule, PayrollError> {
    ctx.require_payroll_write()?;
    validate_rule(rule)?;

    let mut tx = store.begin().await?;
    let saved = tx.upsert_statutory_rule(ctx.company_id, kind, rule).await?;
    tx.commit().await?;

    debug!(rule_id = saved.id, "Statutory rule saved");
    Ok(saved)
}
