use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One field slot in a template, with per-assignment overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateAssignment {
    pub field_id: u64,
    pub position: u32,
    pub amount_override: Option<Decimal>,
    pub percentage_override: Option<Decimal>,
}

/// Named ordered set of payment fields, assigned to a site or an employee.
/// An employee assignment takes precedence over the site one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTemplate {
    pub id: u64,
    pub company_id: u64,
    pub name: String,
    pub site_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub assignments: Vec<TemplateAssignment>,
}

impl PaymentTemplate {
    /// Assignments in presentation order.
    pub fn ordered_assignments(&self) -> Vec<&TemplateAssignment> {
        let mut assignments: Vec<&TemplateAssignment> = self.assignments.iter().collect();
        // stable: equal positions keep insertion order
        assignments.sort_by_key(|a| a.position);
        assignments
    }
}
