use crate::engine::error::PayrollError;
use crate::model::role::Role;

/// Tenant and caller identity for one core call.
///
/// Route handlers build this from the authenticated user; tests build it
/// directly. Nothing in the engine resolves the company or site ambiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollContext {
    pub company_id: u64,
    pub actor_id: u64,
    pub role: Role,
}

impl PayrollContext {
    pub fn new(company_id: u64, actor_id: u64, role: Role) -> Self {
        Self {
            company_id,
            actor_id,
            role,
        }
    }

    /// Create / update / delete on payroll entities.
    pub fn require_payroll_write(&self) -> Result<(), PayrollError> {
        if matches!(self.role, Role::Admin | Role::Hr | Role::System) {
            Ok(())
        } else {
            Err(PayrollError::Permission(format!(
                "role {:?} may not modify payroll data",
                self.role
            )))
        }
    }

    pub fn require_payroll_read(&self) -> Result<(), PayrollError> {
        if self.role == Role::Employee {
            Err(PayrollError::Permission(
                "employees may not read payroll runs".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn require_admin(&self) -> Result<(), PayrollError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(PayrollError::Permission("Admin only".to_string()))
        }
    }
}
