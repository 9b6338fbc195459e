pub mod attendance;
pub mod employee;
pub mod exit;
pub mod payment_field;
pub mod payment_template;
pub mod payroll;
pub mod role;
pub mod salary_entry;
pub mod statutory;
