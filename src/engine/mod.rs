//! Payroll aggregation and statutory-deduction core.
//!
//! Every public operation takes an explicit [`context::PayrollContext`] and a
//! [`crate::store::PayrollStore`], runs inside a single store transaction and
//! returns a `Result<_, PayrollError>`.

pub mod builder;
pub mod context;
pub mod error;
pub mod exit;
pub mod lifecycle;
pub mod money;
pub mod statutory;
pub mod template;
pub mod totals;

pub use builder::{build_run, BuildOutcome, EmployeeFailure};
pub use context::PayrollContext;
pub use error::PayrollError;
pub use exit::{compute_net_pay, create_exit, get_exit, preview_settlement, update_exit};
pub use lifecycle::{delete_run, get_run, list_runs, transition_status};
pub use totals::{
    add_field_to_run, apply_field_value_edit, delete_salary_entry, reconcile_run,
    remove_field_value,
};
