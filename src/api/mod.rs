use std::sync::Arc;

use crate::attendance::AttendanceSource;
use crate::store::PayrollStore;

pub mod exit;
pub mod field_value;
pub mod payroll;
pub mod salary_entry;
pub mod statutory;

/// Shared handler state: the payroll store and the attendance feed.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PayrollStore>,
    pub attendance: Arc<dyn AttendanceSource>,
}

impl AppState {
    pub fn new(store: Arc<dyn PayrollStore>, attendance: Arc<dyn AttendanceSource>) -> Self {
        Self { store, attendance }
    }
}
