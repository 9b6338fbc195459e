//! Attendance figures consumed by the run builder.
//!
//! Present days and overtime hours come from the attendance subsystem and
//! are taken as authoritative; the payroll core never recomputes them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use sqlx::MySqlPool;
use tokio::sync::RwLock;

use crate::engine::error::PayrollError;
use crate::engine::money::round_money;
use crate::model::attendance::{Attendance, AttendanceSummary};
use crate::model::payroll::PayPeriod;

#[async_trait]
pub trait AttendanceSource: Send + Sync {
    async fn summary(
        &self,
        company_id: u64,
        employee_id: u64,
        period: PayPeriod,
    ) -> Result<AttendanceSummary, PayrollError>;
}

/// Derives a summary from the daily check-in/check-out table.
pub struct MySqlAttendance {
    pool: MySqlPool,
    /// Worked time beyond this per day counts as overtime.
    shift_hours: Decimal,
}

impl MySqlAttendance {
    pub fn new(pool: MySqlPool, shift_hours: Decimal) -> Self {
        Self { pool, shift_hours }
    }
}

#[async_trait]
impl AttendanceSource for MySqlAttendance {
    async fn summary(
        &self,
        _company_id: u64,
        employee_id: u64,
        period: PayPeriod,
    ) -> Result<AttendanceSummary, PayrollError> {
        let rows = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, employee_id, date, check_in, check_out
            FROM attendance
            WHERE employee_id = ? AND date BETWEEN ? AND ?
            "#,
        )
        .bind(employee_id)
        .bind(period.first_day())
        .bind(period.last_day())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to fetch attendance");
            PayrollError::from(e)
        })?;

        Ok(summarize(&rows, self.shift_hours))
    }
}

/// A day counts as present when checked in. Overtime is time beyond
/// `shift_hours` on days with a check-out.
pub fn summarize(rows: &[Attendance], shift_hours: Decimal) -> AttendanceSummary {
    let mut present_days = Decimal::ZERO;
    let mut overtime_seconds = 0i64;
    let shift_seconds = (shift_hours * Decimal::from(3600))
        .trunc()
        .try_into()
        .unwrap_or(i64::MAX);

    for row in rows {
        let Some(check_in) = row.check_in else {
            continue;
        };
        present_days += Decimal::ONE;
        if let Some(check_out) = row.check_out {
            let worked = seconds_between(check_in, check_out);
            overtime_seconds += (worked - shift_seconds).max(0);
        }
    }

    AttendanceSummary {
        present_days,
        overtime_hours: round_money(Decimal::from(overtime_seconds) / Decimal::from(3600)),
    }
}

fn seconds_between(start: NaiveTime, end: NaiveTime) -> i64 {
    (end - start).num_seconds().max(0)
}

/// Fixed figures keyed by employee, for tests and local runs.
#[derive(Default)]
pub struct StaticAttendance {
    summaries: RwLock<HashMap<u64, AttendanceSummary>>,
    default: AttendanceSummary,
}

impl StaticAttendance {
    pub fn new(default: AttendanceSummary) -> Self {
        Self {
            summaries: RwLock::new(HashMap::new()),
            default,
        }
    }

    pub async fn set(&self, employee_id: u64, summary: AttendanceSummary) {
        self.summaries.write().await.insert(employee_id, summary);
    }
}

#[async_trait]
impl AttendanceSource for StaticAttendance {
    async fn summary(
        &self,
        _company_id: u64,
        employee_id: u64,
        _period: PayPeriod,
    ) -> Result<AttendanceSummary, PayrollError> {
        Ok(self
            .summaries
            .read()
            .await
            .get(&employee_id)
            .copied()
            .unwrap_or(self.default))
    }
}
