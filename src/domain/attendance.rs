use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};
use crate::types::{EmployeeId, PayPeriod};

/// monthly attendance summary, unique per (employee, month, year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub employee_id: EmployeeId,
    pub period: PayPeriod,
    pub total_working_days: u8,
    pub present_days: u8,
    pub absent_days: u8,
    pub paid_leave_days: u8,
    pub unpaid_leave_days: u8,
    /// derived: present + paid leave
    pub payable_days: u8,
    /// derived: absent + unpaid leave
    pub loss_of_pay_days: u8,
    #[serde(default)]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// build a record, deriving payable and loss-of-pay day counts
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        employee_id: EmployeeId,
        period: PayPeriod,
        total_working_days: u8,
        present_days: u8,
        absent_days: u8,
        paid_leave_days: u8,
        unpaid_leave_days: u8,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        for (field, value) in [
            ("totalWorkingDays", total_working_days),
            ("presentDays", present_days),
            ("absentDays", absent_days),
            ("paidLeaveDays", paid_leave_days),
            ("unpaidLeaveDays", unpaid_leave_days),
        ] {
            if value > 31 {
                return Err(HrError::invalid_input(field, "day counts cannot exceed 31"));
            }
        }

        let accounted = present_days as u16
            + absent_days as u16
            + paid_leave_days as u16
            + unpaid_leave_days as u16;
        if accounted != total_working_days as u16 {
            return Err(HrError::DomainRuleViolation(format!(
                "present + absent + paid leave + unpaid leave ({accounted}) \
                 must equal total working days ({total_working_days})"
            )));
        }

        Ok(AttendanceRecord {
            id: Uuid::new_v4(),
            employee_id,
            period,
            total_working_days,
            present_days,
            absent_days,
            paid_leave_days,
            unpaid_leave_days,
            payable_days: present_days + paid_leave_days,
            loss_of_pay_days: absent_days + unpaid_leave_days,
            remarks,
            created_at: now,
            updated_at: now,
        })
    }

    /// synthetic full-attendance record used when none was filed
    pub fn assumed_full(
        employee_id: EmployeeId,
        period: PayPeriod,
        working_days: u8,
        now: DateTime<Utc>,
    ) -> Self {
        AttendanceRecord {
            id: Uuid::new_v4(),
            employee_id,
            period,
            total_working_days: working_days,
            present_days: working_days,
            absent_days: 0,
            paid_leave_days: 0,
            unpaid_leave_days: 0,
            payable_days: working_days,
            loss_of_pay_days: 0,
            remarks: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// re-check the stored invariants (used before payroll consumes a record)
    pub fn is_consistent(&self) -> bool {
        self.payable_days == self.present_days + self.paid_leave_days
            && self.loss_of_pay_days == self.absent_days + self.unpaid_leave_days
            && self.present_days as u16
                + self.absent_days as u16
                + self.paid_leave_days as u16
                + self.unpaid_leave_days as u16
                == self.total_working_days as u16
            && self.total_working_days <= 31
    }
}
