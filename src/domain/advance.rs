use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};
use crate::money::Money;
use crate::types::{AdvanceStatus, EmployeeId, PayPeriod};

/// salary advance recovered through the pay-run in its deduction period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advance {
    pub id: Uuid,
    pub employee_id: EmployeeId,
    /// period the advance was paid out
    pub advance_period: PayPeriod,
    pub paid_amount: Money,
    /// period recovery is scheduled to begin
    pub deduction_period: PayPeriod,
    pub remaining_amount: Money,
    /// when set, the pay-run may recover less than the full remainder
    #[serde(default)]
    pub partial_allowed: bool,
    pub status: AdvanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Advance {
    pub fn new(
        employee_id: EmployeeId,
        advance_period: PayPeriod,
        paid_amount: Money,
        deduction_period: PayPeriod,
        partial_allowed: bool,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !paid_amount.is_positive() {
            return Err(HrError::invalid_input("paidAmount", "paid amount must be positive"));
        }
        if deduction_period < advance_period {
            return Err(HrError::invalid_input(
                "deductionPeriod",
                "deduction period cannot precede the advance period",
            ));
        }
        Ok(Advance {
            id: Uuid::new_v4(),
            employee_id,
            advance_period,
            paid_amount,
            deduction_period,
            remaining_amount: paid_amount,
            partial_allowed,
            status: AdvanceStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// true when the pay-run for `period` should attempt recovery
    pub fn is_due(&self, period: PayPeriod) -> bool {
        self.status != AdvanceStatus::Deducted && self.deduction_period <= period
    }

    /// record a recovery; terminal once the remainder reaches zero
    pub fn record_deduction(&mut self, amount: Money, now: DateTime<Utc>) -> Result<()> {
        if amount.is_negative() || amount > self.remaining_amount {
            return Err(HrError::DomainRuleViolation(format!(
                "advance deduction {amount} exceeds remaining {}",
                self.remaining_amount
            )));
        }
        self.remaining_amount = self.remaining_amount - amount;
        self.status = if self.remaining_amount.is_zero() {
            AdvanceStatus::Deducted
        } else {
            AdvanceStatus::Partial
        };
        self.updated_at = now;
        Ok(())
    }
}
