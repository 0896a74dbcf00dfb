use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};
use crate::loans::build_schedule;
use crate::money::{Money, Rate};
use crate::types::{EmployeeId, LoanStatus, PayPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledEmiStatus {
    Pending,
    Paid,
}

/// one installment of a loan schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEmi {
    pub period: PayPeriod,
    pub amount: Money,
    pub status: ScheduledEmiStatus,
}

/// installment loan advanced by one EMI per pay-run from its start period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub employee_id: EmployeeId,
    pub principal: Money,
    pub annual_interest_rate: Rate,
    pub emi_count: u32,
    pub emi_amount: Money,
    pub total_amount: Money,
    pub start_period: PayPeriod,
    pub paid_emi_count: u32,
    pub remaining_balance: Money,
    pub status: LoanStatus,
    pub schedule: Vec<ScheduledEmi>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn originate(
        employee_id: EmployeeId,
        principal: Money,
        annual_interest_rate: Rate,
        emi_count: u32,
        start_period: PayPeriod,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let plan = build_schedule(principal, annual_interest_rate, emi_count, start_period)?;
        let schedule = plan
            .entries
            .iter()
            .map(|(period, amount)| ScheduledEmi {
                period: *period,
                amount: *amount,
                status: ScheduledEmiStatus::Pending,
            })
            .collect();

        Ok(Loan {
            id: Uuid::new_v4(),
            employee_id,
            principal,
            annual_interest_rate,
            emi_count,
            emi_amount: plan.emi_amount,
            total_amount: plan.total_amount,
            start_period,
            paid_emi_count: 0,
            remaining_balance: plan.total_amount,
            status: LoanStatus::Active,
            schedule,
            created_at: now,
            updated_at: now,
        })
    }

    /// true when the pay-run for `period` must deduct an EMI
    pub fn emi_due(&self, period: PayPeriod) -> bool {
        self.status == LoanStatus::Active
            && self.start_period <= period
            && self.paid_emi_count < self.emi_count
    }

    /// amount of the next unpaid installment
    pub fn next_emi_amount(&self) -> Result<Money> {
        self.schedule
            .get(self.paid_emi_count as usize)
            .map(|e| e.amount)
            .ok_or_else(|| {
                HrError::DomainRuleViolation(format!(
                    "loan {} has {} paid EMIs but only {} scheduled",
                    self.id,
                    self.paid_emi_count,
                    self.schedule.len()
                ))
            })
    }

    /// mark the next installment paid; transitions to COMPLETED on the last
    pub fn record_emi_payment(&mut self, now: DateTime<Utc>) -> Result<Money> {
        if self.status != LoanStatus::Active {
            return Err(HrError::illegal_transition(format!("{:?}", self.status), "EMI payment"));
        }
        let index = self.paid_emi_count as usize;
        let amount = self.next_emi_amount()?;
        self.schedule[index].status = ScheduledEmiStatus::Paid;
        self.paid_emi_count += 1;
        self.remaining_balance = self
            .schedule
            .iter()
            .filter(|e| e.status == ScheduledEmiStatus::Pending)
            .map(|e| e.amount)
            .sum();
        if self.paid_emi_count == self.emi_count {
            self.status = LoanStatus::Completed;
        }
        self.updated_at = now;
        Ok(amount)
    }

    /// freeze the unpaid tail; the loan is excluded from future pay-runs
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != LoanStatus::Active {
            return Err(HrError::illegal_transition(format!("{:?}", self.status), "CANCELLED"));
        }
        self.status = LoanStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// schedule-shape invariants, checked before payroll consumes a loan
    pub fn is_consistent(&self) -> bool {
        let scheduled_total: Money = self.schedule.iter().map(|e| e.amount).sum();
        self.schedule.len() == self.emi_count as usize
            && self.paid_emi_count <= self.emi_count
            && scheduled_total == self.total_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Month;

    fn start() -> PayPeriod {
        PayPeriod::new(Month::April, 2025).unwrap()
    }

    fn loan() -> Loan {
        Loan::originate(
            EmployeeId::generate(),
            Money::from_major(60_000),
            Rate::ZERO,
            12,
            start(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_origination() {
        let loan = loan();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.emi_amount, Money::from_major(5_000));
        assert_eq!(loan.total_amount, Money::from_major(60_000));
        assert_eq!(loan.remaining_balance, Money::from_major(60_000));
        assert!(loan.is_consistent());
    }

    #[test]
    fn test_due_window() {
        let loan = loan();
        assert!(!loan.emi_due(PayPeriod::new(Month::March, 2025).unwrap()));
        assert!(loan.emi_due(start()));
        assert!(loan.emi_due(PayPeriod::new(Month::August, 2025).unwrap()));
    }

    #[test]
    fn test_full_repayment_completes_loan() {
        let mut loan = loan();
        for _ in 0..12 {
            let paid = loan.record_emi_payment(Utc::now()).unwrap();
            assert_eq!(paid, Money::from_major(5_000));
        }
        assert_eq!(loan.status, LoanStatus::Completed);
        assert_eq!(loan.paid_emi_count, 12);
        assert!(loan.remaining_balance.is_zero());
        assert!(!loan.emi_due(PayPeriod::new(Month::May, 2026).unwrap()));

        // terminal: no further payments
        assert!(loan.record_emi_payment(Utc::now()).is_err());
    }

    #[test]
    fn test_cancellation_freezes_remaining() {
        let mut loan = loan();
        loan.record_emi_payment(Utc::now()).unwrap();
        loan.record_emi_payment(Utc::now()).unwrap();

        loan.cancel(Utc::now()).unwrap();
        assert_eq!(loan.status, LoanStatus::Cancelled);
        assert_eq!(loan.remaining_balance, Money::from_major(50_000));
        assert_eq!(loan.paid_emi_count, 2);
        assert!(!loan.emi_due(PayPeriod::new(Month::June, 2025).unwrap()));

        assert!(loan.cancel(Utc::now()).is_err());
        assert!(loan.record_emi_payment(Utc::now()).is_err());
    }

    #[test]
    fn test_scheduled_sum_matches_total_with_interest() {
        let loan = Loan::originate(
            EmployeeId::generate(),
            Money::from_major(100_000),
            Rate::from_percentage_u32(12),
            12,
            start(),
            Utc::now(),
        )
        .unwrap();
        assert!(loan.is_consistent());
        let sum: Money = loan.schedule.iter().map(|e| e.amount).sum();
        assert_eq!(sum, loan.total_amount);
    }
}
