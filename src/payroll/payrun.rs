use std::sync::Arc;

use dashmap::DashMap;
use hourglass_rs::SafeTimeProvider;

use crate::advances;
use crate::config::StatutoryProfile;
use crate::domain::{Advance, AttendanceRecord, Employee, Loan, PayRun, PayRunLine};
use crate::errors::{HrError, Result};
use crate::money::Money;
use crate::payroll::calculator::{esi_for_gross, pf_for_basic};
use crate::store::{period_key, HrStore};
use crate::types::PayPeriod;

/// monthly pay-run generator
///
/// generation is serialized by a create-if-absent guard on the period: an
/// in-process reservation catches concurrent attempts early and the store's
/// period index is the durable uniqueness guard. every line and every loan
/// and advance mutation is computed before anything is persisted, so a
/// failing employee aborts the run with nothing written.
pub struct PayRunGenerator {
    store: Arc<dyn HrStore>,
    profile: StatutoryProfile,
    clock: Arc<SafeTimeProvider>,
    in_flight: Arc<DashMap<String, ()>>,
}

struct PeriodReservation {
    in_flight: Arc<DashMap<String, ()>>,
    key: String,
}

impl PeriodReservation {
    fn acquire(in_flight: &Arc<DashMap<String, ()>>, period: PayPeriod) -> Result<Self> {
        let key = period_key(period);
        match in_flight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(HrError::Conflict(format!(
                "pay run generation already in progress for {period}"
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Ok(PeriodReservation { in_flight: in_flight.clone(), key })
            }
        }
    }
}

impl Drop for PeriodReservation {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// one employee's computed result plus the mutations it implies
struct ComputedLine {
    line: PayRunLine,
    loans: Vec<Loan>,
    advances: Vec<Advance>,
}

impl PayRunGenerator {
    pub fn new(
        store: Arc<dyn HrStore>,
        profile: StatutoryProfile,
        clock: Arc<SafeTimeProvider>,
    ) -> Self {
        PayRunGenerator { store, profile, clock, in_flight: Arc::new(DashMap::new()) }
    }

    /// generate the pay-run for a period; exactly one run may exist per
    /// period, a second attempt fails with Conflict
    pub fn generate(&self, period: PayPeriod, generated_by: &str) -> Result<PayRun> {
        let _reservation = PeriodReservation::acquire(&self.in_flight, period)?;

        if self.store.payrun_for_period(period)?.is_some() {
            return Err(HrError::Conflict(format!("pay run already generated for {period}")));
        }

        let now = self.clock.now();
        let mut lines = Vec::new();
        let mut loan_updates = Vec::new();
        let mut advance_updates = Vec::new();

        for employee in self.store.employees()?.into_iter().filter(Employee::is_active) {
            let computed = self.line_for(&employee, period).map_err(|e| {
                HrError::PayRunGenerationFailed {
                    employee_id: employee.id.to_string(),
                    reason: e.client_message(),
                }
            })?;
            lines.push(computed.line);
            loan_updates.extend(computed.loans);
            advance_updates.extend(computed.advances);
        }

        let payrun = PayRun::new(period, generated_by.to_string(), lines, now);
        self.store.insert_payrun(&payrun)?;

        for loan in &loan_updates {
            self.store.update_loan(loan)?;
        }
        for advance in &advance_updates {
            self.store.update_advance(advance)?;
        }

        Ok(payrun)
    }

    fn line_for(&self, employee: &Employee, period: PayPeriod) -> Result<ComputedLine> {
        let now = self.clock.now();
        let attendance = match self.store.attendance_for(&employee.id, period)? {
            Some(record) => {
                if !record.is_consistent() {
                    return Err(HrError::DomainRuleViolation(format!(
                        "attendance record for {period} fails its day-sum invariants"
                    )));
                }
                record
            }
            // no record filed: assume full attendance
            None => AttendanceRecord::assumed_full(
                employee.id.clone(),
                period,
                self.profile.default_working_days,
                now,
            ),
        };

        let comp = &employee.compensation;
        let total_days = attendance.total_working_days as u32;
        let payable_days = attendance.payable_days as u32;
        let lop_days = attendance.loss_of_pay_days as u32;

        let loss_of_pay_amount = comp.gross.prorate(lop_days, total_days);
        let gross = comp.gross - loss_of_pay_amount;

        // allowance components pro-rate proportionally; the special
        // allowance absorbs the rounding residue
        let basic = comp.basic.prorate(payable_days, total_days);
        let hra = comp.hra.prorate(payable_days, total_days);
        let conveyance = comp.conveyance.prorate(payable_days, total_days);
        let telephone = comp.telephone.prorate(payable_days, total_days);
        let medical_allowance = comp.medical_allowance.prorate(payable_days, total_days);
        let special_allowance =
            (gross - (basic + hra + conveyance + telephone + medical_allowance)).max(Money::ZERO);

        // statutory deductions recomputed against prorated basic and gross
        let pf_deduction =
            pf_for_basic(basic, employee.compensation_input.include_pf, &self.profile);
        let esi_deduction =
            esi_for_gross(gross, employee.compensation_input.include_esi, &self.profile);
        let professional_tax = self.profile.professional_tax_for(gross);
        let tds_monthly = comp.tds_monthly;

        // loan EMIs apply before advances
        let mut loans = Vec::new();
        let mut loan_emi = Money::ZERO;
        for loan in self.store.loans_for_employee(&employee.id)? {
            if !loan.emi_due(period) {
                continue;
            }
            if !loan.is_consistent() {
                return Err(HrError::DomainRuleViolation(format!(
                    "loan {} has a corrupt schedule",
                    loan.id
                )));
            }
            let mut updated = loan;
            loan_emi += updated.record_emi_payment(now)?;
            loans.push(updated);
        }

        let statutory = pf_deduction + esi_deduction + professional_tax + tds_monthly;
        let mut available = gross - statutory - loan_emi;

        let mut advance_records = Vec::new();
        let mut advance_deduction = Money::ZERO;
        for advance in self.store.advances_for_employee(&employee.id)? {
            if !advance.is_due(period) {
                continue;
            }
            let amount = advances::deduction_for(&advance, available);
            if amount.is_zero() {
                continue;
            }
            let mut updated = advance;
            updated.record_deduction(amount, now)?;
            advance_deduction += amount;
            available = available - amount;
            advance_records.push(updated);
        }

        let total_deductions = statutory + loan_emi + advance_deduction;
        let net = gross - total_deductions;

        Ok(ComputedLine {
            line: PayRunLine {
                employee_id: employee.id.clone(),
                employee_name: employee.personal.full_name(),
                total_working_days: attendance.total_working_days,
                payable_days: attendance.payable_days,
                loss_of_pay_days: attendance.loss_of_pay_days,
                basic,
                hra,
                conveyance,
                telephone,
                medical_allowance,
                special_allowance,
                gross,
                pf_deduction,
                esi_deduction,
                professional_tax,
                tds_monthly,
                loan_emi,
                advance_deduction,
                loss_of_pay_amount,
                total_deductions,
                net,
            },
            loans,
            advances: advance_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::employee::tests_support::{sample_compensation_input, sample_employee};
    use crate::domain::Employee;
    use crate::money::Rate;
    use crate::store::MemoryStore;
    use crate::types::{AdvanceStatus, LoanStatus, Month};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn generator() -> (Arc<MemoryStore>, PayRunGenerator) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 4, 30, 18, 0, 0).unwrap(),
        )));
        let generator = PayRunGenerator::new(
            store.clone() as Arc<dyn HrStore>,
            StatutoryProfile::default(),
            clock,
        );
        (store, generator)
    }

    fn period(month: Month) -> PayPeriod {
        PayPeriod::new(month, 2025).unwrap()
    }

    #[test]
    fn test_full_attendance_line_matches_calculator() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-1@acme.test");
        store.insert_employee(&employee).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        assert_eq!(run.lines.len(), 1);
        let line = &run.lines[0];

        // 26/26 payable days reproduces the pure calculator output
        assert_eq!(line.gross, employee.compensation.gross);
        assert_eq!(line.basic, employee.compensation.basic);
        assert_eq!(line.pf_deduction, employee.compensation.pf_deduction);
        assert_eq!(line.net, employee.compensation.net);
        assert!(run.totals_consistent());
    }

    #[test]
    fn test_reference_employee_net() {
        // CTC 12L, HRA 10%, PF, TDS 60k: monthly net 91 200 at 26/26 days
        let (store, generator) = generator();
        let mut input = sample_compensation_input(1_200_000);
        input.tds_annual = Money::from_major(60_000);
        let monthly =
            crate::payroll::decompose(&input, &StatutoryProfile::default()).unwrap();
        let sample = sample_employee("payrun-ref@acme.test");
        let employee = Employee {
            compensation_input: input,
            compensation: monthly,
            ..sample
        };
        store.insert_employee(&employee).unwrap();

        let attendance = AttendanceRecord::compute(
            employee.id.clone(),
            period(Month::April),
            26,
            26,
            0,
            0,
            0,
            None,
            Utc::now(),
        )
        .unwrap();
        store.upsert_attendance(&attendance).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        assert_eq!(run.lines[0].net, Money::from_major(91_200));
        assert_eq!(run.lines[0].tds_monthly, Money::from_major(5_000));
    }

    #[test]
    fn test_loss_of_pay_proration() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-lop@acme.test");
        store.insert_employee(&employee).unwrap();

        // 13 of 26 days payable
        let attendance = AttendanceRecord::compute(
            employee.id.clone(),
            period(Month::April),
            26,
            13,
            13,
            0,
            0,
            None,
            Utc::now(),
        )
        .unwrap();
        store.upsert_attendance(&attendance).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        let line = &run.lines[0];
        assert_eq!(line.gross, employee.compensation.gross.prorate(13, 26));
        assert_eq!(line.loss_of_pay_amount, employee.compensation.gross.prorate(13, 26));
        assert_eq!(line.basic, employee.compensation.basic.prorate(13, 26));
        // PF recomputed on the prorated basic (25 000 > cap, so still 1 800)
        assert_eq!(line.pf_deduction, Money::from_major(1_800));
        assert_eq!(
            line.net,
            line.gross
                - (line.pf_deduction + line.esi_deduction + line.professional_tax
                    + line.tds_monthly)
        );
    }

    #[test]
    fn test_missing_attendance_assumes_full_month() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-noatt@acme.test");
        store.insert_employee(&employee).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        let line = &run.lines[0];
        assert_eq!(line.total_working_days, 26);
        assert_eq!(line.payable_days, 26);
        assert_eq!(line.loss_of_pay_days, 0);
        assert_eq!(line.net, employee.compensation.net);
    }

    #[test]
    fn test_second_generation_conflicts_and_preserves_run() {
        let (store, generator) = generator();
        store.insert_employee(&sample_employee("payrun-dup@acme.test")).unwrap();

        let first = generator.generate(period(Month::April), "hr.lead").unwrap();
        let err = generator.generate(period(Month::April), "hr.lead").unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(store.payrun_for_period(period(Month::April)).unwrap().unwrap().id, first.id);
    }

    #[test]
    fn test_inactive_employees_excluded() {
        let (store, generator) = generator();
        let mut employee = sample_employee("payrun-gone@acme.test");
        employee.deactivate(Utc::now());
        store.insert_employee(&employee).unwrap();
        store.insert_employee(&sample_employee("payrun-here@acme.test")).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        assert_eq!(run.lines.len(), 1);
    }

    #[test]
    fn test_twelve_runs_complete_a_loan() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-loan@acme.test");
        store.insert_employee(&employee).unwrap();

        let loan = Loan::originate(
            employee.id.clone(),
            Money::from_major(60_000),
            Rate::ZERO,
            12,
            period(Month::April),
            Utc::now(),
        )
        .unwrap();
        store.insert_loan(&loan).unwrap();

        let mut current = period(Month::April);
        for _ in 0..12 {
            let run = generator.generate(current, "hr.lead").unwrap();
            assert_eq!(run.lines[0].loan_emi, Money::from_major(5_000));
            current = current.next();
        }

        let finished = store.loan(&loan.id).unwrap().unwrap();
        assert_eq!(finished.status, LoanStatus::Completed);
        assert_eq!(finished.paid_emi_count, 12);
        assert!(finished.remaining_balance.is_zero());

        // a thirteenth run deducts nothing
        let run = generator.generate(current, "hr.lead").unwrap();
        assert!(run.lines[0].loan_emi.is_zero());
    }

    #[test]
    fn test_cancelled_loan_excluded_from_runs() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-cancelled@acme.test");
        store.insert_employee(&employee).unwrap();

        let mut loan = Loan::originate(
            employee.id.clone(),
            Money::from_major(60_000),
            Rate::ZERO,
            12,
            period(Month::April),
            Utc::now(),
        )
        .unwrap();
        loan.cancel(Utc::now()).unwrap();
        store.insert_loan(&loan).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        assert!(run.lines[0].loan_emi.is_zero());
        assert_eq!(store.loan(&loan.id).unwrap().unwrap().remaining_balance, loan.remaining_balance);
    }

    #[test]
    fn test_advance_recovered_in_deduction_period() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-adv@acme.test");
        store.insert_employee(&employee).unwrap();

        let advance = Advance::new(
            employee.id.clone(),
            period(Month::March),
            Money::from_major(12_000),
            period(Month::May),
            false,
            Utc::now(),
        )
        .unwrap();
        store.insert_advance(&advance).unwrap();

        // April: not due yet
        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        assert!(run.lines[0].advance_deduction.is_zero());

        // May: recovered in full
        let run = generator.generate(period(Month::May), "hr.lead").unwrap();
        assert_eq!(run.lines[0].advance_deduction, Money::from_major(12_000));
        let stored = store.advance(&advance.id).unwrap().unwrap();
        assert_eq!(stored.status, AdvanceStatus::Deducted);
        assert!(stored.remaining_amount.is_zero());
    }

    #[test]
    fn test_partial_advance_carries_leftover() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-partial@acme.test");
        store.insert_employee(&employee).unwrap();

        // remaining exceeds one month's pay after statutory deductions
        let advance = Advance::new(
            employee.id.clone(),
            period(Month::March),
            Money::from_major(150_000),
            period(Month::April),
            true,
            Utc::now(),
        )
        .unwrap();
        store.insert_advance(&advance).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        let first_cut = run.lines[0].advance_deduction;
        // capped at gross minus statutory deductions, net lands at zero
        assert_eq!(first_cut, employee.compensation.net);
        assert!(run.lines[0].net.is_zero());

        let stored = store.advance(&advance.id).unwrap().unwrap();
        assert_eq!(stored.status, AdvanceStatus::Partial);
        assert_eq!(stored.remaining_amount, Money::from_major(150_000) - first_cut);

        // the leftover comes out of the next run
        let run = generator.generate(period(Month::May), "hr.lead").unwrap();
        assert_eq!(run.lines[0].advance_deduction, stored.remaining_amount);
        assert_eq!(
            store.advance(&advance.id).unwrap().unwrap().status,
            AdvanceStatus::Deducted
        );
    }

    #[test]
    fn test_emis_apply_before_advances() {
        let (store, generator) = generator();
        let employee = sample_employee("payrun-order@acme.test");
        store.insert_employee(&employee).unwrap();

        let loan = Loan::originate(
            employee.id.clone(),
            Money::from_major(60_000),
            Rate::ZERO,
            12,
            period(Month::April),
            Utc::now(),
        )
        .unwrap();
        store.insert_loan(&loan).unwrap();

        let advance = Advance::new(
            employee.id.clone(),
            period(Month::March),
            Money::from_major(200_000),
            period(Month::April),
            true,
            Utc::now(),
        )
        .unwrap();
        store.insert_advance(&advance).unwrap();

        let run = generator.generate(period(Month::April), "hr.lead").unwrap();
        let line = &run.lines[0];
        // the EMI always lands; the partial advance only gets what is left
        assert_eq!(line.loan_emi, Money::from_major(5_000));
        assert_eq!(
            line.advance_deduction,
            line.gross - line.statutory_deductions() - line.loan_emi
        );
        assert!(line.net.is_zero());
    }

    #[test]
    fn test_corrupt_loan_aborts_run_without_partial_state() {
        let (store, generator) = generator();
        let good = sample_employee("payrun-good@acme.test");
        store.insert_employee(&good).unwrap();
        let bad = sample_employee("payrun-bad@acme.test");
        store.insert_employee(&bad).unwrap();

        let mut loan = Loan::originate(
            bad.id.clone(),
            Money::from_major(60_000),
            Rate::ZERO,
            12,
            period(Month::April),
            Utc::now(),
        )
        .unwrap();
        // corrupt the schedule: drop an installment
        loan.schedule.pop();
        store.insert_loan(&loan).unwrap();

        let err = generator.generate(period(Month::April), "hr.lead").unwrap_err();
        match &err {
            HrError::PayRunGenerationFailed { employee_id, .. } => {
                assert_eq!(employee_id, bad.id.as_str());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // nothing persisted
        assert!(store.payrun_for_period(period(Month::April)).unwrap().is_none());
        assert_eq!(store.loan(&loan.id).unwrap().unwrap().paid_emi_count, 0);
    }
}
