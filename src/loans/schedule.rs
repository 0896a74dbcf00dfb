use rust_decimal::Decimal;

use crate::errors::{HrError, Result};
use crate::money::{Money, Rate};
use crate::types::PayPeriod;

/// deterministic repayment plan for an installment loan
#[derive(Debug, Clone, PartialEq)]
pub struct EmiSchedule {
    pub emi_amount: Money,
    pub total_amount: Money,
    /// one (period, amount) per installment, consecutive calendar months
    pub entries: Vec<(PayPeriod, Money)>,
}

/// build the EMI schedule for a loan starting at `start`
///
/// zero interest divides the principal into equal installments rounded up,
/// with the final installment adjusted so the sum equals the principal
/// exactly; positive interest uses the standard annuity formula
/// EMI = P * r * (1+r)^n / ((1+r)^n - 1) at monthly rate r
pub fn build_schedule(
    principal: Money,
    annual_rate: Rate,
    emi_count: u32,
    start: PayPeriod,
) -> Result<EmiSchedule> {
    if emi_count == 0 {
        return Err(HrError::invalid_input("emiCount", "emi count must be positive"));
    }
    if !principal.is_positive() {
        return Err(HrError::invalid_input("principal", "principal must be positive"));
    }
    if annual_rate.as_decimal().is_sign_negative() {
        return Err(HrError::invalid_input("annualInterestRate", "interest rate must not be negative"));
    }

    let (emi_amount, total_amount) = if annual_rate.is_zero() {
        let emi = Money::from_decimal_ceil(principal.as_decimal() / Decimal::from(emi_count));
        (emi, principal)
    } else {
        let r = annual_rate.monthly_fraction();
        let mut factor = Decimal::ONE;
        let base = Decimal::ONE + r;
        for _ in 0..emi_count {
            factor *= base;
        }
        let emi = Money::from_decimal(
            principal.as_decimal() * r * factor / (factor - Decimal::ONE),
        );
        (emi, emi * Decimal::from(emi_count))
    };

    let mut entries = Vec::with_capacity(emi_count as usize);
    let mut period = start;
    let mut remaining = total_amount;
    for i in 0..emi_count {
        let amount = if i == emi_count - 1 {
            // final installment absorbs the rounding residue
            remaining
        } else {
            emi_amount.min(remaining)
        };
        entries.push((period, amount));
        remaining = remaining - amount;
        period = period.next();
    }

    Ok(EmiSchedule { emi_amount, total_amount, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Month;

    fn start() -> PayPeriod {
        PayPeriod::new(Month::April, 2025).unwrap()
    }

    #[test]
    fn test_zero_rate_even_split() {
        let schedule =
            build_schedule(Money::from_major(60_000), Rate::ZERO, 12, start()).unwrap();

        assert_eq!(schedule.entries.len(), 12);
        assert_eq!(schedule.emi_amount, Money::from_major(5_000));
        assert_eq!(schedule.total_amount, Money::from_major(60_000));
        for (_, amount) in &schedule.entries {
            assert_eq!(*amount, Money::from_major(5_000));
        }
    }

    #[test]
    fn test_zero_rate_residue_lands_on_final_emi() {
        let schedule =
            build_schedule(Money::from_major(1_000), Rate::ZERO, 3, start()).unwrap();

        // ceil(1000 / 3) = 333.34
        assert_eq!(schedule.emi_amount, Money::from_str_exact("333.34").unwrap());
        assert_eq!(schedule.entries[0].1, Money::from_str_exact("333.34").unwrap());
        assert_eq!(schedule.entries[1].1, Money::from_str_exact("333.34").unwrap());
        assert_eq!(schedule.entries[2].1, Money::from_str_exact("333.32").unwrap());

        let sum: Money = schedule.entries.iter().map(|(_, a)| *a).sum();
        assert_eq!(sum, Money::from_major(1_000));
    }

    #[test]
    fn test_positive_rate_annuity() {
        let schedule = build_schedule(
            Money::from_major(100_000),
            Rate::from_percentage_u32(12),
            12,
            start(),
        )
        .unwrap();

        // canonical annuity EMI for 100k @ 12% over 12 months
        assert_eq!(schedule.emi_amount, Money::from_str_exact("8884.88").unwrap());
        assert_eq!(schedule.total_amount, schedule.emi_amount * rust_decimal::Decimal::from(12));

        let sum: Money = schedule.entries.iter().map(|(_, a)| *a).sum();
        assert_eq!(sum, schedule.total_amount);
    }

    #[test]
    fn test_schedule_periods_are_consecutive() {
        let schedule =
            build_schedule(Money::from_major(9_000), Rate::ZERO, 3, start()).unwrap();
        assert_eq!(schedule.entries[0].0, PayPeriod::new(Month::April, 2025).unwrap());
        assert_eq!(schedule.entries[1].0, PayPeriod::new(Month::May, 2025).unwrap());
        assert_eq!(schedule.entries[2].0, PayPeriod::new(Month::June, 2025).unwrap());
    }

    #[test]
    fn test_schedule_crosses_year_boundary() {
        let november = PayPeriod::new(Month::November, 2025).unwrap();
        let schedule = build_schedule(Money::from_major(3_000), Rate::ZERO, 3, november).unwrap();
        assert_eq!(schedule.entries[2].0, PayPeriod::new(Month::January, 2026).unwrap());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(build_schedule(Money::from_major(1_000), Rate::ZERO, 0, start()).is_err());
        assert!(build_schedule(Money::ZERO, Rate::ZERO, 3, start()).is_err());
        assert!(build_schedule(
            Money::from_major(1_000),
            Rate::from_percentage(rust_decimal_macros::dec!(-1)),
            3,
            start()
        )
        .is_err());
    }
}
