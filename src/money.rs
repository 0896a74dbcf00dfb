use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};
use std::str::FromStr;

/// Money type with 2 decimal places, banker's rounding at every boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal, rounding to the payroll scale
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(2))
    }

    /// create from decimal, rounding up to the payroll scale
    pub fn from_decimal_ceil(d: Decimal) -> Self {
        Money(d.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s)?.round_dp(2)))
    }

    /// create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor units (paise, cents)
    pub fn from_minor(amount: i64) -> Self {
        Money((Decimal::from(amount) / Decimal::from(100)).round_dp(2))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// absolute value
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// calculate percentage (e.g., 12% of basic)
    pub fn percentage(&self, rate: Rate) -> Self {
        Money((self.0 * rate.as_decimal() / Decimal::from(100)).round_dp(2))
    }

    /// pro-rate by a days fraction, rounding at the boundary
    pub fn prorate(&self, numerator: u32, denominator: u32) -> Self {
        if denominator == 0 {
            return Money::ZERO;
        }
        Money((self.0 * Decimal::from(numerator) / Decimal::from(denominator)).round_dp(2))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i64> for Money {
    fn from(i: i64) -> Self {
        Money::from_major(i)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(2))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(2);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(2))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = (self.0 - other.0).round_dp(2);
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money((self.0 * other).round_dp(2))
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, other: Decimal) -> Money {
        Money((self.0 / other).round_dp(2))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

/// rate type for statutory percentages and interest rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from a percentage figure (e.g., 12 for 12%)
    pub fn from_percentage(p: Decimal) -> Self {
        Rate(p)
    }

    /// create from whole percentage points
    pub fn from_percentage_u32(p: u32) -> Self {
        Rate(Decimal::from(p))
    }

    /// percentage figure (12% -> 12)
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// fraction form (12% -> 0.12)
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::from(100)
    }

    /// monthly fraction of an annual rate (12% -> 0.01)
    pub fn monthly_fraction(&self) -> Decimal {
        self.as_fraction() / Decimal::from(12)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_percentage(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_scale() {
        let m = Money::from_str_exact("100.129").unwrap();
        assert_eq!(m.to_string(), "100.13");

        let m = Money::from_minor(12345);
        assert_eq!(m.to_string(), "123.45");
    }

    #[test]
    fn test_bankers_rounding_at_boundaries() {
        // midpoint rounds to even at the 2dp boundary
        assert_eq!(Money::from_decimal(dec!(10.125)).to_string(), "10.12");
        assert_eq!(Money::from_decimal(dec!(10.135)).to_string(), "10.14");

        let a = Money::from_str_exact("0.005").unwrap();
        assert_eq!(a, Money::ZERO);
    }

    #[test]
    fn test_ceil_rounding() {
        let emi = Money::from_decimal_ceil(dec!(60000) / dec!(7));
        assert_eq!(emi.to_string(), "8571.43");
        assert_eq!(Money::from_decimal_ceil(dec!(5000)), Money::from_major(5000));
    }

    #[test]
    fn test_percentage() {
        let basic = Money::from_major(15_000);
        assert_eq!(basic.percentage(Rate::from_percentage_u32(12)), Money::from_major(1_800));

        let gross = Money::from_major(98_200);
        assert_eq!(
            gross.percentage(Rate::from_percentage(dec!(0.75))),
            Money::from_decimal(dec!(736.50))
        );
    }

    #[test]
    fn test_prorate() {
        let gross = Money::from_major(98_200);
        assert_eq!(gross.prorate(26, 26), gross);
        assert_eq!(gross.prorate(13, 26), Money::from_major(49_100));
        assert_eq!(gross.prorate(0, 26), Money::ZERO);
        assert_eq!(gross.prorate(1, 0), Money::ZERO);
    }

    #[test]
    fn test_rate_fractions() {
        let r = Rate::from_percentage_u32(12);
        assert_eq!(r.as_fraction(), dec!(0.12));
        assert_eq!(r.monthly_fraction(), dec!(0.01));
    }
}
