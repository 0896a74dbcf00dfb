use crate::domain::Advance;
use crate::money::Money;

/// recovery amount a pay-run should take for one due advance
///
/// full-recovery advances take the whole remainder in one pay-run; with
/// `partial_allowed` the deduction is capped by the pay left after every
/// prior deduction, and the leftover carries to subsequent months
pub fn deduction_for(advance: &Advance, available: Money) -> Money {
    if advance.partial_allowed {
        advance.remaining_amount.min(available.max(Money::ZERO))
    } else {
        advance.remaining_amount
    }
}
