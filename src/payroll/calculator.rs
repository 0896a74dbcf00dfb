use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::StatutoryProfile;
use crate::domain::employee::{CompensationInput, MonthlyCompensation};
use crate::errors::{HrError, Result};
use crate::money::{Money, Rate};

/// decompose an annual CTC into monthly components
///
/// pure function of the input and the statutory profile; rounding happens
/// at every named boundary (gross, each deduction, net). fixed allowance
/// defaults apply only up to the residual left after basic and HRA, so a
/// zero CTC decomposes to all-zero components; explicit overrides that
/// exceed the residual are rejected naming the offending field.
pub fn decompose(
    input: &CompensationInput,
    profile: &StatutoryProfile,
) -> Result<MonthlyCompensation> {
    if input.ctc_annual.is_negative() {
        return Err(HrError::invalid_input("ctcAnnual", "CTC must not be negative"));
    }
    if input.tds_annual.is_negative() {
        return Err(HrError::invalid_input("tdsAnnual", "TDS must not be negative"));
    }

    let hra_percent = input.hra_percent.unwrap_or_else(|| profile.default_hra_percent(input.ctc_annual));
    if hra_percent.as_decimal() < Decimal::ZERO || hra_percent.as_decimal() > dec!(100) {
        return Err(HrError::invalid_input("hraPercent", "HRA percentage must be between 0 and 100"));
    }

    let monthly_ctc = input.ctc_annual / dec!(12);
    let basic = monthly_ctc * dec!(0.5);

    let pf_base = basic.min(profile.pf_base_cap);
    let pf_deduction = if input.include_pf { pf_base.percentage(profile.pf_rate) } else { Money::ZERO };
    let pf_employer = pf_deduction;

    // gross excludes employer statutory contributions; the ESI base is the
    // pay left after employer PF
    let esi_base = monthly_ctc - pf_employer;
    let (esi_deduction, esi_employer) = if input.include_esi {
        (
            esi_base.percentage(profile.esi_employee_rate),
            esi_base.percentage(profile.esi_employer_rate),
        )
    } else {
        (Money::ZERO, Money::ZERO)
    };
    let gross = monthly_ctc - pf_employer - esi_employer;

    let hra = basic.percentage(hra_percent);

    let mut residual = gross - basic - hra;
    if residual.is_negative() {
        return Err(HrError::invalid_input("hraPercent", "basic and HRA exceed monthly gross"));
    }

    let conveyance = fixed_allowance("conveyance", input.conveyance, profile.default_conveyance, &mut residual)?;
    let telephone = fixed_allowance("telephone", input.telephone, profile.default_telephone, &mut residual)?;
    let medical_allowance = fixed_allowance(
        "medicalAllowance",
        input.medical_allowance,
        profile.default_medical_allowance,
        &mut residual,
    )?;

    let special_allowance = residual;
    if let Some(requested) = input.special_allowance {
        if requested != special_allowance {
            return Err(HrError::invalid_input(
                "specialAllowance",
                format!("special allowance is derived as {special_allowance} for this CTC"),
            ));
        }
    }

    let professional_tax = profile.professional_tax_for(gross);
    let tds_monthly = input.tds_annual / dec!(12);
    let net = gross - (pf_deduction + esi_deduction + professional_tax + tds_monthly);

    Ok(MonthlyCompensation {
        monthly_ctc,
        basic,
        hra,
        conveyance,
        telephone,
        medical_allowance,
        special_allowance,
        gross,
        pf_deduction,
        pf_employer,
        esi_deduction,
        esi_employer,
        professional_tax,
        tds_monthly,
        net,
    })
}

/// resolve one fixed allowance against the remaining residual
fn fixed_allowance(
    field: &'static str,
    requested: Option<Money>,
    default: Money,
    residual: &mut Money,
) -> Result<Money> {
    let amount = match requested {
        Some(value) => {
            if value.is_negative() {
                return Err(HrError::invalid_input(field, "allowance must not be negative"));
            }
            value
        }
        None => default.min((*residual).max(Money::ZERO)),
    };
    *residual = *residual - amount;
    if residual.is_negative() {
        return Err(HrError::invalid_input(
            field,
            format!("fixed allowances exceed the residual gross; {field} is too large"),
        ));
    }
    Ok(amount)
}

/// PF deduction for a (possibly prorated) basic, honoring the wage ceiling
pub fn pf_for_basic(basic: Money, include_pf: bool, profile: &StatutoryProfile) -> Money {
    if !include_pf {
        return Money::ZERO;
    }
    basic.min(profile.pf_base_cap).percentage(profile.pf_rate)
}

/// employee-share ESI for a (possibly prorated) gross
pub fn esi_for_gross(gross: Money, include_esi: bool, profile: &StatutoryProfile) -> Money {
    if !include_esi {
        return Money::ZERO;
    }
    gross.percentage(profile.esi_employee_rate)
}
