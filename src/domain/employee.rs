use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{HrError, Result};
use crate::money::{Money, Rate};
use crate::types::{EmployeeId, EmployeeStatus};

/// employment contract kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub personal_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub current_address: Option<String>,
    #[serde(default)]
    pub permanent_address: Option<String>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentInfo {
    pub employment_type: EmploymentType,
    pub department: String,
    /// designation title, resolved lazily against the designation catalog
    pub designation: String,
    /// reporting manager handle (employee public id), resolved lazily
    #[serde(default)]
    pub reporting_manager: Option<String>,
    pub official_email: String,
    pub join_date: NaiveDate,
    #[serde(default)]
    pub work_location: Option<String>,
    #[serde(default)]
    pub probation_months: u8,
}

/// compensation request: a CTC figure plus optional overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationInput {
    pub ctc_annual: Money,
    /// 0-100; defaulted from the statutory profile when absent
    #[serde(default)]
    pub hra_percent: Option<Rate>,
    #[serde(default)]
    pub conveyance: Option<Money>,
    #[serde(default)]
    pub telephone: Option<Money>,
    #[serde(default)]
    pub medical_allowance: Option<Money>,
    #[serde(default)]
    pub special_allowance: Option<Money>,
    pub include_pf: bool,
    pub include_esi: bool,
    #[serde(default)]
    pub tds_annual: Money,
}

/// monthly decomposition of a CTC, all values at two-decimal scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCompensation {
    pub monthly_ctc: Money,
    pub basic: Money,
    pub hra: Money,
    pub conveyance: Money,
    pub telephone: Money,
    pub medical_allowance: Money,
    pub special_allowance: Money,
    pub gross: Money,
    pub pf_deduction: Money,
    pub pf_employer: Money,
    pub esi_deduction: Money,
    pub esi_employer: Money,
    pub professional_tax: Money,
    pub tds_monthly: Money,
    pub net: Money,
}

impl MonthlyCompensation {
    /// the compensation-block equation: gross covers its components
    pub fn components_sum_to_gross(&self) -> bool {
        self.basic
            + self.hra
            + self.conveyance
            + self.telephone
            + self.medical_allowance
            + self.special_allowance
            == self.gross
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    #[serde(default)]
    pub ifsc: Option<String>,
}

/// employee aggregate: personal, employment, compensation and bank blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub personal: PersonalInfo,
    pub employment: EmploymentInfo,
    pub compensation_input: CompensationInput,
    pub compensation: MonthlyCompensation,
    #[serde(default)]
    pub bank: Option<BankInfo>,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(
        personal: PersonalInfo,
        employment: EmploymentInfo,
        compensation_input: CompensationInput,
        compensation: MonthlyCompensation,
        bank: Option<BankInfo>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let employee = Employee {
            id: EmployeeId::generate(),
            personal,
            employment,
            compensation_input,
            compensation,
            bank,
            status: EmployeeStatus::Active,
            created_at: now,
            updated_at: now,
        };
        employee.validate(now.date_naive())?;
        Ok(employee)
    }

    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.personal.first_name.trim().is_empty() || self.personal.last_name.trim().is_empty() {
            return Err(HrError::invalid_input("name", "first and last name are required"));
        }
        if self.employment.department.trim().is_empty() {
            return Err(HrError::invalid_input("department", "department is required"));
        }
        if self.employment.designation.trim().is_empty() {
            return Err(HrError::invalid_input("designation", "designation is required"));
        }
        if !self.employment.official_email.contains('@') {
            return Err(HrError::invalid_input("officialEmail", "not a valid email address"));
        }
        if self.employment.join_date > today {
            return Err(HrError::invalid_input("joinDate", "join date cannot be in the future"));
        }
        if self.compensation_input.ctc_annual.is_negative() {
            return Err(HrError::invalid_input("ctcAnnual", "CTC must not be negative"));
        }
        if !self.compensation.components_sum_to_gross() {
            return Err(HrError::DomainRuleViolation(
                "compensation components do not sum to gross".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    /// status flips to INACTIVE on exit; employees are never hard-deleted
    /// while payroll or leave references exist
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.status = EmployeeStatus::Inactive;
        self.updated_at = now;
    }
}

/// shared builders for unit tests across the crate
#[cfg(test)]
pub mod tests_support {
    use super::*;
    use crate::config::StatutoryProfile;
    use crate::money::Rate;

    pub fn sample_compensation_input(ctc: i64) -> CompensationInput {
        CompensationInput {
            ctc_annual: Money::from_major(ctc),
            hra_percent: Some(Rate::from_percentage_u32(10)),
            conveyance: None,
            telephone: None,
            medical_allowance: None,
            special_allowance: None,
            include_pf: true,
            include_esi: false,
            tds_annual: Money::ZERO,
        }
    }

    /// active employee with a 12L CTC and the given unique official email
    pub fn sample_employee(official_email: &str) -> Employee {
        let input = sample_compensation_input(1_200_000);
        let monthly = crate::payroll::decompose(&input, &StatutoryProfile::default())
            .expect("reference compensation decomposes");
        Employee::new(
            PersonalInfo {
                first_name: "Asha".into(),
                middle_name: None,
                last_name: "Verma".into(),
                date_of_birth: NaiveDate::from_ymd_opt(1992, 4, 11).unwrap(),
                personal_email: None,
                phone: None,
                current_address: None,
                permanent_address: None,
            },
            EmploymentInfo {
                employment_type: EmploymentType::FullTime,
                department: "Engineering".into(),
                designation: "Senior Engineer".into(),
                reporting_manager: None,
                official_email: official_email.into(),
                join_date: NaiveDate::from_ymd_opt(2022, 7, 1).unwrap(),
                work_location: None,
                probation_months: 3,
            },
            input,
            monthly,
            None,
            Utc::now(),
        )
        .expect("sample employee is valid")
    }
}
