use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::HrError;

/// public employee identifier: `EMP` + 8 upper-case alphanumerics
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

const EMPLOYEE_ID_PREFIX: &str = "EMP";
const EMPLOYEE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const EMPLOYEE_ID_SUFFIX_LEN: usize = 8;

impl EmployeeId {
    /// generate a fresh public id
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..EMPLOYEE_ID_SUFFIX_LEN)
            .map(|_| EMPLOYEE_ID_ALPHABET[rng.gen_range(0..EMPLOYEE_ID_ALPHABET.len())] as char)
            .collect();
        EmployeeId(format!("{EMPLOYEE_ID_PREFIX}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EmployeeId {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.strip_prefix(EMPLOYEE_ID_PREFIX).ok_or_else(|| {
            HrError::invalid_input("employeeId", "employee id must start with EMP")
        })?;
        let well_formed = suffix.len() == EMPLOYEE_ID_SUFFIX_LEN
            && suffix.bytes().all(|b| EMPLOYEE_ID_ALPHABET.contains(&b));
        if !well_formed {
            return Err(HrError::invalid_input(
                "employeeId",
                "employee id must be EMP followed by 8 upper-case alphanumerics",
            ));
        }
        Ok(EmployeeId(s.to_string()))
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// calendar month, the string half of a pay-period key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// 1-based calendar index
    pub fn index(&self) -> u32 {
        Month::ALL.iter().position(|m| m == self).unwrap_or(0) as u32 + 1
    }

    pub fn from_index(index: u32) -> Option<Month> {
        Month::ALL.get(index.checked_sub(1)? as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }
}

impl FromStr for Month {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| HrError::invalid_input("month", format!("unknown month: {s}")))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// pay-period key: one calendar month of one year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriod {
    pub month: Month,
    pub year: i32,
}

impl PayPeriod {
    pub fn new(month: Month, year: i32) -> Result<Self, HrError> {
        if !(1900..=2200).contains(&year) {
            return Err(HrError::invalid_input("year", format!("year out of range: {year}")));
        }
        Ok(PayPeriod { month, year })
    }

    /// the following calendar month
    pub fn next(&self) -> PayPeriod {
        match self.month {
            Month::December => PayPeriod { month: Month::January, year: self.year + 1 },
            m => PayPeriod {
                month: Month::from_index(m.index() + 1).unwrap_or(Month::January),
                year: self.year,
            },
        }
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + self.month.index() as i64 - 1
    }

    /// period containing the given date
    pub fn containing(date: chrono::NaiveDate) -> PayPeriod {
        use chrono::Datelike;
        PayPeriod {
            month: Month::from_index(date.month()).unwrap_or(Month::January),
            year: date.year(),
        }
    }
}

impl PartialOrd for PayPeriod {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PayPeriod {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month, self.year)
    }
}

/// closed role set, seeded at bootstrap and never deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Hr,
    Employee,
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Manager, Role::Hr, Role::Employee, Role::User];

    /// seniority rank for "role or higher" checks
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 5,
            Role::Manager => 4,
            Role::Hr => 3,
            Role::Employee => 2,
            Role::User => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Hr => "HR",
            Role::Employee => "EMPLOYEE",
            Role::User => "USER",
        }
    }
}

impl FromStr for Role {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| HrError::invalid_input("role", format!("unknown role: {s}")))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// employee lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

/// advance recovery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvanceStatus {
    /// nothing recovered yet
    Pending,
    /// partially recovered, remainder carries to the next pay-run
    Partial,
    /// fully recovered, terminal
    Deducted,
}

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// repaying, one EMI per pay-run
    Active,
    /// every EMI paid, terminal
    Completed,
    /// cancelled by an administrator, remaining balance frozen
    Cancelled,
}

/// leave request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    ManagerApproved,
    AdminApproved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeaveStatus::AdminApproved | LeaveStatus::Rejected | LeaveStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "PENDING",
            LeaveStatus::ManagerApproved => "MANAGER_APPROVED",
            LeaveStatus::AdminApproved => "ADMIN_APPROVED",
            LeaveStatus::Rejected => "REJECTED",
            LeaveStatus::Cancelled => "CANCELLED",
        }
    }
}

/// audit entry action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    AccessDenied,
}

impl FromStr for AuditAction {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            "LOGIN" => Ok(AuditAction::Login),
            "LOGOUT" => Ok(AuditAction::Logout),
            "ACCESS_DENIED" => Ok(AuditAction::AccessDenied),
            other => Err(HrError::invalid_input("action", format!("unknown audit action: {other}"))),
        }
    }
}
