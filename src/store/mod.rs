pub mod memory;
pub mod sled_store;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Advance, AttendanceRecord, AuditEntry, AuditQuery, Designation, Employee, LeaveRequest, Loan,
    PayRun, User,
};
use crate::errors::HrError;
use crate::types::{EmployeeId, PayPeriod};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("missing: {0}")]
    Missing(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for HrError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => HrError::Conflict(msg),
            StoreError::Missing(what) => HrError::NotFound { kind: "record", id: what },
            // store internals never reach clients
            other => HrError::internal(other.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// sortable persistence key for a pay period, e.g. `2025-01`
pub fn period_key(period: PayPeriod) -> String {
    format!("{:04}-{:02}", period.year, period.month.index())
}

/// narrow repository contract; the core only sees this trait
///
/// uniqueness guards (usernames, official emails, attendance and pay-run
/// period keys) and the leave version compare-and-swap live here so every
/// implementation serializes them the same way
pub trait HrStore: Send + Sync {
    fn ping(&self) -> StoreResult<()>;

    // users
    fn insert_user(&self, user: &User) -> StoreResult<()>;
    fn update_user(&self, user: &User) -> StoreResult<()>;
    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    // employees
    fn insert_employee(&self, employee: &Employee) -> StoreResult<()>;
    fn update_employee(&self, employee: &Employee) -> StoreResult<()>;
    fn employee(&self, id: &EmployeeId) -> StoreResult<Option<Employee>>;
    fn employee_by_official_email(&self, email: &str) -> StoreResult<Option<Employee>>;
    /// all employees in ascending public-id order
    fn employees(&self) -> StoreResult<Vec<Employee>>;
    fn delete_employee(&self, id: &EmployeeId) -> StoreResult<()>;

    // designations
    fn insert_designation(&self, designation: &Designation) -> StoreResult<()>;
    fn update_designation(&self, designation: &Designation) -> StoreResult<()>;
    fn designation(&self, id: &Uuid) -> StoreResult<Option<Designation>>;
    fn designation_by_title(&self, title: &str) -> StoreResult<Option<Designation>>;
    fn designations(&self) -> StoreResult<Vec<Designation>>;
    fn delete_designation(&self, id: &Uuid) -> StoreResult<()>;

    // attendance, unique per (employee, period)
    fn upsert_attendance(&self, record: &AttendanceRecord) -> StoreResult<()>;
    fn attendance_for(
        &self,
        employee: &EmployeeId,
        period: PayPeriod,
    ) -> StoreResult<Option<AttendanceRecord>>;
    fn attendance_by_id(&self, id: &Uuid) -> StoreResult<Option<AttendanceRecord>>;
    fn attendance_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<AttendanceRecord>>;
    fn delete_attendance(&self, id: &Uuid) -> StoreResult<()>;

    // advances
    fn insert_advance(&self, advance: &Advance) -> StoreResult<()>;
    fn update_advance(&self, advance: &Advance) -> StoreResult<()>;
    fn advance(&self, id: &Uuid) -> StoreResult<Option<Advance>>;
    fn advances_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Advance>>;
    fn delete_advance(&self, id: &Uuid) -> StoreResult<()>;

    // loans
    fn insert_loan(&self, loan: &Loan) -> StoreResult<()>;
    fn update_loan(&self, loan: &Loan) -> StoreResult<()>;
    fn loan(&self, id: &Uuid) -> StoreResult<Option<Loan>>;
    fn loans_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Loan>>;
    fn delete_loan(&self, id: &Uuid) -> StoreResult<()>;

    // leaves
    fn insert_leave(&self, leave: &LeaveRequest) -> StoreResult<()>;
    /// replace only if the stored version equals `expected_version`
    fn update_leave_cas(&self, leave: &LeaveRequest, expected_version: u64) -> StoreResult<()>;
    fn leave(&self, id: &Uuid) -> StoreResult<Option<LeaveRequest>>;
    fn leaves_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<LeaveRequest>>;

    // pay-runs, unique per period
    fn insert_payrun(&self, payrun: &PayRun) -> StoreResult<()>;
    fn payrun(&self, id: &Uuid) -> StoreResult<Option<PayRun>>;
    fn payrun_for_period(&self, period: PayPeriod) -> StoreResult<Option<PayRun>>;
    fn payruns(&self) -> StoreResult<Vec<PayRun>>;

    // audit, append-only
    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()>;
    /// newest first, after applying the query's offset and limit
    fn audit_entries(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>>;
}

pub const AUDIT_DEFAULT_LIMIT: usize = 100;
pub const AUDIT_MAX_LIMIT: usize = 500;

/// open the store named by a connection string:
/// `memory://` for the in-process store, `sled://<path>` for sled
pub fn open_store(url: &str) -> StoreResult<Arc<dyn HrStore>> {
    if url == "memory://" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if let Some(path) = url.strip_prefix("sled://") {
        return Ok(Arc::new(SledStore::open(path)?));
    }
    Err(StoreError::Storage(format!("unsupported store url: {url}")))
}
