pub mod advance;
pub mod attendance;
pub mod audit;
pub mod designation;
pub mod employee;
pub mod leave;
pub mod loan;
pub mod payrun;
pub mod user;

pub use advance::Advance;
pub use attendance::AttendanceRecord;
pub use audit::{AuditEntry, AuditQuery};
pub use designation::Designation;
pub use employee::{
    BankInfo, CompensationInput, Employee, EmploymentInfo, EmploymentType, MonthlyCompensation,
    PersonalInfo,
};
pub use leave::{ApprovalRecord, LeaveRequest, LeaveType, RejectionRecord};
pub use loan::{Loan, ScheduledEmi, ScheduledEmiStatus};
pub use payrun::{PayRun, PayRunLine};
pub use user::User;
