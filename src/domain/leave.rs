use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};
use crate::types::{EmployeeId, LeaveStatus};

pub const REASON_MIN_LEN: usize = 10;
pub const REASON_MAX_LEN: usize = 1_000;
pub const COMMENTS_MIN_LEN: usize = 5;
pub const COMMENTS_MAX_LEN: usize = 500;

/// supported leave categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Maternity,
    Paternity,
    Unpaid,
}

/// approval step in the trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub actor: String,
    pub at: DateTime<Utc>,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRecord {
    pub actor: String,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// leave request with its two-stage approval trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// inclusive calendar-day count
    pub days: u32,
    pub reason: String,
    pub status: LeaveStatus,
    #[serde(default)]
    pub manager_approval: Option<ApprovalRecord>,
    #[serde(default)]
    pub admin_approval: Option<ApprovalRecord>,
    #[serde(default)]
    pub rejection: Option<RejectionRecord>,
    /// reporting manager handle at submission time
    #[serde(default)]
    pub reporting_manager: Option<String>,
    pub department: String,
    /// optimistic-concurrency version, bumped on every state change
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// inclusive day count of a closed date interval; callers validate order
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> u32 {
    (end - start).num_days().max(0) as u32 + 1
}

impl LeaveRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        employee_id: EmployeeId,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
        reporting_manager: Option<String>,
        department: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if end_date < start_date {
            return Err(HrError::invalid_input("endDate", "end date cannot precede start date"));
        }
        if start_date <= now.date_naive() {
            return Err(HrError::invalid_input("startDate", "leave must start in the future"));
        }
        let reason_len = reason.chars().count();
        if !(REASON_MIN_LEN..=REASON_MAX_LEN).contains(&reason_len) {
            return Err(HrError::invalid_input(
                "reason",
                format!("reason must be {REASON_MIN_LEN}-{REASON_MAX_LEN} characters"),
            ));
        }

        Ok(LeaveRequest {
            id: Uuid::new_v4(),
            employee_id,
            leave_type,
            start_date,
            end_date,
            days: inclusive_days(start_date, end_date),
            reason,
            status: LeaveStatus::Pending,
            manager_approval: None,
            admin_approval: None,
            rejection: None,
            reporting_manager,
            department,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// closed-interval overlap with another request
    pub fn overlaps(&self, other: &LeaveRequest) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }

    /// closed-interval overlap with a date range
    pub fn overlaps_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    /// PENDING -> MANAGER_APPROVED
    pub fn manager_approve(
        &mut self,
        actor: String,
        comments: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != LeaveStatus::Pending {
            return Err(HrError::illegal_transition(self.status.as_str(), "MANAGER_APPROVED"));
        }
        validate_comments(&comments)?;
        self.manager_approval = Some(ApprovalRecord { actor, at: now, comments });
        self.status = LeaveStatus::ManagerApproved;
        self.bump(now);
        Ok(())
    }

    /// MANAGER_APPROVED -> ADMIN_APPROVED (terminal grant)
    pub fn admin_approve(
        &mut self,
        actor: String,
        comments: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != LeaveStatus::ManagerApproved {
            return Err(HrError::illegal_transition(self.status.as_str(), "ADMIN_APPROVED"));
        }
        validate_comments(&comments)?;
        self.admin_approval = Some(ApprovalRecord { actor, at: now, comments });
        self.status = LeaveStatus::AdminApproved;
        self.bump(now);
        Ok(())
    }

    /// PENDING or MANAGER_APPROVED -> REJECTED (terminal)
    pub fn reject(&mut self, actor: String, reason: String, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status, LeaveStatus::Pending | LeaveStatus::ManagerApproved) {
            return Err(HrError::illegal_transition(self.status.as_str(), "REJECTED"));
        }
        self.rejection = Some(RejectionRecord { actor, at: now, reason });
        self.status = LeaveStatus::Rejected;
        self.bump(now);
        Ok(())
    }

    /// PENDING or MANAGER_APPROVED -> CANCELLED (terminal)
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status, LeaveStatus::Pending | LeaveStatus::ManagerApproved) {
            return Err(HrError::illegal_transition(self.status.as_str(), "CANCELLED"));
        }
        self.status = LeaveStatus::Cancelled;
        self.bump(now);
        Ok(())
    }
}

fn validate_comments(comments: &str) -> Result<()> {
    let len = comments.chars().count();
    if !(COMMENTS_MIN_LEN..=COMMENTS_MAX_LEN).contains(&len) {
        return Err(HrError::invalid_input(
            "comments",
            format!("comments must be {COMMENTS_MIN_LEN}-{COMMENTS_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request() -> LeaveRequest {
        LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Earned,
            d(2025, 4, 1),
            d(2025, 4, 4),
            "family wedding out of town".into(),
            Some("EMPMGR00001A".into()),
            "Engineering".into(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_creation_and_day_count() {
        let leave = request();
        assert_eq!(leave.status, LeaveStatus::Pending);
        assert_eq!(leave.days, 4);
        assert_eq!(leave.version, 1);

        // one-day leave is legal
        let one_day = LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Casual,
            d(2025, 4, 1),
            d(2025, 4, 1),
            "personal errand downtown".into(),
            None,
            "Engineering".into(),
            now(),
        )
        .unwrap();
        assert_eq!(one_day.days, 1);
    }

    #[test]
    fn test_creation_rejections() {
        // starting today is not in the future
        assert!(LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Casual,
            d(2025, 3, 10),
            d(2025, 3, 11),
            "a sufficiently long reason".into(),
            None,
            "Engineering".into(),
            now(),
        )
        .is_err());

        // end before start
        assert!(LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Casual,
            d(2025, 4, 5),
            d(2025, 4, 1),
            "a sufficiently long reason".into(),
            None,
            "Engineering".into(),
            now(),
        )
        .is_err());

        // reason too short
        assert!(LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Casual,
            d(2025, 4, 1),
            d(2025, 4, 2),
            "short".into(),
            None,
            "Engineering".into(),
            now(),
        )
        .is_err());
    }

    #[test]
    fn test_two_stage_approval() {
        let mut leave = request();
        leave.manager_approve("mgr".into(), "workload covered".into(), now()).unwrap();
        assert_eq!(leave.status, LeaveStatus::ManagerApproved);
        assert_eq!(leave.version, 2);

        leave.admin_approve("admin".into(), "approved for April".into(), now()).unwrap();
        assert_eq!(leave.status, LeaveStatus::AdminApproved);
        assert!(leave.admin_approval.is_some());

        // terminal
        assert!(leave.cancel(now()).is_err());
        assert!(leave.reject("admin".into(), "too late".into(), now()).is_err());
    }

    #[test]
    fn test_admin_approve_requires_manager_stage() {
        let mut leave = request();
        let err = leave.admin_approve("admin".into(), "skipping ahead".into(), now()).unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_reject_and_cancel_paths() {
        let mut leave = request();
        leave.reject("mgr".into(), "blackout period".into(), now()).unwrap();
        assert_eq!(leave.status, LeaveStatus::Rejected);
        assert!(leave.manager_approve("mgr".into(), "changed my mind".into(), now()).is_err());

        let mut leave = request();
        leave.manager_approve("mgr".into(), "workload covered".into(), now()).unwrap();
        leave.cancel(now()).unwrap();
        assert_eq!(leave.status, LeaveStatus::Cancelled);
    }

    #[test]
    fn test_comment_length_bounds() {
        let mut leave = request();
        assert!(leave.manager_approve("mgr".into(), "ok".into(), now()).is_err());
        let long = "x".repeat(501);
        assert!(leave.manager_approve("mgr".into(), long, now()).is_err());
        assert_eq!(leave.status, LeaveStatus::Pending);
    }

    #[test]
    fn test_overlap_is_closed_on_both_ends() {
        let leave = request(); // Apr 1 - Apr 4
        assert!(leave.overlaps_range(d(2025, 4, 4), d(2025, 4, 10)));
        assert!(leave.overlaps_range(d(2025, 3, 28), d(2025, 4, 1)));
        assert!(!leave.overlaps_range(d(2025, 4, 5), d(2025, 4, 10)));
        assert!(!leave.overlaps_range(d(2025, 3, 20), d(2025, 3, 31)));
    }
}
