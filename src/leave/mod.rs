use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use hourglass_rs::SafeTimeProvider;
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::leave::{LeaveRequest, LeaveType};
use crate::errors::{HrError, Result};
use crate::store::{HrStore, StoreError};
use crate::types::{EmployeeId, LeaveStatus, Role};

/// command to open a leave request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

const CAS_MAX_RETRIES: u32 = 3;

/// two-stage leave approval engine
///
/// overlap-sensitive operations (create, admin-approve) serialize per
/// employee through a lock registry; every state change goes through the
/// store's version compare-and-swap so a concurrent writer surfaces as
/// Conflict rather than a lost update
pub struct LeaveEngine {
    store: Arc<dyn HrStore>,
    clock: Arc<SafeTimeProvider>,
    locks: DashMap<EmployeeId, Arc<Mutex<()>>>,
}

impl LeaveEngine {
    pub fn new(store: Arc<dyn HrStore>, clock: Arc<SafeTimeProvider>) -> Self {
        LeaveEngine { store, clock, locks: DashMap::new() }
    }

    fn lock_for(&self, employee: &EmployeeId) -> Arc<Mutex<()>> {
        self.locks.entry(employee.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn load(&self, id: &Uuid) -> Result<LeaveRequest> {
        self.store
            .leave(id)?
            .ok_or_else(|| HrError::not_found("leave request", id.to_string()))
    }

    /// any ADMIN_APPROVED leave of `employee` intersecting [start, end],
    /// excluding `skip`
    fn approved_overlap(
        &self,
        employee: &EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
        skip: Option<Uuid>,
    ) -> Result<Option<LeaveRequest>> {
        let existing = self.store.leaves_for_employee(employee)?;
        Ok(existing.into_iter().find(|leave| {
            leave.status == LeaveStatus::AdminApproved
                && Some(leave.id) != skip
                && leave.overlaps_range(start, end)
        }))
    }

    pub async fn create(&self, cmd: CreateLeave) -> Result<LeaveRequest> {
        let employee = self
            .store
            .employee(&cmd.employee_id)?
            .ok_or_else(|| HrError::not_found("employee", cmd.employee_id.to_string()))?;
        if !employee.is_active() {
            return Err(HrError::DomainRuleViolation(format!(
                "employee {} is inactive",
                employee.id
            )));
        }

        let lock = self.lock_for(&cmd.employee_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let leave = LeaveRequest::new(
            cmd.employee_id.clone(),
            cmd.leave_type,
            cmd.start_date,
            cmd.end_date,
            cmd.reason,
            employee.employment.reporting_manager.clone(),
            employee.employment.department.clone(),
            now,
        )?;

        if let Some(blocking) =
            self.approved_overlap(&cmd.employee_id, cmd.start_date, cmd.end_date, None)?
        {
            return Err(HrError::invalid_input(
                "startDate",
                format!(
                    "requested range overlaps approved leave from {} to {}",
                    blocking.start_date, blocking.end_date
                ),
            ));
        }

        self.store.insert_leave(&leave)?;
        Ok(leave)
    }

    pub async fn manager_approve(
        &self,
        id: Uuid,
        actor: &str,
        comments: String,
    ) -> Result<LeaveRequest> {
        let actor = actor.to_string();
        self.transition(id, move |leave, now| {
            leave.manager_approve(actor.clone(), comments.clone(), now)
        })
        .await
    }

    pub async fn admin_approve(
        &self,
        id: Uuid,
        actor: &str,
        comments: String,
    ) -> Result<LeaveRequest> {
        // serialize with creations and other final approvals for the employee
        let employee_id = self.load(&id)?.employee_id;
        let lock = self.lock_for(&employee_id);
        let _guard = lock.lock().await;

        let current = self.load(&id)?;
        if let Some(blocking) = self.approved_overlap(
            &current.employee_id,
            current.start_date,
            current.end_date,
            Some(id),
        )? {
            return Err(HrError::Conflict(format!(
                "approved leave from {} to {} already covers part of this range",
                blocking.start_date, blocking.end_date
            )));
        }

        let actor = actor.to_string();
        self.transition(id, move |leave, now| {
            leave.admin_approve(actor.clone(), comments.clone(), now)
        })
        .await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        actor: &str,
        actor_roles: &[Role],
        reason: String,
    ) -> Result<LeaveRequest> {
        let actor = actor.to_string();
        let is_admin = actor_roles.contains(&Role::Admin);
        self.transition(id, move |leave, now| {
            // past the first stage only an administrator may reject
            if leave.status == LeaveStatus::ManagerApproved && !is_admin {
                return Err(HrError::Unauthorized(
                    "only an administrator can reject a manager-approved leave".to_string(),
                ));
            }
            leave.reject(actor.clone(), reason.clone(), now)
        })
        .await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<LeaveRequest> {
        self.transition(id, |leave, now| leave.cancel(now)).await
    }

    pub fn get(&self, id: &Uuid) -> Result<LeaveRequest> {
        self.load(id)
    }

    pub fn for_employee(&self, employee: &EmployeeId) -> Result<Vec<LeaveRequest>> {
        Ok(self.store.leaves_for_employee(employee)?)
    }

    /// apply a state change through the version CAS
    ///
    /// a CAS loss where the reloaded request is in a different state means a
    /// concurrent writer won the transition; that surfaces as Conflict.
    /// spurious losses in the same state retry a bounded number of times.
    async fn transition<F>(&self, id: Uuid, apply: F) -> Result<LeaveRequest>
    where
        F: Fn(&mut LeaveRequest, DateTime<Utc>) -> Result<()>,
    {
        let mut attempts = 0;
        loop {
            let current = self.load(&id)?;
            let seen_status = current.status;
            let mut updated = current.clone();
            apply(&mut updated, self.clock.now())?;

            match self.store.update_leave_cas(&updated, current.version) {
                Ok(()) => return Ok(updated),
                Err(StoreError::Conflict(_)) => {
                    attempts += 1;
                    let latest = self.load(&id)?;
                    if latest.status != seen_status || attempts >= CAS_MAX_RETRIES {
                        return Err(HrError::Conflict(format!(
                            "leave request {id} was concurrently modified"
                        )));
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}
