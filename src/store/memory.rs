use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{
    Advance, AttendanceRecord, AuditEntry, AuditQuery, Designation, Employee, LeaveRequest, Loan,
    PayRun, User,
};
use crate::types::{EmployeeId, PayPeriod};

use super::{period_key, HrStore, StoreError, StoreResult, AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT};

/// in-process store over lock-striped maps; the default for tests and
/// for the `memory://` connection string
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    user_emails: DashMap<String, String>,
    employees: DashMap<EmployeeId, Employee>,
    employee_emails: DashMap<String, EmployeeId>,
    designations: DashMap<Uuid, Designation>,
    designation_titles: DashMap<String, Uuid>,
    attendance: DashMap<Uuid, AttendanceRecord>,
    attendance_keys: DashMap<String, Uuid>,
    advances: DashMap<Uuid, Advance>,
    loans: DashMap<Uuid, Loan>,
    leaves: DashMap<Uuid, LeaveRequest>,
    payruns: DashMap<Uuid, PayRun>,
    payrun_periods: DashMap<String, Uuid>,
    audit: Mutex<Vec<AuditEntry>>,
    // serializes multi-map uniqueness checks on insert paths
    insert_guard: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn attendance_key(employee: &EmployeeId, period: PayPeriod) -> String {
        format!("{}|{}", employee, period_key(period))
    }
}

impl HrStore for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        if self.users.contains_key(&user.username) {
            return Err(StoreError::Conflict(format!("username already taken: {}", user.username)));
        }
        let email_key = user.email.to_lowercase();
        if self.user_emails.contains_key(&email_key) {
            return Err(StoreError::Conflict(format!("email already registered: {}", user.email)));
        }
        self.users.insert(user.username.clone(), user.clone());
        self.user_emails.insert(email_key, user.username.clone());
        Ok(())
    }

    fn update_user(&self, user: &User) -> StoreResult<()> {
        match self.users.get_mut(&user.username) {
            Some(mut existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("user {}", user.username))),
        }
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users.get(username).map(|u| u.clone()))
    }

    fn insert_employee(&self, employee: &Employee) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        if self.employees.contains_key(&employee.id) {
            return Err(StoreError::Conflict(format!("employee id already exists: {}", employee.id)));
        }
        let email_key = employee.employment.official_email.to_lowercase();
        if self.employee_emails.contains_key(&email_key) {
            return Err(StoreError::Conflict(format!(
                "official email already registered: {}",
                employee.employment.official_email
            )));
        }
        self.employees.insert(employee.id.clone(), employee.clone());
        self.employee_emails.insert(email_key, employee.id.clone());
        Ok(())
    }

    fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let previous = self
            .employees
            .get(&employee.id)
            .map(|e| e.employment.official_email.to_lowercase())
            .ok_or_else(|| StoreError::Missing(format!("employee {}", employee.id)))?;

        let email_key = employee.employment.official_email.to_lowercase();
        if email_key != previous {
            if self.employee_emails.contains_key(&email_key) {
                return Err(StoreError::Conflict(format!(
                    "official email already registered: {}",
                    employee.employment.official_email
                )));
            }
            self.employee_emails.remove(&previous);
            self.employee_emails.insert(email_key, employee.id.clone());
        }
        self.employees.insert(employee.id.clone(), employee.clone());
        Ok(())
    }

    fn employee(&self, id: &EmployeeId) -> StoreResult<Option<Employee>> {
        Ok(self.employees.get(id).map(|e| e.clone()))
    }

    fn employee_by_official_email(&self, email: &str) -> StoreResult<Option<Employee>> {
        match self.employee_emails.get(&email.to_lowercase()) {
            Some(id) => self.employee(&id),
            None => Ok(None),
        }
    }

    fn employees(&self) -> StoreResult<Vec<Employee>> {
        let mut all: Vec<Employee> = self.employees.iter().map(|e| e.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn delete_employee(&self, id: &EmployeeId) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        match self.employees.remove(id) {
            Some((_, employee)) => {
                self.employee_emails.remove(&employee.employment.official_email.to_lowercase());
                Ok(())
            }
            None => Err(StoreError::Missing(format!("employee {id}"))),
        }
    }

    fn insert_designation(&self, designation: &Designation) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let title_key = designation.title.to_lowercase();
        if self.designation_titles.contains_key(&title_key) {
            return Err(StoreError::Conflict(format!("title already exists: {}", designation.title)));
        }
        self.designations.insert(designation.id, designation.clone());
        self.designation_titles.insert(title_key, designation.id);
        Ok(())
    }

    fn update_designation(&self, designation: &Designation) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let previous = self
            .designations
            .get(&designation.id)
            .map(|d| d.title.to_lowercase())
            .ok_or_else(|| StoreError::Missing(format!("designation {}", designation.id)))?;

        let title_key = designation.title.to_lowercase();
        if title_key != previous {
            if self.designation_titles.contains_key(&title_key) {
                return Err(StoreError::Conflict(format!(
                    "title already exists: {}",
                    designation.title
                )));
            }
            self.designation_titles.remove(&previous);
            self.designation_titles.insert(title_key, designation.id);
        }
        self.designations.insert(designation.id, designation.clone());
        Ok(())
    }

    fn designation(&self, id: &Uuid) -> StoreResult<Option<Designation>> {
        Ok(self.designations.get(id).map(|d| d.clone()))
    }

    fn designation_by_title(&self, title: &str) -> StoreResult<Option<Designation>> {
        match self.designation_titles.get(&title.to_lowercase()) {
            Some(id) => self.designation(&id),
            None => Ok(None),
        }
    }

    fn designations(&self) -> StoreResult<Vec<Designation>> {
        let mut all: Vec<Designation> = self.designations.iter().map(|d| d.clone()).collect();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(all)
    }

    fn delete_designation(&self, id: &Uuid) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        match self.designations.remove(id) {
            Some((_, designation)) => {
                self.designation_titles.remove(&designation.title.to_lowercase());
                Ok(())
            }
            None => Err(StoreError::Missing(format!("designation {id}"))),
        }
    }

    fn upsert_attendance(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let key = Self::attendance_key(&record.employee_id, record.period);
        if let Some(existing_id) = self.attendance_keys.get(&key).map(|v| *v) {
            self.attendance.remove(&existing_id);
        }
        self.attendance.insert(record.id, record.clone());
        self.attendance_keys.insert(key, record.id);
        Ok(())
    }

    fn attendance_for(
        &self,
        employee: &EmployeeId,
        period: PayPeriod,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let key = Self::attendance_key(employee, period);
        match self.attendance_keys.get(&key) {
            Some(id) => Ok(self.attendance.get(&id).map(|r| r.clone())),
            None => Ok(None),
        }
    }

    fn attendance_by_id(&self, id: &Uuid) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.attendance.get(id).map(|r| r.clone()))
    }

    fn attendance_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .filter(|r| &r.employee_id == employee)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.period);
        Ok(records)
    }

    fn delete_attendance(&self, id: &Uuid) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        match self.attendance.remove(id) {
            Some((_, record)) => {
                self.attendance_keys.remove(&Self::attendance_key(&record.employee_id, record.period));
                Ok(())
            }
            None => Err(StoreError::Missing(format!("attendance {id}"))),
        }
    }

    fn insert_advance(&self, advance: &Advance) -> StoreResult<()> {
        if self.advances.contains_key(&advance.id) {
            return Err(StoreError::Conflict(format!("advance already exists: {}", advance.id)));
        }
        self.advances.insert(advance.id, advance.clone());
        Ok(())
    }

    fn update_advance(&self, advance: &Advance) -> StoreResult<()> {
        match self.advances.get_mut(&advance.id) {
            Some(mut existing) => {
                *existing = advance.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("advance {}", advance.id))),
        }
    }

    fn advance(&self, id: &Uuid) -> StoreResult<Option<Advance>> {
        Ok(self.advances.get(id).map(|a| a.clone()))
    }

    fn advances_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Advance>> {
        let mut all: Vec<Advance> = self
            .advances
            .iter()
            .filter(|a| &a.employee_id == employee)
            .map(|a| a.clone())
            .collect();
        all.sort_by_key(|a| a.created_at);
        Ok(all)
    }

    fn delete_advance(&self, id: &Uuid) -> StoreResult<()> {
        self.advances
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing(format!("advance {id}")))
    }

    fn insert_loan(&self, loan: &Loan) -> StoreResult<()> {
        if self.loans.contains_key(&loan.id) {
            return Err(StoreError::Conflict(format!("loan already exists: {}", loan.id)));
        }
        self.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    fn update_loan(&self, loan: &Loan) -> StoreResult<()> {
        match self.loans.get_mut(&loan.id) {
            Some(mut existing) => {
                *existing = loan.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("loan {}", loan.id))),
        }
    }

    fn loan(&self, id: &Uuid) -> StoreResult<Option<Loan>> {
        Ok(self.loans.get(id).map(|l| l.clone()))
    }

    fn loans_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Loan>> {
        let mut all: Vec<Loan> = self
            .loans
            .iter()
            .filter(|l| &l.employee_id == employee)
            .map(|l| l.clone())
            .collect();
        all.sort_by_key(|l| l.created_at);
        Ok(all)
    }

    fn delete_loan(&self, id: &Uuid) -> StoreResult<()> {
        self.loans
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing(format!("loan {id}")))
    }

    fn insert_leave(&self, leave: &LeaveRequest) -> StoreResult<()> {
        if self.leaves.contains_key(&leave.id) {
            return Err(StoreError::Conflict(format!("leave already exists: {}", leave.id)));
        }
        self.leaves.insert(leave.id, leave.clone());
        Ok(())
    }

    fn update_leave_cas(&self, leave: &LeaveRequest, expected_version: u64) -> StoreResult<()> {
        // the dashmap entry holds the shard lock, making check-and-swap atomic
        match self.leaves.entry(leave.id) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if entry.get().version != expected_version {
                    return Err(StoreError::Conflict(format!(
                        "leave {} was concurrently modified",
                        leave.id
                    )));
                }
                entry.insert(leave.clone());
                Ok(())
            }
            dashmap::mapref::entry::Entry::Vacant(_) => {
                Err(StoreError::Missing(format!("leave {}", leave.id)))
            }
        }
    }

    fn leave(&self, id: &Uuid) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.leaves.get(id).map(|l| l.clone()))
    }

    fn leaves_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<LeaveRequest>> {
        let mut all: Vec<LeaveRequest> = self
            .leaves
            .iter()
            .filter(|l| &l.employee_id == employee)
            .map(|l| l.clone())
            .collect();
        all.sort_by_key(|l| l.created_at);
        Ok(all)
    }

    fn insert_payrun(&self, payrun: &PayRun) -> StoreResult<()> {
        // the period index entry is the create-if-absent guard
        match self.payrun_periods.entry(period_key(payrun.period)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "pay run already generated for {}",
                payrun.period
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(payrun.id);
                self.payruns.insert(payrun.id, payrun.clone());
                Ok(())
            }
        }
    }

    fn payrun(&self, id: &Uuid) -> StoreResult<Option<PayRun>> {
        Ok(self.payruns.get(id).map(|p| p.clone()))
    }

    fn payrun_for_period(&self, period: PayPeriod) -> StoreResult<Option<PayRun>> {
        match self.payrun_periods.get(&period_key(period)) {
            Some(id) => self.payrun(&id),
            None => Ok(None),
        }
    }

    fn payruns(&self) -> StoreResult<Vec<PayRun>> {
        let mut all: Vec<PayRun> = self.payruns.iter().map(|p| p.clone()).collect();
        all.sort_by_key(|p| p.period);
        Ok(all)
    }

    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.audit.lock().push(entry.clone());
        Ok(())
    }

    fn audit_entries(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        let limit = query.limit.unwrap_or(AUDIT_DEFAULT_LIMIT).min(AUDIT_MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);
        let mut matched: Vec<AuditEntry> =
            self.audit.lock().iter().filter(|e| query.matches(e)).cloned().collect();
        matched.sort_by(|a, b| b.at.cmp(&a.at));
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Month, Role};
    use chrono::{TimeZone, Utc};

    fn store() -> MemoryStore {
        MemoryStore::new()
    }

    fn user(name: &str, email: &str) -> User {
        User::new(name.into(), email.into(), "hash".into(), vec![Role::User], Utc::now()).unwrap()
    }

    #[test]
    fn test_username_and_email_uniqueness() {
        let s = store();
        s.insert_user(&user("asha", "asha@acme.test")).unwrap();

        let dup_name = user("asha", "other@acme.test");
        assert!(matches!(s.insert_user(&dup_name), Err(StoreError::Conflict(_))));

        let dup_email = user("other", "ASHA@acme.test");
        assert!(matches!(s.insert_user(&dup_email), Err(StoreError::Conflict(_))));

        // usernames are case-sensitive
        s.insert_user(&user("Asha", "asha2@acme.test")).unwrap();
    }

    #[test]
    fn test_leave_cas_detects_concurrent_writer() {
        use crate::domain::leave::{LeaveRequest, LeaveType};
        use chrono::NaiveDate;

        let s = store();
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let leave = LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Casual,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            "visiting family upcountry".into(),
            None,
            "Engineering".into(),
            created,
        )
        .unwrap();
        s.insert_leave(&leave).unwrap();

        // two actors load version 1 and both try to write
        let mut first = leave.clone();
        first.manager_approve("mgr-a".into(), "coverage arranged".into(), created).unwrap();
        s.update_leave_cas(&first, 1).unwrap();

        let mut second = leave.clone();
        second.manager_approve("mgr-b".into(), "coverage arranged".into(), created).unwrap();
        assert!(matches!(s.update_leave_cas(&second, 1), Err(StoreError::Conflict(_))));

        assert_eq!(
            s.leave(&leave.id).unwrap().unwrap().manager_approval.unwrap().actor,
            "mgr-a"
        );
    }

    #[test]
    fn test_payrun_period_guard() {
        let s = store();
        let period = PayPeriod::new(Month::January, 2025).unwrap();
        let run = PayRun::new(period, "hr".into(), vec![], Utc::now());
        s.insert_payrun(&run).unwrap();

        let second = PayRun::new(period, "hr".into(), vec![], Utc::now());
        assert!(matches!(s.insert_payrun(&second), Err(StoreError::Conflict(_))));

        // the stored run is unchanged
        assert_eq!(s.payrun_for_period(period).unwrap().unwrap().id, run.id);
    }

    #[test]
    fn test_attendance_upsert_is_idempotent_per_key() {
        let s = store();
        let employee = EmployeeId::generate();
        let period = PayPeriod::new(Month::January, 2025).unwrap();

        let first = AttendanceRecord::compute(
            employee.clone(),
            period,
            26,
            26,
            0,
            0,
            0,
            None,
            Utc::now(),
        )
        .unwrap();
        s.upsert_attendance(&first).unwrap();

        let second = AttendanceRecord::compute(
            employee.clone(),
            period,
            26,
            24,
            2,
            0,
            0,
            None,
            Utc::now(),
        )
        .unwrap();
        s.upsert_attendance(&second).unwrap();

        let stored = s.attendance_for(&employee, period).unwrap().unwrap();
        assert_eq!(stored.present_days, 24);
        // the replaced record is gone
        assert!(s.attendance_by_id(&first.id).unwrap().is_none());
    }

    #[test]
    fn test_employees_sorted_by_public_id() {
        use crate::domain::employee::tests_support::sample_employee;

        let s = store();
        for i in 0..5 {
            s.insert_employee(&sample_employee(&format!("e{i}@acme.test"))).unwrap();
        }
        let all = s.employees().unwrap();
        let mut sorted = all.clone();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(all, sorted);
    }
}
