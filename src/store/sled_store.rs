use std::path::Path;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Advance, AttendanceRecord, AuditEntry, AuditQuery, Designation, Employee, LeaveRequest, Loan,
    PayRun, User,
};
use crate::types::{EmployeeId, PayPeriod};

use super::{period_key, HrStore, StoreError, StoreResult, AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT};

/// sled-backed store, one tree per aggregate plus secondary-key trees
///
/// values are JSON documents so schema evolution stays additive: new fields
/// deserialize through `#[serde(default)]` and old readers ignore extras
pub struct SledStore {
    _db: sled::Db,
    users: sled::Tree,
    user_emails: sled::Tree,
    employees: sled::Tree,
    employee_emails: sled::Tree,
    designations: sled::Tree,
    designation_titles: sled::Tree,
    attendance: sled::Tree,
    attendance_keys: sled::Tree,
    advances: sled::Tree,
    loans: sled::Tree,
    leaves: sled::Tree,
    payruns: sled::Tree,
    payrun_periods: sled::Tree,
    audit: sled::Tree,
    insert_guard: Mutex<()>,
}

fn storage_err(e: sled::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> StoreResult<Option<T>> {
    match tree.get(key).map_err(storage_err)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> StoreResult<()> {
    tree.insert(key, encode(value)?).map_err(storage_err)?;
    Ok(())
}

fn scan_json<T: DeserializeOwned>(tree: &sled::Tree) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, bytes) = item.map_err(storage_err)?;
        out.push(decode(&bytes)?);
    }
    Ok(out)
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        let open = |name: &str| db.open_tree(name).map_err(storage_err);
        Ok(SledStore {
            users: open("users")?,
            user_emails: open("user_emails")?,
            employees: open("employees")?,
            employee_emails: open("employee_emails")?,
            designations: open("designations")?,
            designation_titles: open("designation_titles")?,
            attendance: open("attendance")?,
            attendance_keys: open("attendance_keys")?,
            advances: open("advances")?,
            loans: open("loans")?,
            leaves: open("leaves")?,
            payruns: open("payruns")?,
            payrun_periods: open("payrun_periods")?,
            audit: open("audit")?,
            insert_guard: Mutex::new(()),
            _db: db,
        })
    }

    fn attendance_key(employee: &EmployeeId, period: PayPeriod) -> Vec<u8> {
        format!("{}|{}", employee, period_key(period)).into_bytes()
    }

    /// time-ordered unique key for audit entries
    fn audit_key(entry: &AuditEntry) -> Vec<u8> {
        let mut key = entry.at.timestamp_millis().to_be_bytes().to_vec();
        key.extend_from_slice(entry.id.as_bytes());
        key
    }
}

impl HrStore for SledStore {
    fn ping(&self) -> StoreResult<()> {
        self.users.contains_key(b"__ping__").map_err(storage_err)?;
        Ok(())
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        if self.users.contains_key(user.username.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("username already taken: {}", user.username)));
        }
        let email_key = user.email.to_lowercase();
        if self.user_emails.contains_key(email_key.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("email already registered: {}", user.email)));
        }
        put_json(&self.users, user.username.as_bytes(), user)?;
        self.user_emails
            .insert(email_key.as_bytes(), user.username.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn update_user(&self, user: &User) -> StoreResult<()> {
        if !self.users.contains_key(user.username.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Missing(format!("user {}", user.username)));
        }
        put_json(&self.users, user.username.as_bytes(), user)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        get_json(&self.users, username.as_bytes())
    }

    fn insert_employee(&self, employee: &Employee) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        if self.employees.contains_key(employee.id.as_str().as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("employee id already exists: {}", employee.id)));
        }
        let email_key = employee.employment.official_email.to_lowercase();
        if self.employee_emails.contains_key(email_key.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!(
                "official email already registered: {}",
                employee.employment.official_email
            )));
        }
        put_json(&self.employees, employee.id.as_str().as_bytes(), employee)?;
        self.employee_emails
            .insert(email_key.as_bytes(), employee.id.as_str().as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let previous: Employee = get_json(&self.employees, employee.id.as_str().as_bytes())?
            .ok_or_else(|| StoreError::Missing(format!("employee {}", employee.id)))?;

        let previous_email = previous.employment.official_email.to_lowercase();
        let email_key = employee.employment.official_email.to_lowercase();
        if email_key != previous_email {
            if self.employee_emails.contains_key(email_key.as_bytes()).map_err(storage_err)? {
                return Err(StoreError::Conflict(format!(
                    "official email already registered: {}",
                    employee.employment.official_email
                )));
            }
            self.employee_emails.remove(previous_email.as_bytes()).map_err(storage_err)?;
            self.employee_emails
                .insert(email_key.as_bytes(), employee.id.as_str().as_bytes())
                .map_err(storage_err)?;
        }
        put_json(&self.employees, employee.id.as_str().as_bytes(), employee)
    }

    fn employee(&self, id: &EmployeeId) -> StoreResult<Option<Employee>> {
        get_json(&self.employees, id.as_str().as_bytes())
    }

    fn employee_by_official_email(&self, email: &str) -> StoreResult<Option<Employee>> {
        match self.employee_emails.get(email.to_lowercase().as_bytes()).map_err(storage_err)? {
            Some(id_bytes) => get_json(&self.employees, &id_bytes),
            None => Ok(None),
        }
    }

    fn employees(&self) -> StoreResult<Vec<Employee>> {
        // keys are the public ids, so tree order is ascending public-id order
        scan_json(&self.employees)
    }

    fn delete_employee(&self, id: &EmployeeId) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let existing: Employee = get_json(&self.employees, id.as_str().as_bytes())?
            .ok_or_else(|| StoreError::Missing(format!("employee {id}")))?;
        self.employee_emails
            .remove(existing.employment.official_email.to_lowercase().as_bytes())
            .map_err(storage_err)?;
        self.employees.remove(id.as_str().as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn insert_designation(&self, designation: &Designation) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let title_key = designation.title.to_lowercase();
        if self.designation_titles.contains_key(title_key.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("title already exists: {}", designation.title)));
        }
        put_json(&self.designations, designation.id.as_bytes(), designation)?;
        self.designation_titles
            .insert(title_key.as_bytes(), designation.id.as_bytes().to_vec())
            .map_err(storage_err)?;
        Ok(())
    }

    fn update_designation(&self, designation: &Designation) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let previous: Designation = get_json(&self.designations, designation.id.as_bytes())?
            .ok_or_else(|| StoreError::Missing(format!("designation {}", designation.id)))?;

        let previous_title = previous.title.to_lowercase();
        let title_key = designation.title.to_lowercase();
        if title_key != previous_title {
            if self.designation_titles.contains_key(title_key.as_bytes()).map_err(storage_err)? {
                return Err(StoreError::Conflict(format!(
                    "title already exists: {}",
                    designation.title
                )));
            }
            self.designation_titles.remove(previous_title.as_bytes()).map_err(storage_err)?;
            self.designation_titles
                .insert(title_key.as_bytes(), designation.id.as_bytes().to_vec())
                .map_err(storage_err)?;
        }
        put_json(&self.designations, designation.id.as_bytes(), designation)
    }

    fn designation(&self, id: &Uuid) -> StoreResult<Option<Designation>> {
        get_json(&self.designations, id.as_bytes())
    }

    fn designation_by_title(&self, title: &str) -> StoreResult<Option<Designation>> {
        match self.designation_titles.get(title.to_lowercase().as_bytes()).map_err(storage_err)? {
            Some(id_bytes) => get_json(&self.designations, &id_bytes),
            None => Ok(None),
        }
    }

    fn designations(&self) -> StoreResult<Vec<Designation>> {
        let mut all: Vec<Designation> = scan_json(&self.designations)?;
        all.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(all)
    }

    fn delete_designation(&self, id: &Uuid) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let existing: Designation = get_json(&self.designations, id.as_bytes())?
            .ok_or_else(|| StoreError::Missing(format!("designation {id}")))?;
        self.designation_titles
            .remove(existing.title.to_lowercase().as_bytes())
            .map_err(storage_err)?;
        self.designations.remove(id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn upsert_attendance(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let key = Self::attendance_key(&record.employee_id, record.period);
        if let Some(existing_id) = self.attendance_keys.get(&key).map_err(storage_err)? {
            self.attendance.remove(&existing_id).map_err(storage_err)?;
        }
        put_json(&self.attendance, record.id.as_bytes(), record)?;
        self.attendance_keys.insert(key, record.id.as_bytes().to_vec()).map_err(storage_err)?;
        Ok(())
    }

    fn attendance_for(
        &self,
        employee: &EmployeeId,
        period: PayPeriod,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let key = Self::attendance_key(employee, period);
        match self.attendance_keys.get(&key).map_err(storage_err)? {
            Some(id_bytes) => get_json(&self.attendance, &id_bytes),
            None => Ok(None),
        }
    }

    fn attendance_by_id(&self, id: &Uuid) -> StoreResult<Option<AttendanceRecord>> {
        get_json(&self.attendance, id.as_bytes())
    }

    fn attendance_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = scan_json::<AttendanceRecord>(&self.attendance)?
            .into_iter()
            .filter(|r| &r.employee_id == employee)
            .collect();
        records.sort_by_key(|r| r.period);
        Ok(records)
    }

    fn delete_attendance(&self, id: &Uuid) -> StoreResult<()> {
        let _guard = self.insert_guard.lock();
        let existing: AttendanceRecord = get_json(&self.attendance, id.as_bytes())?
            .ok_or_else(|| StoreError::Missing(format!("attendance {id}")))?;
        self.attendance_keys
            .remove(Self::attendance_key(&existing.employee_id, existing.period))
            .map_err(storage_err)?;
        self.attendance.remove(id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn insert_advance(&self, advance: &Advance) -> StoreResult<()> {
        if self.advances.contains_key(advance.id.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("advance already exists: {}", advance.id)));
        }
        put_json(&self.advances, advance.id.as_bytes(), advance)
    }

    fn update_advance(&self, advance: &Advance) -> StoreResult<()> {
        if !self.advances.contains_key(advance.id.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Missing(format!("advance {}", advance.id)));
        }
        put_json(&self.advances, advance.id.as_bytes(), advance)
    }

    fn advance(&self, id: &Uuid) -> StoreResult<Option<Advance>> {
        get_json(&self.advances, id.as_bytes())
    }

    fn advances_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Advance>> {
        let mut all: Vec<Advance> = scan_json::<Advance>(&self.advances)?
            .into_iter()
            .filter(|a| &a.employee_id == employee)
            .collect();
        all.sort_by_key(|a| a.created_at);
        Ok(all)
    }

    fn delete_advance(&self, id: &Uuid) -> StoreResult<()> {
        self.advances
            .remove(id.as_bytes())
            .map_err(storage_err)?
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing(format!("advance {id}")))
    }

    fn insert_loan(&self, loan: &Loan) -> StoreResult<()> {
        if self.loans.contains_key(loan.id.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("loan already exists: {}", loan.id)));
        }
        put_json(&self.loans, loan.id.as_bytes(), loan)
    }

    fn update_loan(&self, loan: &Loan) -> StoreResult<()> {
        if !self.loans.contains_key(loan.id.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Missing(format!("loan {}", loan.id)));
        }
        put_json(&self.loans, loan.id.as_bytes(), loan)
    }

    fn loan(&self, id: &Uuid) -> StoreResult<Option<Loan>> {
        get_json(&self.loans, id.as_bytes())
    }

    fn loans_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<Loan>> {
        let mut all: Vec<Loan> = scan_json::<Loan>(&self.loans)?
            .into_iter()
            .filter(|l| &l.employee_id == employee)
            .collect();
        all.sort_by_key(|l| l.created_at);
        Ok(all)
    }

    fn delete_loan(&self, id: &Uuid) -> StoreResult<()> {
        self.loans
            .remove(id.as_bytes())
            .map_err(storage_err)?
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing(format!("loan {id}")))
    }

    fn insert_leave(&self, leave: &LeaveRequest) -> StoreResult<()> {
        if self.leaves.contains_key(leave.id.as_bytes()).map_err(storage_err)? {
            return Err(StoreError::Conflict(format!("leave already exists: {}", leave.id)));
        }
        put_json(&self.leaves, leave.id.as_bytes(), leave)
    }

    fn update_leave_cas(&self, leave: &LeaveRequest, expected_version: u64) -> StoreResult<()> {
        let current_bytes = self
            .leaves
            .get(leave.id.as_bytes())
            .map_err(storage_err)?
            .ok_or_else(|| StoreError::Missing(format!("leave {}", leave.id)))?;
        let current: LeaveRequest = decode(&current_bytes)?;
        if current.version != expected_version {
            return Err(StoreError::Conflict(format!("leave {} was concurrently modified", leave.id)));
        }
        let swapped = self
            .leaves
            .compare_and_swap(leave.id.as_bytes(), Some(current_bytes), Some(encode(leave)?))
            .map_err(storage_err)?;
        if swapped.is_err() {
            return Err(StoreError::Conflict(format!("leave {} was concurrently modified", leave.id)));
        }
        Ok(())
    }

    fn leave(&self, id: &Uuid) -> StoreResult<Option<LeaveRequest>> {
        get_json(&self.leaves, id.as_bytes())
    }

    fn leaves_for_employee(&self, employee: &EmployeeId) -> StoreResult<Vec<LeaveRequest>> {
        let mut all: Vec<LeaveRequest> = scan_json::<LeaveRequest>(&self.leaves)?
            .into_iter()
            .filter(|l| &l.employee_id == employee)
            .collect();
        all.sort_by_key(|l| l.created_at);
        Ok(all)
    }

    fn insert_payrun(&self, payrun: &PayRun) -> StoreResult<()> {
        // compare-and-swap on the period index is the create-if-absent guard
        let guard = self
            .payrun_periods
            .compare_and_swap(
                period_key(payrun.period).as_bytes(),
                None as Option<&[u8]>,
                Some(payrun.id.as_bytes().to_vec()),
            )
            .map_err(storage_err)?;
        if guard.is_err() {
            return Err(StoreError::Conflict(format!(
                "pay run already generated for {}",
                payrun.period
            )));
        }
        put_json(&self.payruns, payrun.id.as_bytes(), payrun)
    }

    fn payrun(&self, id: &Uuid) -> StoreResult<Option<PayRun>> {
        get_json(&self.payruns, id.as_bytes())
    }

    fn payrun_for_period(&self, period: PayPeriod) -> StoreResult<Option<PayRun>> {
        match self.payrun_periods.get(period_key(period).as_bytes()).map_err(storage_err)? {
            Some(id_bytes) => get_json(&self.payruns, &id_bytes),
            None => Ok(None),
        }
    }

    fn payruns(&self) -> StoreResult<Vec<PayRun>> {
        let mut all: Vec<PayRun> = scan_json(&self.payruns)?;
        all.sort_by_key(|p| p.period);
        Ok(all)
    }

    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        put_json(&self.audit, &Self::audit_key(entry), entry)
    }

    fn audit_entries(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        let limit = query.limit.unwrap_or(AUDIT_DEFAULT_LIMIT).min(AUDIT_MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);
        let mut matched = Vec::new();
        // reverse scan: keys are time-ordered, so newest come first
        for item in self.audit.iter().rev() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: AuditEntry = decode(&bytes)?;
            if query.matches(&entry) {
                matched.push(entry);
            }
        }
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::employee::tests_support::sample_employee;
    use crate::types::{Month, Role};
    use chrono::Utc;

    fn open_temp() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SledStore::open(dir.path().join("hrms-db")).expect("open sled");
        (dir, store)
    }

    #[test]
    fn test_round_trips_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hrms-db");

        let employee = sample_employee("sled@acme.test");
        {
            let store = SledStore::open(&path).unwrap();
            store.insert_employee(&employee).unwrap();
        }

        let store = SledStore::open(&path).unwrap();
        let loaded = store.employee(&employee.id).unwrap().unwrap();
        assert_eq!(loaded, employee);
        assert_eq!(
            store.employee_by_official_email("SLED@acme.test").unwrap().unwrap().id,
            employee.id
        );
    }

    #[test]
    fn test_user_uniqueness() {
        let (_dir, store) = open_temp();
        let user = User::new(
            "asha".into(),
            "asha@acme.test".into(),
            "hash".into(),
            vec![Role::User],
            Utc::now(),
        )
        .unwrap();
        store.insert_user(&user).unwrap();
        assert!(matches!(store.insert_user(&user), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_payrun_period_guard() {
        let (_dir, store) = open_temp();
        let period = PayPeriod::new(Month::February, 2025).unwrap();
        let run = PayRun::new(period, "hr".into(), vec![], Utc::now());
        store.insert_payrun(&run).unwrap();
        let second = PayRun::new(period, "hr".into(), vec![], Utc::now());
        assert!(matches!(store.insert_payrun(&second), Err(StoreError::Conflict(_))));
        assert_eq!(store.payrun_for_period(period).unwrap().unwrap().id, run.id);
    }

    #[test]
    fn test_leave_cas() {
        use crate::domain::leave::{LeaveRequest, LeaveType};
        use chrono::{NaiveDate, TimeZone};

        let (_dir, store) = open_temp();
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let leave = LeaveRequest::new(
            EmployeeId::generate(),
            LeaveType::Sick,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            "recovering from minor surgery".into(),
            None,
            "Engineering".into(),
            created,
        )
        .unwrap();
        store.insert_leave(&leave).unwrap();

        let mut updated = leave.clone();
        updated.manager_approve("mgr".into(), "rest well".into(), created).unwrap();
        store.update_leave_cas(&updated, 1).unwrap();

        let mut stale = leave.clone();
        stale.manager_approve("mgr-2".into(), "rest well".into(), created).unwrap();
        assert!(matches!(store.update_leave_cas(&stale, 1), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_audit_scan_newest_first() {
        use crate::domain::AuditEntry;
        use crate::types::AuditAction;

        let (_dir, store) = open_temp();
        let base = Utc::now();
        for i in 0..3 {
            let entry = AuditEntry::new(
                "admin",
                AuditAction::Create,
                "employee",
                format!("{i}"),
                serde_json::json!({}),
                "10.0.0.1",
                None,
                None,
                base + chrono::Duration::seconds(i),
            );
            store.append_audit(&entry).unwrap();
        }
        let entries = store.audit_entries(&AuditQuery::default()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].entity_id, "2");
        assert_eq!(entries[2].entity_id, "0");
    }
}
