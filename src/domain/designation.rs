use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};

/// catalog entry for a job title; titles are unique across the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Designation {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    /// 1 is the most senior level
    pub level: u8,
    /// title this designation reports to, resolved lazily
    #[serde(default)]
    pub reports_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Designation {
    pub fn new(
        title: String,
        department: String,
        level: u8,
        reports_to: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let designation = Designation {
            id: Uuid::new_v4(),
            title,
            department,
            level,
            reports_to,
            created_at: now,
            updated_at: now,
        };
        designation.validate()?;
        Ok(designation)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(HrError::invalid_input("title", "title is required"));
        }
        if self.department.trim().is_empty() {
            return Err(HrError::invalid_input("department", "department is required"));
        }
        if self.level == 0 {
            return Err(HrError::invalid_input("level", "level starts at 1"));
        }
        if self.reports_to.as_deref() == Some(self.title.as_str()) {
            return Err(HrError::invalid_input("reportsTo", "a designation cannot report to itself"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_designation_validation() {
        let now = Utc::now();
        assert!(Designation::new("Engineer".into(), "Engineering".into(), 4, None, now).is_ok());
        assert!(Designation::new("".into(), "Engineering".into(), 4, None, now).is_err());
        assert!(Designation::new("Engineer".into(), "Engineering".into(), 0, None, now).is_err());
        assert!(Designation::new(
            "Engineer".into(),
            "Engineering".into(),
            4,
            Some("Engineer".into()),
            now
        )
        .is_err());
    }
}
