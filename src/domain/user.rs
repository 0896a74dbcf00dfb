use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{HrError, Result};
use crate::types::Role;

/// service account; password is stored only as a salted hash
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_username(&username)?;
        validate_email(&email)?;
        if roles.is_empty() {
            return Err(HrError::invalid_input("roles", "an enabled user needs at least one role"));
        }
        Ok(User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            enabled: true,
            roles,
            last_login: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// soft-disable; users are never hard-deleted while audit references exist
    pub fn disable(&mut self, now: DateTime<Utc>) {
        self.enabled = false;
        self.updated_at = now;
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login = Some(now);
        self.updated_at = now;
    }
}

// the hash must never reach logs through Debug output
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("roles", &self.roles)
            .field("last_login", &self.last_login)
            .finish()
    }
}

fn validate_username(username: &str) -> Result<()> {
    let ok = (3..=64).contains(&username.len())
        && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !ok {
        return Err(HrError::invalid_input(
            "username",
            "username must be 3-64 characters of letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let well_formed = email.len() <= 254
        && email.split_once('@').map(|(local, domain)| {
            !local.is_empty() && !domain.is_empty() && domain.contains('.')
        }) == Some(true);
    if !well_formed {
        return Err(HrError::invalid_input("email", "not a valid email address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_user_construction() {
        let user = User::new(
            "priya.n".into(),
            "priya@example.com".into(),
            "pbkdf2$10$aa$bb".into(),
            vec![Role::Hr],
            now(),
        )
        .unwrap();
        assert!(user.enabled);
        assert!(user.has_role(Role::Hr));
        assert!(!user.has_role(Role::Admin));
        assert!(user.last_login.is_none());
    }

    #[test]
    fn test_rejects_bad_username_and_email() {
        assert!(User::new("ab".into(), "a@b.co".into(), "h".into(), vec![Role::User], now()).is_err());
        assert!(User::new(
            "has spaces".into(),
            "a@b.co".into(),
            "h".into(),
            vec![Role::User],
            now()
        )
        .is_err());
        assert!(User::new("okname".into(), "nodomain".into(), "h".into(), vec![Role::User], now())
            .is_err());
        assert!(User::new("okname".into(), "a@tld".into(), "h".into(), vec![Role::User], now())
            .is_err());
    }

    #[test]
    fn test_requires_a_role() {
        assert!(User::new("okname".into(), "a@b.co".into(), "h".into(), vec![], now()).is_err());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let user = User::new(
            "okname".into(),
            "a@b.co".into(),
            "pbkdf2$10$secret$secret".into(),
            vec![Role::User],
            now(),
        )
        .unwrap();
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
