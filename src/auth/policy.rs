use axum::http::Method;

use crate::types::Role;

/// required-role predicate attached to every route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    /// no authentication
    Public,
    /// any authenticated user
    Authenticated,
    /// any of the listed roles
    AnyOf(&'static [Role]),
    /// the named role or any more senior one
    AtLeast(Role),
}

impl RequiredRole {
    /// evaluate against the authenticated role set (None = anonymous)
    pub fn permits(&self, roles: Option<&[Role]>) -> bool {
        match self {
            RequiredRole::Public => true,
            RequiredRole::Authenticated => roles.is_some(),
            RequiredRole::AnyOf(allowed) => roles
                .map(|rs| rs.iter().any(|r| allowed.contains(r)))
                .unwrap_or(false),
            RequiredRole::AtLeast(minimum) => roles
                .map(|rs| rs.iter().any(|r| r.rank() >= minimum.rank()))
                .unwrap_or(false),
        }
    }
}

struct Rule {
    method: Method,
    pattern: &'static str,
    required: RequiredRole,
}

/// deny-by-default route gate: a request matching no rule is refused
///
/// patterns are path-segment matches where `:param` matches exactly one
/// segment; the only open routes are the auth endpoints and health probes
pub struct RoutePolicy {
    rules: Vec<Rule>,
}

const HR_OR_ADMIN: RequiredRole = RequiredRole::AnyOf(&[Role::Hr, Role::Admin]);
const ADMIN_ONLY: RequiredRole = RequiredRole::AnyOf(&[Role::Admin]);
const MANAGER_OR_ADMIN: RequiredRole = RequiredRole::AnyOf(&[Role::Manager, Role::Admin]);

impl RoutePolicy {
    pub fn standard() -> Self {
        use RequiredRole::{Authenticated, Public};

        let mut rules = Vec::new();
        let mut rule = |method: Method, pattern: &'static str, required: RequiredRole| {
            rules.push(Rule { method, pattern, required });
        };

        // auth
        rule(Method::POST, "/api/v1/auth/login", Public);
        rule(Method::POST, "/api/v1/auth/register", Public);
        rule(Method::POST, "/api/v1/auth/refresh", Public);
        rule(Method::GET, "/api/v1/auth/me", Authenticated);
        rule(Method::POST, "/api/v1/auth/logout", Authenticated);

        // employees: reads for any user, writes for admins
        rule(Method::GET, "/api/v1/employees", RequiredRole::AtLeast(Role::User));
        rule(Method::GET, "/api/v1/employees/:id", RequiredRole::AtLeast(Role::User));
        rule(Method::POST, "/api/v1/employees", ADMIN_ONLY);
        rule(Method::PUT, "/api/v1/employees/:id", ADMIN_ONLY);
        rule(Method::DELETE, "/api/v1/employees/:id", ADMIN_ONLY);

        // designations: same split
        rule(Method::GET, "/api/v1/designations", RequiredRole::AtLeast(Role::User));
        rule(Method::GET, "/api/v1/designations/:id", RequiredRole::AtLeast(Role::User));
        rule(Method::POST, "/api/v1/designations", ADMIN_ONLY);
        rule(Method::PUT, "/api/v1/designations/:id", ADMIN_ONLY);
        rule(Method::DELETE, "/api/v1/designations/:id", ADMIN_ONLY);

        // attendance, advances, loans: HR or admin
        for (base, by_id) in [
            ("/api/v1/attendance", "/api/v1/attendance/:id"),
            ("/api/v1/advances", "/api/v1/advances/:id"),
            ("/api/v1/loans", "/api/v1/loans/:id"),
        ] {
            rule(Method::GET, base, HR_OR_ADMIN);
            rule(Method::POST, base, HR_OR_ADMIN);
            rule(Method::GET, by_id, HR_OR_ADMIN);
            rule(Method::PUT, by_id, HR_OR_ADMIN);
            rule(Method::DELETE, by_id, HR_OR_ADMIN);
        }
        rule(Method::PUT, "/api/v1/loans/:id/cancel", ADMIN_ONLY);

        // leaves: ownership is enforced in the handlers on top of these
        rule(Method::POST, "/api/v1/leaves", Authenticated);
        rule(Method::GET, "/api/v1/leaves/:id", Authenticated);
        rule(Method::GET, "/api/v1/leaves/employee/:eid", Authenticated);
        rule(Method::PUT, "/api/v1/leaves/:id/manager-approve", RequiredRole::AnyOf(&[Role::Manager]));
        rule(Method::PUT, "/api/v1/leaves/:id/admin-approve", ADMIN_ONLY);
        rule(Method::PUT, "/api/v1/leaves/:id/reject", MANAGER_OR_ADMIN);
        rule(Method::PUT, "/api/v1/leaves/:id/cancel", Authenticated);

        // payroll
        rule(Method::POST, "/api/v1/payruns/generate", HR_OR_ADMIN);
        rule(Method::GET, "/api/v1/payruns", HR_OR_ADMIN);
        rule(Method::GET, "/api/v1/payruns/:id", HR_OR_ADMIN);
        rule(Method::GET, "/api/v1/payruns/:id/export", HR_OR_ADMIN);

        // audit browsing
        rule(Method::GET, "/api/v1/admin/audit-logs", ADMIN_ONLY);

        // probes
        rule(Method::GET, "/health", Public);
        rule(Method::GET, "/health/ready", Public);
        rule(Method::GET, "/health/live", Public);

        RoutePolicy { rules }
    }

    /// predicate for a request, None when no rule matches (deny)
    pub fn required_for(&self, method: &Method, path: &str) -> Option<RequiredRole> {
        self.rules
            .iter()
            .find(|rule| &rule.method == method && pattern_matches(rule.pattern, path))
            .map(|rule| rule.required)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut expected = pattern.split('/').filter(|s| !s.is_empty());
    let mut actual = path.split('/').filter(|s| !s.is_empty());
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(e), Some(a)) => {
                if !e.starts_with(':') && e != a {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RoutePolicy {
        RoutePolicy::standard()
    }

    #[test]
    fn test_open_routes() {
        let p = policy();
        assert_eq!(p.required_for(&Method::POST, "/api/v1/auth/login"), Some(RequiredRole::Public));
        assert_eq!(p.required_for(&Method::GET, "/health/live"), Some(RequiredRole::Public));
    }

    #[test]
    fn test_deny_by_default() {
        let p = policy();
        assert_eq!(p.required_for(&Method::GET, "/api/v1/secrets"), None);
        assert_eq!(p.required_for(&Method::PATCH, "/api/v1/employees/EMP12345678"), None);
        // method matters
        assert_eq!(p.required_for(&Method::DELETE, "/api/v1/auth/login"), None);
    }

    #[test]
    fn test_parameterized_paths() {
        let p = policy();
        assert_eq!(
            p.required_for(&Method::PUT, "/api/v1/leaves/3f2c0a4e/manager-approve"),
            Some(RequiredRole::AnyOf(&[Role::Manager]))
        );
        assert_eq!(
            p.required_for(&Method::GET, "/api/v1/employees/EMP12345678"),
            Some(RequiredRole::AtLeast(Role::User))
        );
        // an id segment cannot swallow two segments
        assert_eq!(p.required_for(&Method::GET, "/api/v1/employees/a/b"), None);
    }

    #[test]
    fn test_role_predicates() {
        assert!(RequiredRole::Public.permits(None));
        assert!(!RequiredRole::Authenticated.permits(None));
        assert!(RequiredRole::Authenticated.permits(Some(&[Role::User])));

        let hr_or_admin = RequiredRole::AnyOf(&[Role::Hr, Role::Admin]);
        assert!(hr_or_admin.permits(Some(&[Role::Hr])));
        assert!(hr_or_admin.permits(Some(&[Role::Admin, Role::User])));
        assert!(!hr_or_admin.permits(Some(&[Role::Manager])));
        assert!(!hr_or_admin.permits(None));

        let at_least_user = RequiredRole::AtLeast(Role::User);
        assert!(at_least_user.permits(Some(&[Role::Employee])));
        assert!(at_least_user.permits(Some(&[Role::Admin])));
    }

    #[test]
    fn test_write_routes_are_admin_gated() {
        let p = policy();
        let required = p.required_for(&Method::POST, "/api/v1/employees").unwrap();
        assert!(required.permits(Some(&[Role::Admin])));
        assert!(!required.permits(Some(&[Role::Hr])));
        assert!(!required.permits(Some(&[Role::User])));
    }
}
