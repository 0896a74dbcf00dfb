use std::time::Instant;

use dashmap::DashMap;

use crate::config::{RateLimitRule, RateLimitSettings};

/// route classes with independent budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Login,
    Register,
    /// other auth endpoints (refresh, me, logout)
    Auth,
    General,
}

impl RouteClass {
    /// classify a request path
    pub fn for_path(path: &str) -> RouteClass {
        match path {
            "/api/v1/auth/login" => RouteClass::Login,
            "/api/v1/auth/register" => RouteClass::Register,
            p if p.starts_with("/api/v1/auth/") => RouteClass::Auth,
            _ => RouteClass::General,
        }
    }
}

struct Bucket {
    window_start: Instant,
    remaining: u32,
}

/// token buckets per (remote ip, route class), refilled at window
/// boundaries; the table is lock-striped by key
///
/// buckets live in-process, so multi-replica deployments enforce the
/// limit per replica
pub struct RateLimiter {
    settings: RateLimitSettings,
    buckets: DashMap<(String, RouteClass), Bucket>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        RateLimiter { settings, buckets: DashMap::new() }
    }

    fn rule_for(&self, class: RouteClass) -> RateLimitRule {
        match class {
            RouteClass::Login => self.settings.login,
            RouteClass::Register => self.settings.register,
            RouteClass::Auth => self.settings.auth,
            RouteClass::General => self.settings.general,
        }
    }

    /// admit or refuse a request; Err carries the Retry-After seconds
    pub fn check(&self, ip: &str, class: RouteClass) -> Result<(), u64> {
        self.check_at(ip, class, Instant::now())
    }

    fn check_at(&self, ip: &str, class: RouteClass, now: Instant) -> Result<(), u64> {
        let rule = self.rule_for(class);
        let mut bucket = self
            .buckets
            .entry((ip.to_string(), class))
            .or_insert_with(|| Bucket { window_start: now, remaining: rule.limit });

        if now.duration_since(bucket.window_start) >= rule.window {
            bucket.window_start = now;
            bucket.remaining = rule.limit;
        }

        if bucket.remaining == 0 {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after = rule.window.saturating_sub(elapsed).as_secs_f64().ceil() as u64;
            return Err(retry_after.max(1));
        }

        bucket.remaining -= 1;
        Ok(())
    }
}
