use std::net::SocketAddr;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{HrError, Result};
use crate::money::{Money, Rate};

/// statutory payroll profile, injected into the engines at boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatutoryProfile {
    /// PF wage ceiling: contributions are computed on min(basic, cap)
    pub pf_base_cap: Money,
    /// employee and employer PF rate
    pub pf_rate: Rate,
    /// ESI employee share of gross
    pub esi_employee_rate: Rate,
    /// ESI employer share of gross
    pub esi_employer_rate: Rate,
    /// professional tax brackets over monthly gross, ascending by threshold
    pub professional_tax: Vec<TaxBracket>,
    /// working days assumed when no attendance record exists
    pub default_working_days: u8,
    /// fixed allowance defaults, applied up to the available residual
    pub default_conveyance: Money,
    pub default_telephone: Money,
    pub default_medical_allowance: Money,
    /// HRA percentage defaults by annual CTC
    pub hra_default_low: Rate,
    pub hra_default_high: Rate,
    pub hra_ctc_threshold: Money,
}

/// one professional-tax bracket: gross up to `gross_up_to` pays `amount`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxBracket {
    /// inclusive upper bound; None is the open top bracket
    pub gross_up_to: Option<Money>,
    pub amount: Money,
}

impl Default for StatutoryProfile {
    fn default() -> Self {
        StatutoryProfile {
            pf_base_cap: Money::from_major(15_000),
            pf_rate: Rate::from_percentage_u32(12),
            esi_employee_rate: Rate::from_percentage(dec!(0.75)),
            esi_employer_rate: Rate::from_percentage(dec!(3.25)),
            professional_tax: vec![
                TaxBracket { gross_up_to: Some(Money::from_major(10_000)), amount: Money::ZERO },
                TaxBracket {
                    gross_up_to: Some(Money::from_major(15_000)),
                    amount: Money::from_major(150),
                },
                TaxBracket { gross_up_to: None, amount: Money::from_major(200) },
            ],
            default_working_days: 26,
            default_conveyance: Money::from_major(1_600),
            default_telephone: Money::from_major(500),
            default_medical_allowance: Money::from_major(1_250),
            hra_default_low: Rate::from_percentage_u32(10),
            hra_default_high: Rate::from_percentage_u32(40),
            hra_ctc_threshold: Money::from_major(1_200_000),
        }
    }
}

impl StatutoryProfile {
    /// professional tax owed for a monthly gross
    pub fn professional_tax_for(&self, gross: Money) -> Money {
        for bracket in &self.professional_tax {
            match bracket.gross_up_to {
                Some(limit) if gross <= limit => return bracket.amount,
                Some(_) => continue,
                None => return bracket.amount,
            }
        }
        Money::ZERO
    }

    /// default HRA percentage for an annual CTC
    pub fn default_hra_percent(&self, ctc_annual: Money) -> Rate {
        if ctc_annual < self.hra_ctc_threshold {
            self.hra_default_low
        } else {
            self.hra_default_high
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pf_base_cap.is_negative() {
            return Err(HrError::invalid_input("pfBaseCap", "pf base cap must not be negative"));
        }
        if self.default_working_days == 0 || self.default_working_days > 31 {
            return Err(HrError::invalid_input(
                "defaultWorkingDays",
                "default working days must be between 1 and 31",
            ));
        }
        if self.professional_tax.is_empty()
            || self.professional_tax.last().map(|b| b.gross_up_to.is_some()).unwrap_or(true)
        {
            return Err(HrError::invalid_input(
                "professionalTax",
                "professional tax table must end with an open top bracket",
            ));
        }
        Ok(())
    }
}

/// per-route-class rate limit: `limit` requests per `window`
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
}

/// rate limits per route class; buckets are per replica
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub login: RateLimitRule,
    pub register: RateLimitRule,
    pub auth: RateLimitRule,
    pub general: RateLimitRule,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            login: RateLimitRule { limit: 5, window: Duration::from_secs(60) },
            register: RateLimitRule { limit: 3, window: Duration::from_secs(300) },
            auth: RateLimitRule { limit: 20, window: Duration::from_secs(60) },
            general: RateLimitRule { limit: 100, window: Duration::from_secs(60) },
        }
    }
}

const MIN_SIGNING_KEY_BYTES: usize = 32;
const MIN_PASSWORD_HASH_COST: u32 = 10;

/// full service configuration, read-only after bootstrap
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `memory://` or `sled://<path>`
    pub store_url: String,
    pub signing_key: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub password_hash_cost: u32,
    pub request_deadline: Duration,
    pub audit_queue_capacity: usize,
    pub rate_limits: RateLimitSettings,
    pub statutory: StatutoryProfile,
    /// password for the seeded admin account
    pub bootstrap_admin_password: String,
}

impl AppConfig {
    /// load from `HRMS_*` environment variables, validating everything
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("HRMS_BIND_ADDR", "0.0.0.0:8080")
            .parse::<SocketAddr>()
            .map_err(|e| HrError::invalid_input("HRMS_BIND_ADDR", e.to_string()))?;

        let store_url = env_or("HRMS_STORE_URL", "memory://");

        let signing_key = std::env::var("HRMS_SIGNING_KEY")
            .map_err(|_| HrError::invalid_input("HRMS_SIGNING_KEY", "signing key is required"))?
            .into_bytes();

        let config = AppConfig {
            bind_addr,
            store_url,
            signing_key,
            access_ttl: Duration::from_secs(env_parse("HRMS_ACCESS_TTL_SECS", 24 * 60 * 60)?),
            refresh_ttl: Duration::from_secs(env_parse("HRMS_REFRESH_TTL_SECS", 7 * 24 * 60 * 60)?),
            password_hash_cost: env_parse("HRMS_PASSWORD_HASH_COST", 12)?,
            request_deadline: Duration::from_secs(env_parse("HRMS_REQUEST_DEADLINE_SECS", 30)?),
            audit_queue_capacity: env_parse("HRMS_AUDIT_QUEUE_CAPACITY", 1_024)?,
            rate_limits: RateLimitSettings::default(),
            statutory: statutory_from_env()?,
            bootstrap_admin_password: env_or("HRMS_BOOTSTRAP_ADMIN_PASSWORD", "admin123"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(HrError::invalid_input(
                "HRMS_SIGNING_KEY",
                format!("signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes"),
            ));
        }
        if self.password_hash_cost < MIN_PASSWORD_HASH_COST {
            return Err(HrError::invalid_input(
                "HRMS_PASSWORD_HASH_COST",
                format!("password hash cost must be at least {MIN_PASSWORD_HASH_COST}"),
            ));
        }
        if self.access_ttl.is_zero() || self.refresh_ttl.is_zero() {
            return Err(HrError::invalid_input("HRMS_ACCESS_TTL_SECS", "token ttls must be positive"));
        }
        if self.request_deadline.is_zero() {
            return Err(HrError::invalid_input(
                "HRMS_REQUEST_DEADLINE_SECS",
                "request deadline must be positive",
            ));
        }
        if self.audit_queue_capacity == 0 {
            return Err(HrError::invalid_input(
                "HRMS_AUDIT_QUEUE_CAPACITY",
                "audit queue capacity must be positive",
            ));
        }
        self.statutory.validate()
    }

    /// in-memory configuration for tests
    pub fn for_tests() -> Self {
        AppConfig {
            bind_addr: "127.0.0.1:0".parse().expect("loopback addr"),
            store_url: "memory://".to_string(),
            signing_key: b"0123456789abcdef0123456789abcdef".to_vec(),
            access_ttl: Duration::from_secs(24 * 60 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            password_hash_cost: 10,
            request_deadline: Duration::from_secs(30),
            audit_queue_capacity: 64,
            rate_limits: RateLimitSettings::default(),
            statutory: StatutoryProfile::default(),
            bootstrap_admin_password: "admin123".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| HrError::invalid_input(key, format!("cannot parse value: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn statutory_from_env() -> Result<StatutoryProfile> {
    let mut profile = StatutoryProfile::default();
    if let Ok(raw) = std::env::var("HRMS_PF_BASE_CAP") {
        profile.pf_base_cap = Money::from_str_exact(&raw)
            .map_err(|e| HrError::invalid_input("HRMS_PF_BASE_CAP", e.to_string()))?;
    }
    if let Ok(raw) = std::env::var("HRMS_DEFAULT_WORKING_DAYS") {
        profile.default_working_days = raw
            .parse()
            .map_err(|_| HrError::invalid_input("HRMS_DEFAULT_WORKING_DAYS", "not a day count"))?;
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_professional_tax_brackets() {
        let profile = StatutoryProfile::default();
        assert_eq!(profile.professional_tax_for(Money::from_major(8_000)), Money::ZERO);
        assert_eq!(profile.professional_tax_for(Money::from_major(10_000)), Money::ZERO);
        assert_eq!(profile.professional_tax_for(Money::from_major(12_000)), Money::from_major(150));
        assert_eq!(profile.professional_tax_for(Money::from_major(98_200)), Money::from_major(200));
    }

    #[test]
    fn test_default_hra_split() {
        let profile = StatutoryProfile::default();
        assert_eq!(
            profile.default_hra_percent(Money::from_major(1_100_000)),
            Rate::from_percentage_u32(10)
        );
        assert_eq!(
            profile.default_hra_percent(Money::from_major(1_200_000)),
            Rate::from_percentage_u32(40)
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::for_tests();
        assert!(config.validate().is_ok());

        config.signing_key = b"short".to_vec();
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_tests();
        config.password_hash_cost = 9;
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_tests();
        config.statutory.professional_tax.pop();
        assert!(config.validate().is_err());
    }
}
