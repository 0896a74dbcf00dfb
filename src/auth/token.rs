use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

use crate::errors::{HrError, Result};
use crate::types::Role;

type HmacSha256 = Hmac<Sha256>;

/// short-lived bearer vs the longer refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// signed token claims: identity, role set and validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// username
    pub sub: String,
    pub roles: Vec<Role>,
    /// issued-at, unix seconds
    pub iat: i64,
    /// expiry, unix seconds
    pub exp: i64,
    pub kind: TokenKind,
    /// key id, reserved for rotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// HMAC-SHA256 signed-token issuer and verifier
///
/// wire form is `<payload-hex>.<mac-hex>` over the claims JSON; any
/// mismatch, malformation or expiry verifies as Unauthenticated
#[derive(Clone)]
pub struct TokenService {
    key: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(key: Vec<u8>, access_ttl: Duration, refresh_ttl: Duration) -> Result<Self> {
        if key.len() < 32 {
            return Err(HrError::invalid_input(
                "signingKey",
                "signing key must be at least 32 bytes",
            ));
        }
        Ok(TokenService { key, access_ttl, refresh_ttl })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// issue a signed token for `username` with the given role set
    pub fn issue(
        &self,
        username: &str,
        roles: &[Role],
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            sub: username.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_for(kind).as_secs() as i64,
            kind,
            kid: None,
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| HrError::internal(e.to_string()))?;
        let tag = self.mac(&payload);
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(tag)))
    }

    /// verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let unauthenticated = |reason: &str| HrError::Unauthenticated(reason.to_string());

        let (payload_hex, tag_hex) =
            token.split_once('.').ok_or_else(|| unauthenticated("malformed token"))?;
        let payload = hex::decode(payload_hex).map_err(|_| unauthenticated("malformed token"))?;
        let tag = hex::decode(tag_hex).map_err(|_| unauthenticated("malformed token"))?;

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| unauthenticated("invalid token signature"))?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| unauthenticated("malformed claims"))?;
        if claims.exp <= now.timestamp() {
            return Err(unauthenticated("token expired"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn service() -> TokenService {
        TokenService::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::from_secs(24 * 60 * 60),
            Duration::from_secs(7 * 24 * 60 * 60),
        )
        .unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let svc = service();
        let token = svc.issue("admin", &[Role::Admin], TokenKind::Access, at(9)).unwrap();
        let claims = svc.verify(&token, at(10)).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.roles, vec![Role::Admin]);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_access_token_expires_after_ttl() {
        let svc = service();
        let token = svc.issue("admin", &[Role::Admin], TokenKind::Access, at(9)).unwrap();

        // 23 hours later: fine; 25 hours later: expired
        assert!(svc.verify(&token, at(9) + chrono::Duration::hours(23)).is_ok());
        let err = svc.verify(&token, at(9) + chrono::Duration::hours(25)).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_refresh_token_has_longer_ttl() {
        let svc = service();
        let token = svc.issue("admin", &[Role::Admin], TokenKind::Refresh, at(9)).unwrap();
        assert!(svc.verify(&token, at(9) + chrono::Duration::days(6)).is_ok());
        assert!(svc.verify(&token, at(9) + chrono::Duration::days(8)).is_err());
    }

    #[test]
    fn test_forged_and_malformed_tokens_rejected() {
        let svc = service();
        let token = svc.issue("admin", &[Role::Admin], TokenKind::Access, at(9)).unwrap();

        // flip a nibble in the signature
        let mut forged = token.clone();
        let last = forged.pop().unwrap();
        forged.push(if last == '0' { '1' } else { '0' });
        assert!(svc.verify(&forged, at(10)).is_err());

        // tamper with the payload, keep the signature
        let (payload_hex, tag_hex) = token.split_once('.').unwrap();
        let mut payload = hex::decode(payload_hex).unwrap();
        let json = String::from_utf8(payload.clone()).unwrap().replace("admin", "haxor");
        payload = json.into_bytes();
        let tampered = format!("{}.{}", hex::encode(payload), tag_hex);
        assert!(svc.verify(&tampered, at(10)).is_err());

        assert!(svc.verify("not-a-token", at(10)).is_err());
        assert!(svc.verify("aa.bb", at(10)).is_err());
    }

    #[test]
    fn test_key_must_differ() {
        let svc = service();
        let other = TokenService::new(
            b"ffffffffffffffffffffffffffffffff".to_vec(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap();
        let token = svc.issue("admin", &[Role::Admin], TokenKind::Access, at(9)).unwrap();
        assert!(other.verify(&token, at(10)).is_err());
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(TokenService::new(
            b"too-short".to_vec(),
            Duration::from_secs(60),
            Duration::from_secs(60)
        )
        .is_err());
    }
}
