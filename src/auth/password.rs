use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::{HrError, Result};

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SCHEME: &str = "pbkdf2";
pub const MIN_COST: u32 = 10;

/// cost-parameterized password hashing: PBKDF2-HMAC-SHA256 with 2^cost
/// rounds, encoded `pbkdf2$<cost>$<salt-hex>$<hash-hex>`
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        if cost < MIN_COST {
            return Err(HrError::invalid_input(
                "passwordHashCost",
                format!("cost must be at least {MIN_COST}"),
            ));
        }
        // 2^31 rounds would never return
        if cost > 24 {
            return Err(HrError::invalid_input("passwordHashCost", "cost must be at most 24"));
        }
        Ok(PasswordHasher { cost })
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut derived = [0u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, 1 << self.cost, &mut derived);

        format!("{SCHEME}${}${}${}", self.cost, hex::encode(salt), hex::encode(derived))
    }

    /// constant-time verification against an encoded hash
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool> {
        let mut parts = encoded.split('$');
        let (scheme, cost, salt_hex, hash_hex) =
            match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(scheme), Some(cost), Some(salt), Some(hash), None) => {
                    (scheme, cost, salt, hash)
                }
                _ => return Err(HrError::internal("malformed password hash")),
            };
        if scheme != SCHEME {
            return Err(HrError::internal(format!("unknown password hash scheme: {scheme}")));
        }
        let cost: u32 =
            cost.parse().map_err(|_| HrError::internal("malformed password hash cost"))?;
        if !(MIN_COST..=24).contains(&cost) {
            return Err(HrError::internal("password hash cost out of range"));
        }
        let salt = hex::decode(salt_hex).map_err(|_| HrError::internal("malformed salt"))?;
        let expected = hex::decode(hash_hex).map_err(|_| HrError::internal("malformed hash"))?;

        let mut derived = vec![0u8; expected.len().max(1)];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, 1 << cost, &mut derived);

        Ok(bool::from(derived.ct_eq(&expected)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(10).unwrap()
    }

    #[test]
    fn test_hash_round_trip() {
        let h = hasher();
        let encoded = h.hash("correct horse battery staple");
        assert!(encoded.starts_with("pbkdf2$10$"));
        assert!(h.verify("correct horse battery staple", &encoded).unwrap());
        assert!(!h.verify("correct horse battery stable", &encoded).unwrap());
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let h = hasher();
        let a = h.hash("same password");
        let b = h.hash("same password");
        assert_ne!(a, b);
        assert!(h.verify("same password", &a).unwrap());
        assert!(h.verify("same password", &b).unwrap());
    }

    #[test]
    fn test_cost_floor_enforced() {
        assert!(PasswordHasher::new(9).is_err());
        assert!(PasswordHasher::new(10).is_ok());
        assert!(PasswordHasher::new(25).is_err());
    }

    #[test]
    fn test_verify_honors_stored_cost() {
        // a hash created at cost 11 verifies under a hasher configured at 10
        let encoded = PasswordHasher::new(11).unwrap().hash("pw");
        assert!(hasher().verify("pw", &encoded).unwrap());
    }

    #[test]
    fn test_malformed_hashes_are_internal_errors() {
        let h = hasher();
        assert!(h.verify("pw", "not-a-hash").is_err());
        assert!(h.verify("pw", "bcrypt$10$aa$bb").is_err());
        assert!(h.verify("pw", "pbkdf2$2$aa$bb").is_err());
        assert!(h.verify("pw", "pbkdf2$10$zz$bb").is_err());
    }
}
