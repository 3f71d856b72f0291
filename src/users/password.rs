use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Params {
    /// Checks the cost against the limits argon2 accepts.
    pub fn validate(self) -> anyhow::Result<()> {
        self.hasher().map(|_| ())
    }

    fn hasher(self) -> anyhow::Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash with a fresh random salt. The result is a PHC string carrying its own parameters.
pub fn hash_password(plain: &str, params: Argon2Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = params
        .hasher()?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Verification takes the parameters embedded in `hash`.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
pub(crate) fn fast_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password, fast_params()).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password, fast_params()).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("longenough1", fast_params()).unwrap();
        let b = hash_password("longenough1", fast_params()).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn out_of_range_params_are_refused() {
        assert!(Argon2Params::default().validate().is_ok());
        assert!(fast_params().validate().is_ok());
        let zero_memory = Argon2Params {
            memory_kib: 0,
            ..Argon2Params::default()
        };
        let zero_lanes = Argon2Params {
            parallelism: 0,
            ..Argon2Params::default()
        };
        let zero_passes = Argon2Params {
            iterations: 0,
            ..Argon2Params::default()
        };
        for params in [zero_memory, zero_lanes, zero_passes] {
            assert!(params.validate().is_err(), "{params:?}");
        }
    }

    #[test]
    fn default_params_are_accepted() {
        let hash = hash_password("longenough1", Argon2Params::default()).unwrap();
        assert!(hash.contains("m=19456,t=2,p=1"));
    }
}
