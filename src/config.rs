use std::{fmt, time::Duration};

use anyhow::{bail, Context};

use crate::users::password::Argon2Params;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Without a database URL the service runs on the in-process store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub argon2: Argon2Params,
}

impl AppConfig {
    /// Missing signing secret or token lifetime is fatal at startup.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let expires_in = std::env::var("JWT_EXPIRES_IN").context("JWT_EXPIRES_IN must be set")?;
        let ttl = parse_duration(&expires_in)
            .with_context(|| format!("JWT_EXPIRES_IN has an invalid value: {expires_in:?}"))?;

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "warden".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "warden-users".into()),
            ttl,
        };
        let defaults = Argon2Params::default();
        let argon2 = Argon2Params {
            memory_kib: env_u32("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_u32("ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: env_u32("ARGON2_PARALLELISM", defaults.parallelism)?,
        };
        argon2
            .validate()
            .context("ARGON2_MEMORY_KIB, ARGON2_ITERATIONS or ARGON2_PARALLELISM is out of range")?;

        Ok(Self {
            database_url,
            jwt,
            argon2,
        })
    }
}

fn env_u32(name: &str, default: u32) -> anyhow::Result<u32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a positive integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

const MAX_DURATION_SECS: u64 = 10 * 365 * 86_400;

/// Parses `90d`, `12h`, `30m`, `45s` or a bare number of seconds, up to ten years.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().context("expected a number")?;
    let unit_secs: u64 = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        other => bail!("unknown duration unit {other:?}"),
    };
    let secs = match value.checked_mul(unit_secs) {
        Some(secs) if secs <= MAX_DURATION_SECS => secs,
        _ => bail!("duration must not exceed ten years"),
    };
    if secs == 0 {
        bail!("duration must be positive");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("90d").unwrap(), Duration::from_secs(90 * 86_400));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(12 * 3_600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3_600));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10y").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("100000000d").is_err());
        assert!(parse_duration("18446744073709551615d").is_err());
    }

    #[test]
    fn accepts_up_to_ten_years() {
        assert_eq!(parse_duration("3650d").unwrap(), Duration::from_secs(MAX_DURATION_SECS));
        assert!(parse_duration("3651d").is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        let cfg = JwtConfig {
            secret: "super-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl: Duration::from_secs(60),
        };
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }
}
