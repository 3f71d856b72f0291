use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::config::JwtConfig;

/// Why a token was refused. Only for diagnostics; clients see one message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("bad token signature")]
    BadSignature,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and verifies stateless HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.ttl,
        }
    }

    fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let ttl = TimeDuration::try_from(self.ttl).context("token lifetime out of range")?;
        let exp = now
            .checked_add(ttl)
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    /// Returns the subject of a well-formed, correctly signed, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_service(secret: &str, issuer: &str, audience: &str) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: Duration::from_secs(90 * 24 * 60 * 60),
        })
    }

    #[test]
    fn issue_and_verify_returns_subject() {
        let tokens = make_service("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id).expect("sign");
        assert_eq!(tokens.verify(&token).expect("verify"), user_id);
    }

    #[test]
    fn token_for_one_user_never_verifies_as_another() {
        let tokens = make_service("dev-secret", "iss", "aud");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let token = tokens.issue(a).unwrap();
        assert_ne!(tokens.verify(&token).unwrap(), b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = make_service("dev-secret", "iss", "aud");
        let long_ago = OffsetDateTime::now_utc() - TimeDuration::days(91);
        let token = tokens.issue_at(Uuid::new_v4(), long_ago).unwrap();
        assert_eq!(tokens.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn foreign_secret_is_bad_signature() {
        let ours = make_service("our-secret", "iss", "aud");
        let theirs = make_service("their-secret", "iss", "aud");
        let token = theirs.issue(Uuid::new_v4()).unwrap();
        assert_eq!(ours.verify(&token).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn tampered_payload_is_bad_signature() {
        let tokens = make_service("dev-secret", "iss", "aud");
        let victim = tokens.issue(Uuid::new_v4()).unwrap();
        let attacker = tokens.issue(Uuid::new_v4()).unwrap();
        let v: Vec<&str> = victim.split('.').collect();
        let a: Vec<&str> = attacker.split('.').collect();
        let forged = format!("{}.{}.{}", v[0], a[1], v[2]);
        assert_eq!(tokens.verify(&forged).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn oversized_lifetime_fails_instead_of_panicking() {
        let tokens = TokenService::new(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl: Duration::from_secs(100_000_000 * 86_400),
        });
        assert!(tokens.issue(Uuid::new_v4()).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = make_service("dev-secret", "iss", "aud");
        assert_eq!(tokens.verify("not-a-jwt").unwrap_err(), TokenError::Malformed);
        assert_eq!(tokens.verify("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let good = make_service("same-secret", "good-iss", "good-aud");
        let bad = make_service("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(Uuid::new_v4()).unwrap();
        assert!(bad.verify(&token).is_err());
    }
}
