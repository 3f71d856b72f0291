use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    model::{NewUser, Page, Pagination, Role, Status, UserChanges, UserCredentials, UserRecord},
    password::{self, Argon2Params},
    store::{StoreError, UserStore},
};
use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

// Hashed once per store; only ever verified against, never stored.
const DUMMY_PASSWORD: &str = "warden-timing-equalizer";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_password(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

fn validate_full_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Please provide your full name"));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Please provide a valid email"));
    }
    Ok(email)
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

/// Fields a user may change on their own record.
#[derive(Debug, Clone, Default)]
pub struct SelfUpdate {
    pub full_name: Option<String>,
    pub password: Option<String>,
}

/// Fields an administrator may change on any record.
#[derive(Debug, Clone, Default)]
pub struct AdminUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

/// Allow-listed patch. Which variant gets built decides which fields can move.
#[derive(Debug, Clone)]
pub enum UserPatch {
    SelfService(SelfUpdate),
    Admin(AdminUpdate),
}

/// Owns user records and everything that touches password material.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn UserStore>,
    argon2: Argon2Params,
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn UserStore>, argon2: Argon2Params) -> Self {
        Self {
            store,
            argon2,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Argon2 is CPU-bound; keep it off the async workers.
    async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let plain = plain.to_owned();
        let params = self.argon2;
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain, params))
            .await
            .context("join password hashing task")??;
        Ok(hash)
    }

    #[instrument(skip(self, plain_password))]
    pub async fn create(
        &self,
        full_name: &str,
        email: &str,
        plain_password: &str,
    ) -> Result<UserRecord, AppError> {
        let full_name = validate_full_name(full_name)?;
        let email = validate_email(email)?;
        validate_password(plain_password)?;

        let password_hash = self.hash(plain_password).await?;
        let user = self
            .store
            .insert(NewUser {
                full_name,
                email,
                password_hash,
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateEmail) {
                    warn!("email already registered");
                }
                AppError::from(e)
            })?;

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, AppError> {
        Ok(self.store.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Compares `candidate` against the stored hash with the same primitive that produced it.
    pub async fn verify_password(
        &self,
        candidate: &str,
        credentials: &UserCredentials,
    ) -> Result<bool, AppError> {
        verify_blocking(candidate, credentials.password_hash.clone()).await
    }

    /// Runs a full verification against a throwaway hash built with the configured cost.
    ///
    /// Lookups that find no user call this so they take as long as a wrong password.
    pub async fn verify_unknown(&self, candidate: &str) -> Result<(), AppError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?
            .clone();
        verify_blocking(candidate, hash).await?;
        Ok(())
    }

    /// Builds the throwaway hash ahead of the first unknown-email login.
    pub async fn warm_up(&self) -> Result<(), AppError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn dummy_hash_ready(&self) -> bool {
        self.dummy_hash.initialized()
    }

    #[instrument(skip(self, patch))]
    pub async fn update_fields(&self, id: Uuid, patch: UserPatch) -> Result<UserRecord, AppError> {
        let mut changes = UserChanges::default();
        let (full_name, password) = match patch {
            UserPatch::SelfService(p) => (p.full_name, p.password),
            UserPatch::Admin(p) => {
                changes.email = p.email.as_deref().map(validate_email).transpose()?;
                changes.role = p.role;
                changes.status = p.status;
                (p.full_name, p.password)
            }
        };
        changes.full_name = full_name.as_deref().map(validate_full_name).transpose()?;
        if let Some(plain) = password {
            validate_password(&plain)?;
            changes.password_hash = Some(self.hash(&plain).await?);
        }

        let user = self
            .store
            .update(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".into()))?;
        debug!(user_id = %user.id, "user updated");
        Ok(user)
    }

    pub async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> Result<UserRecord, AppError> {
        let changes = UserChanges {
            last_login: Some(at),
            ..Default::default()
        };
        self.store
            .update(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".into()))
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Page, AppError> {
        let (items, total) = self
            .store
            .list(pagination.offset(), pagination.limit)
            .await?;
        Ok(Page { items, total })
    }
}

async fn verify_blocking(candidate: &str, hash: String) -> Result<bool, AppError> {
    let candidate = candidate.to_owned();
    let ok = tokio::task::spawn_blocking(move || password::verify_password(&candidate, &hash))
        .await
        .context("join password verification task")??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{memory::MemoryUserStore, password::fast_params};

    fn credentials() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserStore::new()), fast_params())
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("ada@x.com"));
        assert!(!is_valid_email("ada@x"));
        assert!(!is_valid_email("ada x@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[tokio::test]
    async fn create_normalizes_and_hashes() {
        let creds = credentials();
        let user = creds
            .create("  Ada  ", " Ada@X.com ", "longenough1")
            .await
            .unwrap();
        assert_eq!(user.full_name, "Ada");
        assert_eq!(user.email, "ada@x.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, Status::Active);

        let stored = creds.find_by_email("ADA@x.com").await.unwrap().unwrap();
        let hash = stored.password_hash_for_tests();
        assert_ne!(hash, "longenough1");
        assert!(!hash.starts_with("longenough1"));
        assert!(!hash.ends_with("longenough1"));
        assert!(!hash.contains("longenough1"));
        assert!(creds.verify_password("longenough1", &stored).await.unwrap());
        assert!(!creds.verify_password("longenough2", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn verify_unknown_runs_the_verifier_with_configured_cost() {
        let creds = credentials();
        assert!(!creds.dummy_hash_ready());
        creds.verify_unknown("whatever123").await.unwrap();
        assert!(creds.dummy_hash_ready());

        let hash = creds.dummy_hash.get().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024,t=1,p=1"));
        // the cell is shared between clones
        assert!(creds.clone().dummy_hash_ready());
    }

    #[tokio::test]
    async fn create_validates_input() {
        let creds = credentials();
        for (name, email, pass) in [
            ("", "a@x.com", "longenough1"),
            ("Ada", "not-an-email", "longenough1"),
            ("Ada", "a@x.com", "short"),
        ] {
            let err = creds.create(name, email, pass).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{name} {email}");
        }
    }

    #[tokio::test]
    async fn concurrent_creates_with_same_email_admit_exactly_one() {
        let creds = credentials();
        let mut handles = Vec::new();
        for i in 0..8 {
            let creds = creds.clone();
            handles.push(tokio::spawn(async move {
                creds
                    .create(&format!("User {i}"), "race@x.com", "longenough1")
                    .await
            }));
        }

        let mut ok = 0;
        let mut dup = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AppError::DuplicateEmail) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(dup, 7);
    }

    #[tokio::test]
    async fn self_patch_rehashes_password() {
        let creds = credentials();
        let user = creds.create("Ada", "a@x.com", "longenough1").await.unwrap();
        let patch = UserPatch::SelfService(SelfUpdate {
            full_name: Some("Ada L".into()),
            password: Some("evenlonger2".into()),
        });
        let updated = creds.update_fields(user.id, patch).await.unwrap();
        assert_eq!(updated.full_name, "Ada L");
        assert_eq!(updated.role, user.role);

        let stored = creds.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(creds.verify_password("evenlonger2", &stored).await.unwrap());
        assert!(!creds.verify_password("longenough1", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn admin_patch_sets_role_and_status() {
        let creds = credentials();
        let user = creds.create("Ada", "a@x.com", "longenough1").await.unwrap();
        let patch = UserPatch::Admin(AdminUpdate {
            role: Some(Role::Admin),
            status: Some(Status::Inactive),
            ..Default::default()
        });
        let updated = creds.update_fields(user.id, patch).await.unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.status, Status::Inactive);
    }

    #[tokio::test]
    async fn patch_rejects_bad_values_and_unknown_ids() {
        let creds = credentials();
        let user = creds.create("Ada", "a@x.com", "longenough1").await.unwrap();

        let short = UserPatch::SelfService(SelfUpdate {
            password: Some("short".into()),
            ..Default::default()
        });
        assert!(matches!(
            creds.update_fields(user.id, short).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let blank = UserPatch::Admin(AdminUpdate {
            full_name: Some("   ".into()),
            ..Default::default()
        });
        assert!(matches!(
            creds.update_fields(user.id, blank).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let missing = creds
            .update_fields(Uuid::new_v4(), UserPatch::Admin(AdminUpdate::default()))
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let creds = credentials();
        for i in 0..3 {
            creds
                .create("User", &format!("u{i}@x.com"), "longenough1")
                .await
                .unwrap();
        }
        let page = creds.list(Pagination::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].email, "u2@x.com");

        let page = creds.list(Pagination::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].email, "u0@x.com");
    }
}
