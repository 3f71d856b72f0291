use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::model::{NewUser, UserChanges, UserCredentials, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence seam for user records.
///
/// Implementations must enforce email uniqueness atomically and apply
/// [`UserChanges`] to a single record atomically.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new: NewUser) -> Result<UserRecord, StoreError>;

    /// `email` is expected in normalized (lowercase) form.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Returns `None` when no record has this id.
    async fn update(&self, id: Uuid, changes: UserChanges)
        -> Result<Option<UserRecord>, StoreError>;

    /// Newest first. Returns the page and the total number of records.
    async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<UserRecord>, i64), StoreError>;
}
