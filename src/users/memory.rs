use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{NewUser, UserChanges, UserCredentials, UserRecord},
    store::{StoreError, UserStore},
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserCredentials>,
    by_email: HashMap<String, Uuid>,
    // insertion order; records are never removed
    order: Vec<Uuid>,
}

/// In-process [`UserStore`]. Used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let key = new.email.to_lowercase();
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&key) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            full_name: new.full_name,
            email: new.email,
            role: Default::default(),
            status: Default::default(),
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(key, user.id);
        inner.order.push(user.id);
        inner
            .users
            .insert(user.id, UserCredentials::new(user.clone(), new.password_hash));
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(|c| c.user.clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(current_email) = inner.users.get(&id).map(|c| c.user.email.to_lowercase()) else {
            return Ok(None);
        };

        if let Some(email) = &changes.email {
            let key = email.to_lowercase();
            if key != current_email {
                if inner.by_email.contains_key(&key) {
                    return Err(StoreError::DuplicateEmail);
                }
                inner.by_email.remove(&current_email);
                inner.by_email.insert(key, id);
            }
        }

        let Some(creds) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        let user = &mut creds.user;
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        if let Some(at) = changes.last_login {
            user.last_login = Some(user.last_login.map_or(at, |prev| prev.max(at)));
        }
        user.updated_at = OffsetDateTime::now_utc();
        if let Some(hash) = changes.password_hash {
            creds.password_hash = hash;
        }
        Ok(Some(creds.user.clone()))
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<UserRecord>, i64), StoreError> {
        let inner = self.inner.read().await;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let items = inner
            .order
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.users.get(id))
            .map(|c| c.user.clone())
            .collect();
        Ok((items, inner.order.len() as i64))
    }
}
