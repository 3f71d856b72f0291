use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    model::{NewUser, Role, Status, UserChanges, UserCredentials, UserRecord},
    store::{StoreError, UserStore},
};

/// User row in the database.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    password_hash: String, // Argon2 PHC string
    role: String,
    status: String,
    last_login: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

fn into_credentials(row: UserRow) -> Result<UserCredentials, StoreError> {
    let role = row.role.parse::<Role>().map_err(anyhow::Error::msg)?;
    let status = row.status.parse::<Status>().map_err(anyhow::Error::msg)?;
    let user = UserRecord {
        id: row.id,
        full_name: row.full_name,
        email: row.email,
        role,
        status,
        last_login: row.last_login,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(UserCredentials::new(user, row.password_hash))
}

fn into_record(row: UserRow) -> Result<UserRecord, StoreError> {
    into_credentials(row).map(|c| c.user)
}

fn map_write_error(e: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Other(anyhow::Error::new(e).context(what))
}

const COLUMNS: &str =
    "id, full_name, email, password_hash, role, status, last_login, created_at, updated_at";

/// Postgres-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, full_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert user"))?;
        into_record(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM users
            WHERE lower(email) = lower($1)
            "#
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(into_credentials).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        row.map(into_record).transpose()
    }

    async fn update(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        // single statement, so concurrent patches to different fields never lose each other
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                full_name     = COALESCE($2, full_name),
                email         = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role          = COALESCE($5, role),
                status        = COALESCE($6, status),
                last_login    = GREATEST(last_login, $7),
                updated_at    = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.full_name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.last_login)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "update user"))?;
        row.map(into_record).transpose()
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<UserRecord>, i64), StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM users
            ORDER BY created_at DESC, seq DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list users")?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let items = rows
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }
}
