//! Account lifecycle operations. Callers are expected to have run the guard
//! chain already where an operation needs a principal or a role.

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::AppError,
    state::AppState,
    users::{
        credentials::validate_password, AdminUpdate, Page, Pagination, SelfUpdate, UserPatch,
        UserRecord,
    },
};

/// A user together with a freshly issued session token.
#[derive(Debug)]
pub struct Session {
    pub user: UserRecord,
    pub token: String,
}

fn no_user_with_email() -> AppError {
    AppError::NotFound("There is no user with that email address.".into())
}

#[instrument(skip(st, password))]
pub async fn signup(
    st: &AppState,
    full_name: &str,
    email: &str,
    password: &str,
) -> Result<Session, AppError> {
    let user = st.credentials.create(full_name, email, password).await?;
    let token = st.tokens.issue(user.id)?;
    info!(user_id = %user.id, "user signed up");
    Ok(Session { user, token })
}

/// Unknown email and wrong password produce the same error.
#[instrument(skip(st, password))]
pub async fn login(st: &AppState, email: &str, password: &str) -> Result<Session, AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation("Please provide email and password"));
    }

    let Some(creds) = st.credentials.find_by_email(email).await? else {
        // same hashing work as a wrong password
        st.credentials.verify_unknown(password).await?;
        warn!("login for unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !st.credentials.verify_password(password, &creds).await? {
        warn!(user_id = %creds.user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }
    if !creds.user.is_active() {
        warn!(user_id = %creds.user.id, "login to inactive account");
        return Err(AppError::AccountInactive);
    }

    let user = st
        .credentials
        .record_login(creds.user.id, OffsetDateTime::now_utc())
        .await?;
    let token = st.tokens.issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Session { user, token })
}

pub fn get_self(principal: UserRecord) -> UserRecord {
    principal
}

/// The session stays valid: tokens only carry the unchanged user id.
pub async fn update_self(
    st: &AppState,
    principal: &UserRecord,
    update: SelfUpdate,
) -> Result<UserRecord, AppError> {
    st.credentials
        .update_fields(principal.id, UserPatch::SelfService(update))
        .await
}

pub async fn admin_list_users(st: &AppState, pagination: Pagination) -> Result<Page, AppError> {
    st.credentials.list(pagination).await
}

#[instrument(skip(st, update))]
pub async fn admin_update_user(
    st: &AppState,
    target: Uuid,
    update: AdminUpdate,
) -> Result<UserRecord, AppError> {
    let user = st
        .credentials
        .update_fields(target, UserPatch::Admin(update))
        .await?;
    info!(user_id = %user.id, role = %user.role, status = %user.status, "user updated by admin");
    Ok(user)
}

/// Only checks that the email is registered; nothing is sent and nothing changes.
///
/// Together with [`reset_password`] this treats knowledge of a registered
/// email as proof of ownership. There is no emailed token or second channel,
/// so anyone who knows an address can reset its password.
pub async fn forgot_password(st: &AppState, email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::validation("Please provide your email"));
    }
    st.credentials
        .find_by_email(email)
        .await?
        .ok_or_else(no_user_with_email)?;
    Ok(())
}

/// The new password is validated before the store is touched.
#[instrument(skip(st, new_password))]
pub async fn reset_password(st: &AppState, email: &str, new_password: &str) -> Result<(), AppError> {
    validate_password(new_password)?;
    if email.trim().is_empty() {
        return Err(AppError::validation("Please provide your email"));
    }

    let creds = st
        .credentials
        .find_by_email(email)
        .await?
        .ok_or_else(no_user_with_email)?;
    let patch = UserPatch::SelfService(SelfUpdate {
        password: Some(new_password.to_string()),
        ..Default::default()
    });
    st.credentials.update_fields(creds.user.id, patch).await?;
    info!(user_id = %creds.user.id, "password reset");
    Ok(())
}
