//! The per-request guard chain.
//!
//! Each step either passes a value to the next one or ends the request with an
//! [`AppError`]:
//!
//! 1. [`extract_bearer`]  pull the token out of `Authorization: Bearer <token>`
//! 2. [`verify_token`]    check signature, structure and expiry
//! 3. [`resolve_user`]    load the subject from the credential store
//! 4. [`check_status`]    refuse inactive accounts
//! 5. the extractor binds the surviving record as the request principal
//! 6. [`check_role`]      only on role-gated routes
//!
//! Nothing is cached between requests.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, warn};
use uuid::Uuid;

use super::jwt::TokenService;
use crate::{
    errors::{
        AppError, ACCOUNT_DEACTIVATED, INVALID_TOKEN, NOT_LOGGED_IN, PERMISSION_DENIED, USER_GONE,
    },
    state::AppState,
    users::{CredentialStore, Role, UserRecord},
};

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated(NOT_LOGGED_IN))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated(NOT_LOGGED_IN))?;
    Ok(token)
}

/// All token failures collapse into the same client-facing error.
pub fn verify_token(tokens: &TokenService, token: &str) -> Result<Uuid, AppError> {
    tokens.verify(token).map_err(|reason| {
        debug!(%reason, "token rejected");
        AppError::Unauthenticated(INVALID_TOKEN)
    })
}

pub async fn resolve_user(credentials: &CredentialStore, id: Uuid) -> Result<UserRecord, AppError> {
    credentials.find_by_id(id).await?.ok_or_else(|| {
        warn!(user_id = %id, "token subject no longer exists");
        AppError::Unauthenticated(USER_GONE)
    })
}

pub fn check_status(user: UserRecord) -> Result<UserRecord, AppError> {
    if !user.is_active() {
        warn!(user_id = %user.id, "inactive account refused");
        return Err(AppError::Forbidden(ACCOUNT_DEACTIVATED));
    }
    Ok(user)
}

pub fn check_role(user: &UserRecord, allowed: &[Role]) -> Result<(), AppError> {
    if !allowed.contains(&user.role) {
        warn!(user_id = %user.id, role = %user.role, "role not permitted");
        return Err(AppError::Forbidden(PERMISSION_DENIED));
    }
    Ok(())
}

/// Steps 1 to 4, in order, stopping at the first failure.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, AppError> {
    let token = extract_bearer(headers)?;
    let user_id = verify_token(&state.tokens, token)?;
    let user = resolve_user(&state.credentials, user_id).await?;
    check_status(user)
}
