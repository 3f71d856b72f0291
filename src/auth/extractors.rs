use std::marker::PhantomData;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::guard;
use crate::{
    errors::AppError,
    state::AppState,
    users::{Role, UserRecord},
};

/// The authenticated, active principal of the current request.
pub struct CurrentUser(pub UserRecord);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = guard::authenticate(state, &parts.headers).await?;
        Ok(CurrentUser(user))
    }
}

/// A fixed set of roles a route accepts.
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RoleSet for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Principal that also passed the role check for `R`.
pub struct Authorized<R: RoleSet> {
    pub user: UserRecord,
    _roles: PhantomData<R>,
}

#[async_trait]
impl<R: RoleSet> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        guard::check_role(&user, R::ALLOWED)?;
        Ok(Authorized {
            user,
            _roles: PhantomData,
        })
    }
}
