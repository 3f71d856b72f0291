use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        AdminUpdateRequest, AuthResponse, ForgotPasswordRequest, LoginRequest, PageQuery,
        ResetPasswordRequest, SignupRequest, UpdateMeRequest, UserData, UserListData,
        UserListResponse, UserResponse,
    },
    services::{self, Session},
};
use crate::{
    auth::{AdminOnly, Authorized, CurrentUser},
    errors::AppError,
    response::{Accepted, ApiJson, Outcome},
    state::AppState,
    users::{AdminUpdate, Role, SelfUpdate, Status},
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/updateMe", patch(update_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", patch(update_user))
}

fn auth_response(session: Session) -> Json<AuthResponse> {
    Json(AuthResponse {
        status: Outcome::Success,
        token: session.token,
        data: UserData { user: session.user },
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session =
        services::signup(&state, &payload.full_name, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, auth_response(session)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let session = services::login(&state, &email, &password).await?;
    Ok(auth_response(session))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::new(services::get_self(user)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(payload): ApiJson<UpdateMeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if payload.role.is_some() || payload.status.is_some() {
        return Err(AppError::validation(
            "This route is not for role or status updates.",
        ));
    }
    let update = SelfUpdate {
        full_name: payload.full_name,
        // the profile form sends an empty password when it is left unchanged
        password: payload.password.filter(|p| !p.is_empty()),
    };
    let user = services::update_self(&state, &user, update).await?;
    Ok(Json(UserResponse::new(user)))
}

#[instrument(skip_all, fields(admin_id = %admin.user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let page = services::admin_list_users(&state, query.into()).await?;
    Ok(Json(UserListResponse {
        status: Outcome::Success,
        results: page.items.len(),
        total: page.total,
        data: UserListData { users: page.items },
    }))
}

#[instrument(skip_all, fields(admin_id = %admin.user.id, target = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<AdminUpdateRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let target: Uuid = id
        .parse()
        .map_err(|_| AppError::NotFound("No user found with that ID".into()))?;

    let update = AdminUpdate {
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
        role: payload
            .role
            .as_deref()
            .map(str::parse::<Role>)
            .transpose()
            .map_err(AppError::Validation)?,
        status: payload
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()
            .map_err(AppError::Validation)?,
    };
    let user = services::admin_update_user(&state, target, update).await?;
    Ok(Json(UserResponse::new(user)))
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Accepted>, AppError> {
    services::forgot_password(&state, payload.email.as_deref().unwrap_or_default()).await?;
    Ok(Json(Accepted::new(
        "Email verified. You can now reset your password.",
    )))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Accepted>, AppError> {
    services::reset_password(
        &state,
        payload.email.as_deref().unwrap_or_default(),
        payload.new_password.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(Json(Accepted::new(
        "Password reset successfully. Please log in with your new password.",
    )))
}
