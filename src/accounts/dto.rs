use serde::{Deserialize, Serialize};

use crate::{
    response::Outcome,
    users::{Pagination, UserRecord},
};

/// Request body for signup. Any `role` sent by the client is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `PATCH /updateMe`.
///
/// `role` and `status` are captured only so their presence can be refused.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<serde_json::Value>,
    pub status: Option<serde_json::Value>,
}

/// Request body for the admin update. Enum fields arrive as strings and are checked explicitly.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
}

/// `?page=&limit=`; anything that is not a positive integer falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl From<PageQuery> for Pagination {
    fn from(q: PageQuery) -> Self {
        let parse = |v: Option<String>| v.and_then(|s| s.trim().parse::<i64>().ok());
        Pagination::new(parse(q.page), parse(q.limit))
    }
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: UserRecord,
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: Outcome,
    pub token: String,
    pub data: UserData,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub status: Outcome,
    pub data: UserData,
}

impl UserResponse {
    pub fn new(user: UserRecord) -> Self {
        Self {
            status: Outcome::Success,
            data: UserData { user },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub status: Outcome,
    pub results: usize,
    pub total: i64,
    pub data: UserListData,
}
