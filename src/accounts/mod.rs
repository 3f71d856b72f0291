use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod services;

/// Everything under `/api/users`.
pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/api/users",
        Router::new()
            .merge(handlers::public_routes())
            .merge(handlers::me_routes())
            .merge(handlers::admin_routes()),
    )
}
