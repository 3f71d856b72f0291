//! Credential management and access control: users, password hashing,
//! stateless session tokens and role/status gating over an axum API.

pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod response;
pub mod state;
pub mod users;
