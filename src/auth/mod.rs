//! Session tokens and the guard chain protecting routes.

mod claims;
pub mod extractors;
pub mod guard;
pub mod jwt;

pub use extractors::{AdminOnly, Authorized, CurrentUser, RoleSet};
pub use jwt::{TokenError, TokenService};
