//! Credential storage: user records, password hashing and the persistence seam.

pub mod credentials;
pub mod memory;
pub mod model;
pub mod password;
pub mod repo;
pub mod store;

pub use credentials::{AdminUpdate, CredentialStore, SelfUpdate, UserPatch};
pub use memory::MemoryUserStore;
pub use model::{Page, Pagination, Role, Status, UserCredentials, UserRecord};
pub use repo::PgUserStore;
pub use store::{StoreError, UserStore};
