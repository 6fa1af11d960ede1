//! Credential and session persistence.
//!
//! Business logic talks to the [`UserStore`] and [`SessionStore`] traits;
//! Postgres backs them in production and an in-process map backs them in
//! tests and `memory://` deployments.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryStore;
pub use models::{NewUser, ProfileChanges, PublicUser, User, UserSession};
pub use operations::DbOperations;
pub use store::{SessionStore, UserStore};
