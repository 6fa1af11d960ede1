use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{ProfileChanges, User, UserSession};
use crate::Result;

/// Persists player accounts. Lookups take identities already normalised by
/// the caller.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the username or email is taken.
    async fn create_user(&self, user: &User) -> Result<User>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn username_exists(&self, username: &str) -> Result<bool>;
    async fn email_exists(&self, email: &str) -> Result<bool>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
}

/// Persists issued sessions, keyed by token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &UserSession) -> Result<()>;
    async fn get_session(&self, token_hash: &str) -> Result<Option<UserSession>>;
    /// Returns whether a session was removed.
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64>;
    async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}
