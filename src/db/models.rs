use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A player account as stored by the credential store.
///
/// Monetary amounts are kept in minor units (cents) and are never negative;
/// the schema enforces the same with `CHECK` constraints.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub balance_cents: i64,
    pub total_wagered_cents: i64,
    pub total_won_cents: i64,
    pub is_verified: bool,
    pub is_active: bool,
    pub self_exclusion: bool,
    pub self_exclusion_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            date_of_birth: new_user.date_of_birth,
            country: new_user.country,
            phone: new_user.phone,
            balance_cents: 0,
            total_wagered_cents: 0,
            total_won_cents: 0,
            is_verified: false,
            is_active: true,
            self_exclusion: false,
            self_exclusion_until: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The projection that leaves the server. Never carries the hash.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            country: self.country.clone(),
            phone: self.phone.clone(),
            balance_cents: self.balance_cents,
            total_wagered_cents: self.total_wagered_cents,
            total_won_cents: self.total_won_cents,
            is_verified: self.is_verified,
            self_exclusion: self.self_exclusion,
            self_exclusion_until: self.self_exclusion_until,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// Validated registration data, ready to persist.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub balance_cents: i64,
    pub total_wagered_cents: i64,
    pub total_won_cents: i64,
    pub is_verified: bool,
    pub self_exclusion: bool,
    pub self_exclusion_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields a profile update may touch. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub self_exclusion_until: Option<DateTime<Utc>>,
}

/// Server-side record of an issued bearer token.
///
/// Only a digest of the token is stored, so a leaked table cannot be
/// replayed as live sessions.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid, token_hash: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            issued_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
