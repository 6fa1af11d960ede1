use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ChangePasswordRequest, ProfileUpdateRequest, RegisterRequest};
use crate::auth::password::{hash_password, password_problems, verify_against_dummy, verify_password};
use crate::auth::validation::{
    normalize_identity, validate_profile_update, validate_registration, RegistrationRules,
};
use crate::config::AuthConfig;
use crate::db::models::{NewUser, ProfileChanges, PublicUser, User, UserSession};
use crate::db::store::{SessionStore, UserStore};
use crate::error::{AppError, AuthError, DatabaseError, ValidationErrors};
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
    pub jti: String,  // Unique per token
}

/// A freshly minted bearer token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: PublicUser,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer sessions on top of the credential store.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    jwt_secret: String,
    token_ttl: Duration,
    rules: RegistrationRules,
}

/// Digest under which a token is stored server-side.
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

// Argon2 runs on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalError(format!("blocking task failed: {}", e)))
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            users,
            sessions,
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: Duration::hours(config.token_expiry_hours),
            rules: RegistrationRules {
                case_insensitive_identities: config.case_insensitive_identities,
                minimum_age_years: config.minimum_age_years,
            },
        }
    }

    /// Check credentials and open a session.
    ///
    /// Unknown emails and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`]. Inactive accounts are only reported
    /// once the password has matched.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession> {
        let email = normalize_identity(email, self.rules.case_insensitive_identities);
        let password = password.to_string();

        let user = match self.users.get_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                blocking(move || verify_against_dummy(&password)).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let hash = user.password_hash.clone();
        let matches = blocking(move || verify_password(&hash, &password)).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            warn!("Login refused for inactive account {}", user.id);
            return Err(AuthError::AccountInactive.into());
        }

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        let user = User {
            last_login: Some(now),
            ..user
        };

        self.issue(&user, now).await
    }

    /// Validate the profile, persist the account and open its first session.
    pub async fn register(&self, req: &RegisterRequest) -> Result<IssuedSession> {
        let now = Utc::now();
        let valid = validate_registration(req, self.rules, now.date_naive())?;

        let mut taken = ValidationErrors::new();
        if self.users.username_exists(&valid.username).await? {
            taken.add("username", "Username is already taken");
        }
        if self.users.email_exists(&valid.email).await? {
            taken.add("email", "Email is already registered");
        }
        taken.into_result()?;

        let password = req.password.clone();
        let password_hash = blocking(move || hash_password(&password)).await??;

        let user = User::new(NewUser {
            username: valid.username,
            email: valid.email,
            password_hash,
            first_name: valid.first_name,
            last_name: valid.last_name,
            date_of_birth: valid.date_of_birth,
            country: valid.country,
            phone: valid.phone,
        });

        let created = match self.users.create_user(&user).await {
            Ok(created) => created,
            // Lost a race with a concurrent registration.
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                return Err(ValidationErrors::single("email", "Username or email is already registered").into());
            }
            Err(e) => return Err(e),
        };
        info!("Registered user {} ({})", created.id, created.username);

        self.users.record_login(created.id, now).await?;
        let created = User {
            last_login: Some(now),
            ..created
        };
        self.issue(&created, now).await
    }

    /// Resolve a bearer token to its user without touching any state.
    ///
    /// Every reason a token is not acceptable maps to
    /// [`AuthError::SessionInvalid`]; store failures propagate unchanged.
    pub async fn verify(&self, token: &str) -> Result<PublicUser> {
        Ok(self.verify_user(token).await?.to_public())
    }

    async fn verify_user(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token)?;

        let session = self
            .sessions
            .get_session(&token_digest(token))
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        if session.is_expired_at(Utc::now()) {
            debug!("Session {} has expired", session.id);
            return Err(AuthError::SessionInvalid.into());
        }
        if session.user_id.to_string() != claims.sub {
            warn!("Session {} does not match its token subject", session.id);
            return Err(AuthError::SessionInvalid.into());
        }

        let user = self
            .users
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        if !user.is_active {
            return Err(AuthError::SessionInvalid.into());
        }

        Ok(user)
    }

    /// Drop the session behind `token`. Repeating the call is harmless.
    pub async fn logout(&self, token: &str) -> Result<bool> {
        let removed = self.sessions.delete_session(&token_digest(token)).await?;
        if removed {
            info!("Session closed");
        }
        Ok(removed)
    }

    pub async fn update_profile(&self, user_id: Uuid, req: &ProfileUpdateRequest) -> Result<PublicUser> {
        let valid = validate_profile_update(req)?;

        let current = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        // Self-exclusion may be extended but never shortened.
        let self_exclusion_until = valid.self_exclusion_days.map(|days| {
            let requested = Utc::now() + Duration::days(i64::from(days));
            match current.self_exclusion_until {
                Some(existing) if existing > requested => existing,
                _ => requested,
            }
        });

        let changes = ProfileChanges {
            first_name: valid.first_name,
            last_name: valid.last_name,
            phone: valid.phone,
            country: valid.country,
            self_exclusion_until,
        };

        let updated = self.users.update_profile(user_id, &changes).await?;
        if let Some(until) = self_exclusion_until {
            info!("User {} self-excluded until {}", user_id, until.to_rfc3339());
        }
        Ok(updated.to_public())
    }

    /// Replace the password, revoke every open session and issue a new one.
    pub async fn change_password(&self, user_id: Uuid, req: &ChangePasswordRequest) -> Result<IssuedSession> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        let hash = user.password_hash.clone();
        let current = req.current_password.clone();
        if !blocking(move || verify_password(&hash, &current)).await? {
            return Err(ValidationErrors::single("currentPassword", "Current password is incorrect").into());
        }

        let mut errors = ValidationErrors::new();
        for problem in password_problems(&req.new_password) {
            errors.add("newPassword", problem);
        }
        errors.into_result()?;

        let new_password = req.new_password.clone();
        let new_hash = blocking(move || hash_password(&new_password)).await??;
        // Revoke first: a failed update then leaves the old password with no
        // live sessions, never a new password next to sessions it should have ended.
        let revoked = self.sessions.delete_user_sessions(user_id).await?;
        self.users.update_password(user_id, &new_hash).await?;
        info!("Password changed for user {}, revoked {} session(s)", user_id, revoked);

        self.issue(&user, Utc::now()).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.sessions.cleanup_expired_sessions(Utc::now()).await
    }

    async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedSession> {
        let expires_at = now + self.token_ttl;
        let token = self.generate_token(user.id, now, expires_at)?;

        let session = UserSession::new(user.id, token_digest(&token), now, expires_at);
        self.sessions.create_session(&session).await?;
        debug!("Issued session {} for user {}", session.id, user.id);

        Ok(IssuedSession {
            token,
            user: user.to_public(),
            expires_at,
        })
    }

    fn generate_token(&self, user_id: Uuid, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("token encoding failed: {}", e)))
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::MemoryStore;
    use async_trait::async_trait;

    fn service_with(store: &MemoryStore) -> AuthService {
        let settings = Settings::new_for_test().unwrap();
        AuthService::new(Arc::new(store.clone()), Arc::new(store.clone()), &settings.auth)
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "Bingo2024".into(),
            first_name: "Lucy".into(),
            last_name: "Dauber".into(),
            date_of_birth: Some("1990-05-17".into()),
            phone: None,
            country: Some("GB".into()),
        }
    }

    #[tokio::test]
    async fn test_login_returns_verifiable_token() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let issued = service.login("lucky@example.com", "Bingo2024").await.unwrap();
        assert!(issued.user.last_login.is_some());

        let user = service.verify(&issued.token).await.unwrap();
        assert_eq!(user.email, "lucky@example.com");
        assert_eq!(user.id, issued.user.id);
    }

    #[tokio::test]
    async fn test_login_email_is_case_insensitive() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        service.register(&registration("lucky", "Lucky@Example.com")).await.unwrap();

        assert!(service.login("LUCKY@example.COM", "Bingo2024").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let unknown = service.login("nobody@example.com", "Bingo2024").await.unwrap_err();
        let wrong = service.login("lucky@example.com", "Bingo2025").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login_or_verify() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        store.set_active(issued.user.id, false).await.unwrap();

        let err = service.login("lucky@example.com", "Bingo2024").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::AccountInactive)));

        let err = service.verify(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::SessionInvalid)));
    }

    #[tokio::test]
    async fn test_foreign_tokens_are_invalid() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        // Correctly signed by another deployment
        let mut other_config = Settings::new_for_test().unwrap().auth;
        other_config.jwt_secret = "another_secret".into();
        let other = AuthService::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()), &other_config);
        let foreign = other
            .generate_token(issued.user.id, Utc::now(), Utc::now() + Duration::hours(1))
            .unwrap();

        // Correctly signed here but never recorded as a session
        let unrecorded = service
            .generate_token(issued.user.id, Utc::now(), Utc::now() + Duration::hours(1))
            .unwrap();

        for token in ["", "garbage", foreign.as_str(), unrecorded.as_str()] {
            let err = service.verify(token).await.unwrap_err();
            assert!(matches!(err, AppError::AuthError(AuthError::SessionInvalid)), "token {:?}", token);
        }
    }

    #[tokio::test]
    async fn test_verify_has_no_side_effects() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let before = store.get_session(&token_digest(&issued.token)).await.unwrap().unwrap();
        let first = service.verify(&issued.token).await.unwrap();
        let second = service.verify(&issued.token).await.unwrap();
        let after = store.get_session(&token_digest(&issued.token)).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(before.expires_at, after.expires_at);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        assert!(service.logout(&issued.token).await.unwrap());
        assert!(!service.logout(&issued.token).await.unwrap());
        assert!(service.verify(&issued.token).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_a_validation_error() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let err = service.register(&registration("LUCKY", "other@example.com")).await.unwrap_err();
        match err {
            AppError::ValidationError(errors) => assert!(errors.has("username")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_password_change_revokes_other_sessions() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let first = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();
        let second = service.login("lucky@example.com", "Bingo2024").await.unwrap();

        let fresh = service
            .change_password(
                first.user.id,
                &ChangePasswordRequest {
                    current_password: "Bingo2024".into(),
                    new_password: "Jackpot99".into(),
                },
            )
            .await
            .unwrap();

        assert!(service.verify(&first.token).await.is_err());
        assert!(service.verify(&second.token).await.is_err());
        assert!(service.verify(&fresh.token).await.is_ok());
        assert!(service.login("lucky@example.com", "Jackpot99").await.is_ok());
    }

    /// Delegates to a memory store but refuses password writes.
    struct ReadOnlyPasswords(MemoryStore);

    #[async_trait]
    impl UserStore for ReadOnlyPasswords {
        async fn create_user(&self, user: &User) -> Result<User> {
            self.0.create_user(user).await
        }
        async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
            self.0.get_user_by_id(id).await
        }
        async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
            self.0.get_user_by_email(email).await
        }
        async fn username_exists(&self, username: &str) -> Result<bool> {
            self.0.username_exists(username).await
        }
        async fn email_exists(&self, email: &str) -> Result<bool> {
            self.0.email_exists(email).await
        }
        async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
            self.0.record_login(id, at).await
        }
        async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<User> {
            self.0.update_profile(id, changes).await
        }
        async fn update_password(&self, _id: Uuid, _password_hash: &str) -> Result<()> {
            Err(DatabaseError::QueryError("password column is read-only".into()).into())
        }
    }

    #[tokio::test]
    async fn test_failed_password_write_leaves_no_live_sessions() {
        let store = MemoryStore::new();
        let settings = Settings::new_for_test().unwrap();
        let service = AuthService::new(
            Arc::new(ReadOnlyPasswords(store.clone())),
            Arc::new(store.clone()),
            &settings.auth,
        );
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let result = service
            .change_password(
                issued.user.id,
                &ChangePasswordRequest {
                    current_password: "Bingo2024".into(),
                    new_password: "Jackpot99".into(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::DatabaseError(_))));
        assert!(service.verify(&issued.token).await.is_err());
        assert!(service.login("lucky@example.com", "Bingo2024").await.is_ok());
    }

    #[tokio::test]
    async fn test_self_exclusion_is_never_shortened() {
        let store = MemoryStore::new();
        let service = service_with(&store);
        let issued = service.register(&registration("lucky", "lucky@example.com")).await.unwrap();

        let long = service
            .update_profile(
                issued.user.id,
                &ProfileUpdateRequest {
                    self_exclusion_days: Some(90),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let short = service
            .update_profile(
                issued.user.id,
                &ProfileUpdateRequest {
                    self_exclusion_days: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(short.self_exclusion);
        assert_eq!(short.self_exclusion_until, long.self_exclusion_until);
    }
}
