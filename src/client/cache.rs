use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthResponse;
use crate::client::audit::{AuditEvent, AuditObserver, TracingAudit};
use crate::client::storage::CacheStorage;
use crate::client::verifier::SessionVerifier;
use crate::db::models::PublicUser;
use crate::error::ClientError;

/// Storage key of the persisted session record.
pub const SESSION_STORAGE_KEY: &str = "bingo_session";

/// Local lifetime of a cached session, independent of the server's expiry.
pub const SESSION_TTL_HOURS: i64 = 24;

/// The persisted record: `{user, token, timestamp}` with a millisecond
/// timestamp of when the session was cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSession {
    pub user: PublicUser,
    pub token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    App,
    Other(String),
}

impl View {
    /// Views that only make sense to signed-out visitors.
    pub fn is_login_only(&self) -> bool {
        matches!(self, View::Login | View::Register)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    ToLogin,
    ToApp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Empty,
    Cached { stale: bool },
    Verifying,
    Authenticated(PublicUser),
    Unauthenticated,
}

/// Result of restoring a session on page load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing was cached.
    Anonymous,
    Authenticated { user: PublicUser, redirect: Option<Redirect> },
    Unauthenticated { redirect: Option<Redirect> },
    /// The server could not be reached; the cache is kept for a retry.
    Offline,
    /// The user navigated away while verification was in flight.
    Discarded,
}

/// Lets another task mark a navigation so an in-flight verification result
/// is dropped instead of applied.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    epoch: Arc<AtomicU64>,
}

impl NavigationHandle {
    pub fn navigated(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

fn redirect_to_login(view: &View) -> Option<Redirect> {
    (*view != View::Login).then_some(Redirect::ToLogin)
}

/// Client-side session cache.
///
/// ```text
/// Empty ─ login ─▶ Authenticated
/// Cached(fresh) ─▶ Verifying ─┬▶ Authenticated
///                             └▶ Unauthenticated (cache cleared)
/// Cached(stale) ─────────────────▶ Unauthenticated (no network call)
/// ```
///
/// Every transition is published to [`SessionCache::watch`] receivers.
pub struct SessionCache<S: CacheStorage, V: SessionVerifier> {
    storage: S,
    verifier: V,
    audit: Arc<dyn AuditObserver>,
    ttl: Duration,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    epoch: Arc<AtomicU64>,
}

impl<S: CacheStorage, V: SessionVerifier> SessionCache<S, V> {
    pub fn new(storage: S, verifier: V) -> Self {
        Self {
            storage,
            verifier,
            audit: Arc::new(TracingAudit),
            ttl: Duration::hours(SESSION_TTL_HOURS),
            state: SessionState::Empty,
            state_tx: watch::channel(SessionState::Empty).0,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditObserver>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Follow state transitions from another task, including `Verifying`
    /// while a load is in flight.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn transition(&mut self, next: SessionState) {
        self.state_tx.send_replace(next.clone());
        self.state = next;
    }

    pub fn current_user(&self) -> Option<&PublicUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn navigation(&self) -> NavigationHandle {
        NavigationHandle {
            epoch: self.epoch.clone(),
        }
    }

    /// The persisted record, if it exists and parses. Corrupt records are
    /// removed.
    pub fn cached(&self) -> Option<CachedSession> {
        let raw = match self.storage.get(SESSION_STORAGE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Could not read cached session: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding unreadable cached session: {}", e);
                self.clear_storage();
                None
            }
        }
    }

    /// The bearer token to attach to API calls while authenticated.
    pub fn token(&self) -> Option<String> {
        match self.state {
            SessionState::Authenticated(_) => self.cached().map(|c| c.token),
            _ => None,
        }
    }

    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event) {
            warn!("Audit observer failed for {:?}: {}", event, e);
        }
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.remove(SESSION_STORAGE_KEY) {
            warn!("Could not clear cached session: {}", e);
        }
    }

    /// Cache a successful login or registration.
    pub fn remember(&mut self, response: &AuthResponse) -> Result<(), ClientError> {
        self.remember_at(response, Utc::now())
    }

    pub fn remember_at(&mut self, response: &AuthResponse, now: DateTime<Utc>) -> Result<(), ClientError> {
        let record = CachedSession {
            user: response.user.clone(),
            token: response.token.clone(),
            timestamp: now,
        };
        let raw = serde_json::to_string(&record).map_err(|e| ClientError::StorageError(e.to_string()))?;
        self.storage.set(SESSION_STORAGE_KEY, &raw)?;

        info!("Session cached for user {}", record.user.id);
        self.transition(SessionState::Authenticated(record.user.clone()));
        self.emit(AuditEvent::Login { user_id: record.user.id });
        Ok(())
    }

    /// Restore the session on page load.
    pub async fn load(&mut self, view: &View) -> LoadOutcome {
        self.load_at(Utc::now(), view).await
    }

    pub async fn load_at(&mut self, now: DateTime<Utc>, view: &View) -> LoadOutcome {
        let Some(cached) = self.cached() else {
            self.transition(SessionState::Empty);
            return LoadOutcome::Anonymous;
        };

        if now - cached.timestamp >= self.ttl {
            self.transition(SessionState::Cached { stale: true });
            debug!("Cached session for user {} is past its local lifetime", cached.user.id);
            self.clear_storage();
            self.transition(SessionState::Unauthenticated);
            self.emit(AuditEvent::SessionExpired { user_id: cached.user.id });
            return LoadOutcome::Unauthenticated {
                redirect: redirect_to_login(view),
            };
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        self.transition(SessionState::Verifying);

        let result = self.verifier.verify(&cached.token).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Navigation during verification, dropping result");
            self.transition(SessionState::Cached { stale: false });
            return LoadOutcome::Discarded;
        }

        match result {
            Ok(user) => {
                // Refresh the user snapshot but keep the original timestamp:
                // verification never extends the local lifetime.
                if user != cached.user {
                    let refreshed = CachedSession {
                        user: user.clone(),
                        ..cached
                    };
                    match serde_json::to_string(&refreshed) {
                        Ok(raw) => {
                            if let Err(e) = self.storage.set(SESSION_STORAGE_KEY, &raw) {
                                warn!("Could not refresh cached user: {}", e);
                            }
                        }
                        Err(e) => warn!("Could not serialize cached user: {}", e),
                    }
                }

                self.transition(SessionState::Authenticated(user.clone()));
                self.emit(AuditEvent::SessionRestored { user_id: user.id });
                LoadOutcome::Authenticated {
                    user,
                    redirect: view.is_login_only().then_some(Redirect::ToApp),
                }
            }
            Err(ClientError::SessionInvalid) | Err(ClientError::Rejected { .. }) => {
                info!("Server rejected cached session for user {}", cached.user.id);
                self.clear_storage();
                self.transition(SessionState::Unauthenticated);
                self.emit(AuditEvent::SessionRejected { user_id: cached.user.id });
                LoadOutcome::Unauthenticated {
                    redirect: redirect_to_login(view),
                }
            }
            Err(e) => {
                warn!("Session verification unavailable: {}", e);
                self.transition(SessionState::Cached { stale: false });
                LoadOutcome::Offline
            }
        }
    }

    /// Forget the session locally. Safe to call repeatedly.
    pub fn logout(&mut self, view: &View) -> Option<Redirect> {
        let user_id = self.cached().map(|c| c.user.id);
        self.clear_storage();
        self.transition(SessionState::Unauthenticated);
        self.emit(AuditEvent::Logout { user_id });
        redirect_to_login(view)
    }
}
