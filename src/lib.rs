pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod device;
pub mod error;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimitConfig, RateLimiter};
pub use db::{DbOperations, MemoryStore, SessionStore, User, UserSession, UserStore};
pub use device::DeviceResponder;

use api::ErrorResponse;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub responder: Arc<DeviceResponder>,
    db: Option<Arc<DbOperations>>,
}

impl AppState {
    /// Connects to Postgres and applies migrations, or falls back to the
    /// in-process store for `memory://` URLs.
    pub async fn new(config: Settings) -> Result<Self> {
        if config.database.is_memory() {
            info!("Using in-memory user and session store");
            return Ok(Self::in_memory(config));
        }

        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_seconds),
        )
        .await?;
        db.run_migrations().await?;

        let db = Arc::new(db);
        let mut state = Self::with_stores(config, db.clone(), db.clone());
        state.db = Some(db);
        Ok(state)
    }

    pub fn in_memory(config: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(config, store.clone(), store)
    }

    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let auth_service = AuthService::new(users, sessions, &config.auth);
        let rate_limiter = RateLimiter::new(RateLimitConfig::from(&config.rate_limit));
        let responder = DeviceResponder::from_config(&config.device);

        Self {
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
            rate_limiter: Arc::new(rate_limiter),
            responder: Arc::new(responder),
            db: None,
        }
    }

    /// Periodically purges expired sessions and idle rate-limit windows.
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let state = self.clone();
        let interval = Duration::from_secs(state.config.auth.cleanup_interval_seconds.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = state.auth_service.cleanup_expired_sessions().await {
                    error!("Session cleanup failed: {}", e);
                }
                state.rate_limiter.cleanup().await;
            }
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let body = ErrorResponse {
        success: false,
        error: format!("Invalid request body: {}", err),
        fields: None,
    };
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

/// Registers every route. Shared by `main` and the integration tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api")
                .route("/login", web::post().to(auth::handlers::login))
                .route("/register", web::post().to(auth::handlers::register))
                .route("/logout", web::post().to(auth::handlers::logout))
                .route("/user/profile", web::get().to(auth::handlers::get_profile))
                .route("/user/profile", web::put().to(auth::handlers::update_profile))
                .route("/user/password", web::put().to(auth::handlers::change_password)),
        )
        .route("/", web::get().to(device::handlers::index))
        .route("/login", web::get().to(device::handlers::login_page))
        .route("/assets/{path:.*}", web::get().to(device::handlers::asset));
}
