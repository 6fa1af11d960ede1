use actix_web::HttpRequest;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};
use tracing::warn;

use crate::config::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_attempts: u32,
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::minutes(1),
            max_attempts: 10,
            trusted_proxies: Vec::new(),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            window_size: Duration::seconds(settings.window_seconds),
            max_attempts: settings.max_attempts,
            trusted_proxies: settings
                .trusted_proxies
                .iter()
                .filter_map(|raw| match raw.parse() {
                    Ok(ip) => Some(ip),
                    Err(_) => {
                        warn!("Ignoring invalid trusted proxy address: {}", raw);
                        None
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self) {
        self.timestamps.push(Utc::now());
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Sliding-window limiter for credential endpoints, keyed by client address.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Key a request is throttled under: the peer address, or the forwarded
    /// client address when the peer is a trusted proxy.
    pub fn client_key(&self, req: &HttpRequest) -> String {
        let Some(peer) = req.peer_addr().map(|addr| addr.ip()) else {
            return "unknown".to_string();
        };

        if self.config.trusted_proxies.contains(&peer) {
            if let Some(forwarded) = req.connection_info().realip_remote_addr() {
                return match forwarded.parse::<SocketAddr>() {
                    Ok(addr) => addr.ip().to_string(),
                    Err(_) => forwarded.to_string(),
                };
            }
        }
        peer.to_string()
    }

    /// Records an attempt and returns whether it is within the limit.
    pub async fn check_rate_limit(&self, key: &str) -> bool {
        let mut windows = self.windows.write().await;

        let window = windows.entry(key.to_string()).or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(self.config.window_size);

        if window.request_count() < self.config.max_attempts as usize {
            window.add_request();
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;

        // Remove windows with no recent requests
        windows.retain(|_, window| {
            window.cleanup_old_requests(self.config.window_size);
            !window.timestamps.is_empty()
        });
    }
}
