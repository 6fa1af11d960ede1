//! Client-side session handling: a persisted session cache verified against
//! the server on load, plus viewport tracking for device-specific layouts.

pub mod audit;
pub mod cache;
pub mod storage;
pub mod verifier;
pub mod viewport;

pub use audit::{AuditEvent, AuditObserver, TracingAudit};
pub use cache::{
    CachedSession, LoadOutcome, NavigationHandle, Redirect, SessionCache, SessionState, View,
    SESSION_STORAGE_KEY, SESSION_TTL_HOURS,
};
pub use storage::{CacheStorage, FileStorage, MemoryStorage};
pub use verifier::{ApiClient, SessionVerifier};
pub use viewport::ViewportTracker;
