//! Authentication module for the bingo server
//!
//! This module handles credential checks, bearer session issue and
//! verification, and the `/api` handlers built on them.

pub mod extractor;
pub mod handlers;
pub mod password;
pub mod validation;
mod rate_limit;
mod service;

pub use extractor::AuthenticatedUser;
pub use rate_limit::{RateLimiter, RateLimitConfig};
pub use service::{token_digest, AuthService, Claims, IssuedSession};
