//! Core error types for the sync and consolidation engine.
//!
//! Every error is classified into an [`ErrorCategory`] which drives the
//! controller's retry policy. The core never formats user-facing messages;
//! callers get the category plus a structured message and decide themselves.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type alias for Result using our SyncError type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Classification for the session retry policy.
///
/// | Category | Controller behavior |
/// |----------|---------------------|
/// | `Auth` | Fatal to the session, never retried |
/// | `RateLimit` | Surfaced with a wait hint, not retried past one attempt |
/// | `Transient` | Retried with exponential backoff up to the attempt ceiling |
/// | `Validation` | Raised immediately, no retry |
/// | `Canceled` | Not an error; follows the same rollback path as failure |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Auth,
    RateLimit,
    Transient,
    Validation,
    Canceled,
}

/// Errors reported by the page fetcher collaborator.
///
/// The concrete HTTP client maps transport failures into these variants so
/// the controller can apply the correct policy without inspecting status
/// codes itself.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The token was rejected or could not be refreshed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The server throttled the request (HTTP 429).
    /// Carries the server-supplied wait hint when a `Retry-After` was present.
    #[error("Rate limited by server")]
    RateLimited {
        /// Server-supplied wait duration, if any.
        retry_after: Option<Duration>,
    },

    /// Network-level failure (connect, timeout, broken transfer).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a 5xx status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The request itself was malformed (4xx other than auth/throttle).
    #[error("Bad request {status}: {message}")]
    BadRequest { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns the retry classification for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Unauthorized(_) => ErrorCategory::Auth,
            ApiError::RateLimited { .. } => ErrorCategory::RateLimit,
            ApiError::Network(_) | ApiError::Server { .. } => ErrorCategory::Transient,
            ApiError::BadRequest { .. } | ApiError::Decode(_) => ErrorCategory::Validation,
        }
    }
}

/// Root error type for a sync session.
///
/// A failed or canceled session always discards the staging buffer in full;
/// these variants describe why the pass did not commit.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The auth token was invalid or expired and could not be refreshed.
    #[error("Token expired: {0}")]
    TokenExpired(String),

    /// The server throttled the session. `wait` is the server-supplied hint
    /// or the configured default; the caller decides whether to re-invoke.
    #[error("Rate limited, retry after {}ms", wait.as_millis())]
    RateLimited { wait: Duration },

    /// Transient fetch failures exhausted the retry ceiling.
    #[error("Page fetch failed after {attempts} attempts: {message}")]
    FetchFailed { attempts: u32, message: String },

    /// Malformed configuration or request, or inconsistent pagination.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller canceled the session at a checkpoint.
    #[error("Sync canceled")]
    Canceled,

    /// The commit sink rejected the merged result.
    #[error("Commit failed: {0}")]
    Commit(String),
}

impl SyncError {
    /// Returns the classification for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::TokenExpired(_) => ErrorCategory::Auth,
            SyncError::RateLimited { .. } => ErrorCategory::RateLimit,
            SyncError::FetchFailed { .. } | SyncError::Commit(_) => ErrorCategory::Transient,
            SyncError::Validation(_) => ErrorCategory::Validation,
            SyncError::Canceled => ErrorCategory::Canceled,
        }
    }
}

impl From<SyncError> for String {
    fn from(err: SyncError) -> Self {
        err.to_string()
    }
}
