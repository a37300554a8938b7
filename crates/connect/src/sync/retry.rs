//! Retry, backoff, and cancellation primitives for the page loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use tradesync_core::{ErrorCategory, SyncError};

use super::models::{AuthToken, FetchedPage, SyncConfig, SyncSession};
use super::traits::PageFetcher;

/// Cooperative cancellation handle.
///
/// Cancellation is checked at suspension points (before each page fetch,
/// before commit), never mid-page.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Exponential backoff with a fixed attempt ceiling.
pub(crate) struct Backoff {
    initial: Duration,
    max_attempts: u32,
    pub attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max_attempts,
            attempt: 0,
        }
    }

    /// The delay before the next retry, or `None` once the ceiling is hit.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt + 1 >= self.max_attempts {
            return None;
        }
        let delay = self.initial * 2u32.pow(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}

/// Fetches one page, retrying transient failures with exponential backoff.
///
/// Auth and validation failures abort immediately. A rate limit suspends
/// all further attempts and surfaces the server wait hint (or the
/// configured default) so the caller decides whether to re-invoke.
pub(crate) async fn fetch_page_with_retry(
    fetcher: &dyn PageFetcher,
    token: &AuthToken,
    trading_day: NaiveDate,
    page_token: Option<&str>,
    config: &SyncConfig,
    session: &mut SyncSession,
) -> Result<FetchedPage, SyncError> {
    let mut backoff = Backoff::new(config.initial_backoff, config.max_retry_attempts);

    loop {
        match fetcher.fetch_page(token, trading_day, page_token).await {
            Ok(page) => return Ok(page),
            Err(err) => match err.category() {
                ErrorCategory::Transient => {
                    if let Some(delay) = backoff.next_backoff() {
                        log::warn!(
                            "Transient fetch error on page {} (attempt {}): {}. Retrying in {}ms",
                            session.pages_fetched,
                            backoff.attempt,
                            err,
                            delay.as_millis()
                        );
                        session.retry_attempts += 1;
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(SyncError::FetchFailed {
                            attempts: backoff.attempt + 1,
                            message: err.to_string(),
                        });
                    }
                }
                ErrorCategory::RateLimit => {
                    let wait = match err {
                        tradesync_core::errors::ApiError::RateLimited {
                            retry_after: Some(hint),
                        } => hint,
                        _ => config.default_rate_limit_wait,
                    };
                    session.rate_limit_wait = Some(wait);
                    return Err(SyncError::RateLimited { wait });
                }
                ErrorCategory::Auth => {
                    return Err(SyncError::TokenExpired(err.to_string()));
                }
                ErrorCategory::Validation | ErrorCategory::Canceled => {
                    return Err(SyncError::Validation(err.to_string()));
                }
            },
        }
    }
}
