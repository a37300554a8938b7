//! Traits defining the contracts for sync collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;

use tradesync_core::errors::ApiError;
use tradesync_core::Operation;

use super::models::{AuthToken, CommitMetadata, FetchedPage};

/// Trait for fetching operation pages from the brokerage API.
///
/// Implementations must signal transient vs. auth vs. rate-limit failures
/// distinguishably (via [`ApiError::category`]) so the controller can apply
/// the correct retry policy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        token: &AuthToken,
        trading_day: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<FetchedPage, ApiError>;
}

/// Trait for validating/refreshing the auth token, called once per sync
/// pass before fetching.
#[async_trait]
pub trait AuthRefresher: Send + Sync {
    async fn ensure_valid_token(&self, current: Option<&AuthToken>) -> Result<AuthToken, ApiError>;
}

/// Trait for receiving the final merged operation list, exactly once per
/// successful sync. The controller never mutates the committed baseline in
/// place; the sink receives a fully built replacement.
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn commit(
        &self,
        operations: Vec<Operation>,
        metadata: CommitMetadata,
    ) -> Result<(), String>;
}
