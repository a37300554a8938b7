//! Sync session domain models.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tradesync_core::{ConsolidatedGroup, ExtractionRecord, RawOperation};

/// Bearer token handed to the page fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Whether the token stays valid for at least `margin` more.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
        self.expires_at > Utc::now() + margin
    }
}

/// One page of raw operations from the fetcher.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub operations: Vec<RawOperation>,
    /// Token for the next page; `None` means this was the last page.
    pub next_page_token: Option<String>,
    /// Server-estimated total operation count, when known.
    pub estimated_total: Option<u64>,
}

/// Lifecycle status of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Idle,
    Fetching,
    Staged,
    Committed,
    Failed,
    Canceled,
}

/// Per-invocation sync session record.
///
/// Created when a sync starts, mutated only by the controller that owns it,
/// and consumed when the outcome is surfaced to the caller. The staging
/// buffer is never visible to the baseline.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub id: String,
    pub status: SessionStatus,
    pub pages_fetched: usize,
    pub staging: Vec<RawOperation>,
    pub retry_attempts: u32,
    pub rate_limit_wait: Option<Duration>,
    pub last_error: Option<String>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SessionStatus::Idle,
            pages_fetched: 0,
            staging: Vec::new(),
            retry_attempts: 0,
            rate_limit_wait: None,
            last_error: None,
        }
    }

    pub fn begin_fetching(&mut self) {
        self.status = SessionStatus::Fetching;
    }

    pub fn stage(&mut self) {
        self.status = SessionStatus::Staged;
    }

    pub fn commit(&mut self) {
        self.status = SessionStatus::Committed;
    }

    /// Marks the session failed and discards the staging buffer.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.last_error = Some(error.into());
        self.staging.clear();
    }

    /// Marks the session canceled and discards the staging buffer.
    pub fn cancel(&mut self) {
        self.status = SessionStatus::Canceled;
        self.staging.clear();
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for sync sessions.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum fetch attempts per page before the session fails.
    pub max_retry_attempts: u32,
    /// First backoff delay; doubles per retry.
    pub initial_backoff: Duration,
    /// Maximum number of pages to fetch per session (safety limit).
    pub max_pages: usize,
    /// Wait hint surfaced on a rate limit when the server supplies none.
    pub default_rate_limit_wait: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_pages: 10_000,
            default_rate_limit_wait: Duration::from_secs(60),
        }
    }
}

/// Session metadata handed to the commit sink, exactly once per
/// successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMetadata {
    pub session_id: String,
    pub trading_day: NaiveDate,
    pub new_operations_count: usize,
    pub new_orders_count: usize,
    pub retry_attempts: u32,
}

/// Result of a committed sync pass.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub session_id: String,
    pub trading_day: NaiveDate,
    pub pages_fetched: usize,
    pub retry_attempts: u32,
    pub new_operations_count: usize,
    pub new_orders_count: usize,
    pub extracted_count: usize,
    pub skipped_count: usize,
    /// Audit trail of extraction decisions.
    pub extraction: Vec<ExtractionRecord>,
    /// Per-order view of the freshly synced batch.
    pub raw_view: Vec<ConsolidatedGroup>,
    /// Per-instrument view of the freshly synced batch.
    pub averaged_view: Vec<ConsolidatedGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradesync_core::BrokerRawOperation;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.max_pages, 10_000);
        assert_eq!(config.default_rate_limit_wait, Duration::from_secs(60));
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = SyncSession::new();
        assert!(!session.id.is_empty());
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.pages_fetched, 0);
        assert!(session.staging.is_empty());
        assert!(session.last_error.is_none());
    }

    #[test]
    fn test_session_failure_discards_staging() {
        let mut session = SyncSession::new();
        session.begin_fetching();
        session
            .staging
            .push(RawOperation::Broker(BrokerRawOperation::default()));

        session.fail("network down");
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.last_error.as_deref(), Some("network down"));
        assert!(session.staging.is_empty());
    }

    #[test]
    fn test_session_cancel_discards_staging() {
        let mut session = SyncSession::new();
        session.begin_fetching();
        session
            .staging
            .push(RawOperation::Broker(BrokerRawOperation::default()));

        session.cancel();
        assert_eq!(session.status, SessionStatus::Canceled);
        assert!(session.staging.is_empty());
    }

    #[test]
    fn test_token_freshness_window() {
        let fresh = AuthToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        assert!(fresh.is_fresh(Duration::from_secs(60)));

        let stale = AuthToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(10),
        };
        assert!(!stale.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn test_session_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Fetching).unwrap(),
            "\"FETCHING\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Committed).unwrap(),
            "\"COMMITTED\""
        );
    }
}
