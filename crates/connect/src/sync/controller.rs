//! Sync session controller.
//!
//! Drives one full synchronization pass: token validation, paginated fetch
//! with bounded retry and rate-limit handling, staged accumulation, and a
//! single atomic commit - or full rollback on failure/cancellation. Either
//! every fetched page is normalized, extracted, deduped, and committed
//! together, or none are; the committed baseline is never partially
//! updated.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};

use tradesync_core::{
    consolidate_averaged, consolidate_raw, dedupe, extract_cancelled_fills, normalize, Operation,
    OperationSource, Result, SyncError,
};

use super::models::{CommitMetadata, SyncConfig, SyncReport, SyncSession};
use super::progress::{ProgressSender, SyncProgress};
use super::retry::{fetch_page_with_retry, CancelToken};
use super::traits::{AuthRefresher, CommitSink, PageFetcher};

/// Orchestrates sync sessions against the brokerage API.
///
/// At most one session is active at a time: the staging buffer and session
/// record are owned by the running invocation, so a second `run_sync` while
/// one is in progress is rejected rather than interleaved.
pub struct SyncController {
    fetcher: Arc<dyn PageFetcher>,
    auth: Arc<dyn AuthRefresher>,
    commit_sink: Arc<dyn CommitSink>,
    progress: ProgressSender,
    config: SyncConfig,
    in_flight: AtomicBool,
}

/// Releases the single-flight guard on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncController {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        auth: Arc<dyn AuthRefresher>,
        commit_sink: Arc<dyn CommitSink>,
        progress: ProgressSender,
        config: SyncConfig,
    ) -> Self {
        Self {
            fetcher,
            auth,
            commit_sink,
            progress,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs a full sync pass for one trading day.
    ///
    /// `baseline` is the committed operation list; it is read, never
    /// mutated. On success the commit sink receives a fully merged
    /// replacement list exactly once, and the report carries the two
    /// consolidation views of the freshly synced batch.
    pub async fn run_sync(
        &self,
        trading_day: NaiveDate,
        baseline: &[Operation],
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Validation(
                "a sync session is already in progress".to_string(),
            ));
        }
        let _guard = InFlightGuard(&self.in_flight);

        let mut session = SyncSession::new();
        info!("Starting sync session {} for {}", session.id, trading_day);

        let result = self
            .run_session(trading_day, baseline, cancel, &mut session)
            .await;

        match &result {
            Ok(report) => {
                session.commit();
                info!(
                    "Sync session {} committed: {} new operations across {} orders ({} pages, {} retries)",
                    session.id,
                    report.new_operations_count,
                    report.new_orders_count,
                    report.pages_fetched,
                    report.retry_attempts
                );
            }
            Err(SyncError::Canceled) => {
                session.cancel();
                info!(
                    "Sync session {} canceled after {} pages; staging discarded",
                    session.id, session.pages_fetched
                );
            }
            Err(err) => {
                session.fail(err.to_string());
                warn!(
                    "Sync session {} failed ({:?}): {}",
                    session.id,
                    err.category(),
                    err
                );
            }
        }

        result
    }

    async fn run_session(
        &self,
        trading_day: NaiveDate,
        baseline: &[Operation],
        cancel: &CancelToken,
        session: &mut SyncSession,
    ) -> Result<SyncReport> {
        // Token validation happens before the first fetch; a refresh
        // failure ends the session with zero pages fetched.
        let token = self
            .auth
            .ensure_valid_token(None)
            .await
            .map_err(|e| SyncError::TokenExpired(e.to_string()))?;

        session.begin_fetching();

        let mut page_token: Option<String> = None;
        let mut estimated_total: Option<u64> = None;
        let mut staged_count: usize = 0;

        loop {
            // Cancellation checkpoint: never mid-page.
            if cancel.is_canceled() {
                return Err(SyncError::Canceled);
            }

            if session.pages_fetched >= self.config.max_pages {
                return Err(SyncError::Validation(format!(
                    "pagination exceeded max pages ({})",
                    self.config.max_pages
                )));
            }

            let page = fetch_page_with_retry(
                self.fetcher.as_ref(),
                &token,
                trading_day,
                page_token.as_deref(),
                &self.config,
                session,
            )
            .await?;

            // A server echoing the same token back would loop forever.
            if page.next_page_token.is_some() && page.next_page_token == page_token {
                return Err(SyncError::Validation(
                    "pagination appears stuck (same page token returned twice)".to_string(),
                ));
            }

            session.pages_fetched += 1;
            staged_count += page.operations.len();
            estimated_total = estimated_total.or(page.estimated_total);

            debug!(
                "Fetched page {} with {} operations (staged total {})",
                session.pages_fetched,
                page.operations.len(),
                staged_count
            );

            self.progress.send(SyncProgress {
                page_index: session.pages_fetched - 1,
                operations_count: staged_count,
                pages_fetched: session.pages_fetched,
                estimated_total,
            });

            session.staging.extend(page.operations);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        session.stage();

        // The full batch moves through the pipeline as one unit.
        let imported_at = Utc::now();
        let normalized: Vec<Operation> = session
            .staging
            .drain(..)
            .map(|raw| normalize(raw, imported_at))
            .collect();

        let extraction = extract_cancelled_fills(normalized);

        // The portion of the baseline for this source and trading day is
        // replaced wholesale; everything else is retained and used as the
        // dedup reference so cross-source duplicates are absorbed.
        let retained: Vec<Operation> = baseline
            .iter()
            .filter(|op| {
                !(op.source == OperationSource::Broker && op.trading_day() == trading_day)
            })
            .cloned()
            .collect();

        let mut fresh = dedupe(&retained, extraction.operations);

        let before_validation = fresh.len();
        fresh.retain(|op| op.is_final());
        if fresh.len() < before_validation {
            warn!(
                "Discarded {} non-final operations before consolidation",
                before_validation - fresh.len()
            );
        }

        let raw_view = consolidate_raw(&fresh);
        let averaged_view = consolidate_averaged(&fresh);

        let new_operations_count = fresh.len();
        let new_orders_count = fresh
            .iter()
            .map(|op| op.order_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        // Final checkpoint before the commit becomes observable.
        if cancel.is_canceled() {
            return Err(SyncError::Canceled);
        }

        let mut merged = retained;
        merged.extend(fresh);

        let metadata = CommitMetadata {
            session_id: session.id.clone(),
            trading_day,
            new_operations_count,
            new_orders_count,
            retry_attempts: session.retry_attempts,
        };

        self.commit_sink
            .commit(merged, metadata)
            .await
            .map_err(SyncError::Commit)?;

        Ok(SyncReport {
            session_id: session.id.clone(),
            trading_day,
            pages_fetched: session.pages_fetched,
            retry_attempts: session.retry_attempts,
            new_operations_count,
            new_orders_count,
            extracted_count: extraction.extracted_count,
            skipped_count: extraction.skipped_count,
            extraction: extraction.metadata,
            raw_view,
            averaged_view,
        })
    }
}
