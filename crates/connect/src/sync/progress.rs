//! Progress events for sync sessions.
//!
//! The controller writes page-level progress to a channel; consumers (UI,
//! tests) read an ordered event stream. Progress is observational only - a
//! dropped receiver never affects the sync outcome.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Payload emitted after each successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Index of the page just fetched (0-based).
    pub page_index: usize,
    /// Total operations staged so far.
    pub operations_count: usize,
    /// Pages fetched so far.
    pub pages_fetched: usize,
    /// Server-estimated total operation count, when known.
    pub estimated_total: Option<u64>,
}

/// Write side of the progress channel.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl ProgressSender {
    /// Creates a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sender that drops every event, for contexts where progress
    /// reporting is not needed.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Best-effort send: a closed or absent receiver is ignored.
    pub fn send(&self, progress: SyncProgress) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(progress);
        }
    }
}
