//! Sync session orchestration: controller, collaborator traits, retry
//! policy, and progress reporting.

mod controller;
mod models;
mod progress;
mod retry;
mod traits;

pub use controller::SyncController;
pub use models::{
    AuthToken, CommitMetadata, FetchedPage, SessionStatus, SyncConfig, SyncReport, SyncSession,
};
pub use progress::{ProgressSender, SyncProgress};
pub use retry::CancelToken;
pub use traits::{AuthRefresher, CommitSink, PageFetcher};
