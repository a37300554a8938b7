//! Tradesync Connect - brokerage connectivity and sync orchestration.
//!
//! This crate drives the pure domain logic in `tradesync-core` against a
//! live brokerage API: an HTTP page fetcher, token freshness checks, and
//! the [`sync::SyncController`] session state machine.

pub mod client;
pub mod sync;

pub use client::{BrokerHttpClient, StaticTokenRefresher};
pub use sync::{
    AuthRefresher, AuthToken, CancelToken, CommitMetadata, CommitSink, FetchedPage, PageFetcher,
    ProgressSender, SessionStatus, SyncConfig, SyncController, SyncProgress, SyncReport,
};
