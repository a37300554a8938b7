//! Tradesync Core - Domain entities, reconciliation, and consolidation.
//!
//! This crate contains the pure business logic of the sync engine:
//! normalization of raw brokerage records, deduplication against a
//! baseline, cancelled-order fill extraction, and consolidation into
//! net positions. It performs no I/O; the `connect` crate drives it.

pub mod consolidation;
pub mod constants;
pub mod errors;
pub mod operations;

// Re-export common types
pub use consolidation::*;
pub use operations::*;

// Re-export error types
pub use errors::ErrorCategory;
pub use errors::Result;
pub use errors::SyncError;
