//! Consolidation module - reducing fills into net positions.

mod engine;

pub use engine::{consolidate_averaged, consolidate_raw, ConsolidatedGroup};
