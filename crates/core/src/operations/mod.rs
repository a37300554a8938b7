//! Operations module - canonical records, normalization, dedup, extraction.

mod dedupe;
mod extractor;
mod normalizer;
mod operations_model;

#[cfg(test)]
mod operations_model_tests;

pub use dedupe::{composite_fingerprint, dedupe, is_duplicate, BaselineIndex};
pub use extractor::{
    extract_cancelled_fills, ExtractionOutcome, ExtractionRecord, ReplacementChainIndex,
    SkipReason,
};
pub use normalizer::{
    normalize, parse_decimal_tolerant, BrokerRawOperation, CsvRawOperation, RawOperation,
};
pub use operations_model::{
    InstrumentKey, Operation, OperationSide, OperationSource, OptionKind, OrderKey, OrderStatus,
};
