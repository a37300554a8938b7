//! Duplicate detection for operations arriving from multiple sources.
//!
//! Provider record IDs are unreliable across sources - a flat-file import
//! has no execution IDs at all - so matching is two-tier: an authoritative
//! primary-key match when both records carry one, and a composite
//! fingerprint over the economic content otherwise. Timestamps are compared
//! at 1-second buckets to absorb clock skew and rounding differences
//! between sources.

use std::collections::HashSet;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::constants::DEDUPE_BUCKET_SECS;

use super::operations_model::Operation;

/// Whether this record carries the authoritative identifier pair.
fn has_primary_key(op: &Operation) -> bool {
    !op.order_id.is_empty() && op.operation_id.is_some()
}

fn primary_key(op: &Operation) -> Option<(String, String)> {
    if has_primary_key(op) {
        Some((op.order_id.clone(), op.operation_id.clone().unwrap_or_default()))
    } else {
        None
    }
}

/// Second-resolution time bucket for the composite match.
fn time_bucket(op: &Operation) -> i64 {
    op.trade_timestamp.timestamp().div_euclid(DEDUPE_BUCKET_SECS)
}

/// Normalize decimal to a consistent string format (trailing zeros removed).
fn normalize_decimal(d: Decimal) -> String {
    d.normalize().to_string()
}

/// Composite fingerprint over the economic content of an operation.
///
/// SHA-256 of `(symbol, optionKind, side, strike, expiration, quantity,
/// price, time bucket)` with `|` separators, hex encoded.
pub fn composite_fingerprint(op: &Operation) -> String {
    let mut hasher = Sha256::new();

    hasher.update(op.symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{:?}", op.option_kind).as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{:?}", op.side).as_bytes());
    hasher.update(b"|");
    if let Some(strike) = op.strike {
        hasher.update(normalize_decimal(strike).as_bytes());
    }
    hasher.update(b"|");
    if let Some(expiration) = op.expiration {
        hasher.update(expiration.format("%Y-%m-%d").to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(normalize_decimal(op.quantity).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_decimal(op.price).as_bytes());
    hasher.update(b"|");
    hasher.update(time_bucket(op).to_string().as_bytes());

    hex::encode(hasher.finalize())
}

fn composite_matches(a: &Operation, b: &Operation) -> bool {
    a.symbol == b.symbol
        && a.option_kind == b.option_kind
        && a.side == b.side
        && a.strike == b.strike
        && a.expiration == b.expiration
        && a.quantity == b.quantity
        && a.price == b.price
        && time_bucket(a) == time_bucket(b)
}

/// Decides whether two operations represent the same economic event.
///
/// When both records carry the `(orderId, operationId)` pair, equality on
/// that pair is authoritative - a mismatch is final even if the economics
/// line up. Otherwise the composite match applies.
pub fn is_duplicate(a: &Operation, b: &Operation) -> bool {
    if has_primary_key(a) && has_primary_key(b) {
        return a.order_id == b.order_id && a.operation_id == b.operation_id;
    }
    composite_matches(a, b)
}

/// Index over a baseline set, so dedup of large batches avoids the O(n*m)
/// pairwise scan.
pub struct BaselineIndex {
    /// `(orderId, operationId)` pairs of baseline records that carry them.
    primary: HashSet<(String, String)>,
    /// Composite fingerprints of every baseline record.
    composite_all: HashSet<String>,
    /// Composite fingerprints of baseline records without a primary key.
    composite_unkeyed: HashSet<String>,
}

impl BaselineIndex {
    pub fn build(baseline: &[Operation]) -> Self {
        let mut primary = HashSet::new();
        let mut composite_all = HashSet::new();
        let mut composite_unkeyed = HashSet::new();

        for op in baseline {
            let fingerprint = composite_fingerprint(op);
            if let Some(key) = primary_key(op) {
                primary.insert(key);
            } else {
                composite_unkeyed.insert(fingerprint.clone());
            }
            composite_all.insert(fingerprint);
        }

        Self {
            primary,
            composite_all,
            composite_unkeyed,
        }
    }

    /// Whether the baseline already contains a duplicate of `op`.
    ///
    /// A keyed incoming record matches a keyed baseline record only on the
    /// primary pair; against unkeyed baseline records the composite
    /// fingerprint still applies. An unkeyed incoming record matches any
    /// baseline record on the composite fingerprint.
    pub fn contains(&self, op: &Operation) -> bool {
        if let Some(key) = primary_key(op) {
            self.primary.contains(&key)
                || self.composite_unkeyed.contains(&composite_fingerprint(op))
        } else {
            self.composite_all.contains(&composite_fingerprint(op))
        }
    }
}

/// Returns only the incoming records with no duplicate in the baseline.
pub fn dedupe(baseline: &[Operation], incoming: Vec<Operation>) -> Vec<Operation> {
    let index = BaselineIndex::build(baseline);
    let before = incoming.len();

    let kept: Vec<Operation> = incoming
        .into_iter()
        .filter(|op| !index.contains(op))
        .collect();

    if kept.len() < before {
        log::debug!(
            "Dedupe dropped {} of {} incoming operations",
            before - kept.len(),
            before
        );
    }
    kept
}
