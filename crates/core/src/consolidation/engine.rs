//! Consolidation (averaging) engine.
//!
//! Reduces deduplicated, extracted fills into net signed positions with
//! volume-weighted average pricing. Two deterministic views over the same
//! operation set:
//!
//! - **Raw**: grouped by order identity `(orderId, optionKind)` - legs of
//!   one order net together, distinct orders stay visible as separate rows.
//! - **Averaged**: grouped by full instrument identity across all orders -
//!   one row per instrument, net directional exposure.
//!
//! Intermediate math is exact `Decimal`; rounding happens only at the
//! reporting boundary via [`ConsolidatedGroup::rounded`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::REPORT_DECIMAL_PRECISION;
use crate::operations::{InstrumentKey, Operation, OptionKind};

/// One consolidated row: net signed quantity, volume-weighted average
/// price, and the contributing fills kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedGroup {
    /// Instrument identity of the group. In the raw view all legs share an
    /// order, in the averaged view all legs share an instrument; either way
    /// the identity comes from the first contributing leg.
    pub key: InstrumentKey,
    /// Order id for raw-view rows; `None` in the averaged view.
    pub order_id: Option<String>,
    /// Net signed quantity: positive = net long, negative = net short.
    pub total_quantity: Decimal,
    /// Volume-weighted average price over absolute quantities.
    pub average_price: Decimal,
    /// Contributing fills, each with its own side/qty/price for audit.
    pub legs: Vec<Operation>,
}

impl ConsolidatedGroup {
    fn from_legs(key: InstrumentKey, order_id: Option<String>, legs: Vec<Operation>) -> Self {
        let total_quantity: Decimal = legs.iter().map(|leg| leg.signed_quantity()).sum();

        // Weight by absolute quantity so opposing legs don't cancel out of
        // the price denominator.
        let total_value: Decimal = legs.iter().map(|leg| leg.quantity * leg.price).sum();
        let total_volume: Decimal = legs.iter().map(|leg| leg.quantity).sum();
        let average_price = if total_volume > Decimal::ZERO {
            total_value / total_volume
        } else {
            Decimal::ZERO
        };

        Self {
            key,
            order_id,
            total_quantity,
            average_price,
            legs,
        }
    }

    /// Total absolute volume across the legs.
    pub fn total_volume(&self) -> Decimal {
        self.legs.iter().map(|leg| leg.quantity).sum()
    }

    /// Reporting view of this group, rounded to 4 decimal places.
    /// Never applied mid-calculation.
    pub fn rounded(&self) -> (Decimal, Decimal) {
        (
            self.total_quantity.round_dp(REPORT_DECIMAL_PRECISION),
            self.average_price.round_dp(REPORT_DECIMAL_PRECISION),
        )
    }
}

/// Raw view: nets same-order legs, keeps distinct orders as separate rows.
/// Output ordering is deterministic (sorted by order id, then option kind).
pub fn consolidate_raw(operations: &[Operation]) -> Vec<ConsolidatedGroup> {
    let mut groups: BTreeMap<(String, OptionKind), Vec<Operation>> = BTreeMap::new();
    for op in operations {
        groups
            .entry((op.order_id.clone(), op.option_kind))
            .or_default()
            .push(op.clone());
    }

    groups
        .into_iter()
        .map(|((order_id, _), legs)| {
            let key = legs[0].instrument_key();
            ConsolidatedGroup::from_legs(key, Some(order_id), legs)
        })
        .collect()
}

/// Averaged view: one row per instrument across all orders.
/// Output ordering is deterministic (sorted by instrument key).
pub fn consolidate_averaged(operations: &[Operation]) -> Vec<ConsolidatedGroup> {
    let mut groups: BTreeMap<InstrumentKey, Vec<Operation>> = BTreeMap::new();
    for op in operations {
        groups.entry(op.instrument_key()).or_default().push(op.clone());
    }

    groups
        .into_iter()
        .map(|(key, legs)| ConsolidatedGroup::from_legs(key, None, legs))
        .collect()
}
