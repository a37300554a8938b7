//! Cancelled-order fill extraction.
//!
//! A brokerage may close an order's lifecycle with `CANCELLED` while
//! `cumulativeQty > 0`: the order was partially executed before the cancel,
//! and that execution is real value that must be preserved as a fill rather
//! than discarded with the dead order. The complication is cancel/replace:
//! an amended order emits a chain of messages that all describe the same
//! economic fill, so extraction must pick exactly one node per chain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::operations_model::{Operation, OperationSide, OrderStatus};

/// Why a cancelled-with-fill operation was not extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Free text marks the order as replaced; terminal data lives elsewhere.
    ReplacedText,
    /// The successor is itself cancelled with a fill; its extraction covers
    /// the value.
    SuccessorCancelledWithFill,
    /// The successor filled; it already represents the full execution.
    SuccessorFilled,
}

/// Audit record for one extraction decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub order_id: String,
    pub symbol: String,
    pub side: OperationSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    /// `None` means the fill was extracted; otherwise why it was skipped.
    pub skipped: Option<SkipReason>,
}

/// Result of running the extractor over a full normalized batch.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub operations: Vec<Operation>,
    pub extracted_count: usize,
    pub skipped_count: usize,
    pub metadata: Vec<ExtractionRecord>,
}

/// Replacement-chain index for one batch, precomputed once.
///
/// Keyed by `originalClientOrderId`: the successor of an operation is the
/// batch member whose back-reference names that operation's client order id.
pub struct ReplacementChainIndex {
    successors: HashMap<String, usize>,
}

impl ReplacementChainIndex {
    pub fn build(operations: &[Operation]) -> Self {
        let mut successors = HashMap::new();
        for (idx, op) in operations.iter().enumerate() {
            if let Some(ref original) = op.original_client_order_id {
                if !original.is_empty() {
                    successors.insert(original.clone(), idx);
                }
            }
        }
        Self { successors }
    }

    /// The operation that superseded `op`, if it is in this batch.
    pub fn successor_of<'a>(&self, op: &Operation, batch: &'a [Operation]) -> Option<&'a Operation> {
        let client_order_id = op.client_order_id.as_deref()?;
        self.successors
            .get(client_order_id)
            .map(|&idx| &batch[idx])
    }
}

fn cumulative_qty(op: &Operation) -> Decimal {
    op.cumulative_qty.unwrap_or(Decimal::ZERO)
}

fn record_for(op: &Operation, quantity: Decimal, price: Decimal, skipped: Option<SkipReason>) -> ExtractionRecord {
    ExtractionRecord {
        order_id: op.order_id.clone(),
        symbol: op.symbol.clone(),
        side: op.side,
        quantity,
        price,
        value: quantity * price,
        skipped,
    }
}

/// Synthesizes a `FILLED` operation from a cancelled order's partial
/// execution. Identifiers are kept so re-extraction on a later sync pass
/// dedupes against the committed record.
fn synthesize_fill(op: &Operation) -> Operation {
    let quantity = cumulative_qty(op);
    let price = op.average_price.unwrap_or(op.price);
    Operation {
        quantity,
        price,
        status: OrderStatus::Filled,
        extracted: true,
        original_status: Some(op.status),
        ..op.clone()
    }
}

/// Detects cancelled-with-partial-fill and replaced patterns across the
/// batch and synthesizes the fills that would otherwise be discarded.
///
/// Non-cancelled operations pass through unchanged; a cancelled order with
/// no executed quantity is simply dropped.
pub fn extract_cancelled_fills(batch: Vec<Operation>) -> ExtractionOutcome {
    let chain = ReplacementChainIndex::build(&batch);
    let mut outcome = ExtractionOutcome::default();

    for op in &batch {
        if op.status != OrderStatus::Cancelled {
            outcome.operations.push(op.clone());
            continue;
        }

        let executed = cumulative_qty(op);
        if executed <= Decimal::ZERO {
            // Nothing filled before the cancel: no value to recover.
            log::debug!("Dropping cancelled order {} with no executed quantity", op.order_id);
            continue;
        }

        let price = op.average_price.unwrap_or(op.price);

        if op.is_marked_replaced() {
            // Terminal data for this execution lives on the replacing order.
            // If that order is outside the current batch the value is lost
            // here; keep it visible in the audit trail.
            if chain.successor_of(op, &batch).is_none() {
                log::warn!(
                    "Cancelled order {} marked replaced but successor absent from batch; skipping {} @ {}",
                    op.order_id, executed, price
                );
            }
            outcome.skipped_count += 1;
            outcome
                .metadata
                .push(record_for(op, executed, price, Some(SkipReason::ReplacedText)));
            continue;
        }

        if let Some(successor) = chain.successor_of(op, &batch) {
            if successor.status == OrderStatus::Cancelled
                && cumulative_qty(successor) > Decimal::ZERO
            {
                outcome.skipped_count += 1;
                outcome.metadata.push(record_for(
                    op,
                    executed,
                    price,
                    Some(SkipReason::SuccessorCancelledWithFill),
                ));
                continue;
            }
            if successor.status == OrderStatus::Filled {
                outcome.skipped_count += 1;
                outcome.metadata.push(record_for(
                    op,
                    executed,
                    price,
                    Some(SkipReason::SuccessorFilled),
                ));
                continue;
            }
        }

        let fill = synthesize_fill(op);
        log::info!(
            "Extracted fill from cancelled order {}: {:?} {} {} @ {}",
            fill.order_id,
            fill.side,
            fill.quantity,
            fill.symbol,
            fill.price
        );
        outcome
            .metadata
            .push(record_for(op, fill.quantity, fill.price, None));
        outcome.extracted_count += 1;
        outcome.operations.push(fill);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::normalizer::{normalize, BrokerRawOperation, RawOperation};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct Raw {
        order_id: &'static str,
        client_order_id: Option<&'static str>,
        original_client_order_id: Option<&'static str>,
        status: &'static str,
        quantity: Decimal,
        cumulative_qty: Option<Decimal>,
        average_price: Option<Decimal>,
        text: Option<&'static str>,
    }

    impl Default for Raw {
        fn default() -> Self {
            Self {
                order_id: "O-1",
                client_order_id: None,
                original_client_order_id: None,
                status: "FILLED",
                quantity: dec!(10),
                cumulative_qty: None,
                average_price: None,
                text: None,
            }
        }
    }

    fn op(raw: Raw) -> Operation {
        normalize(
            RawOperation::Broker(BrokerRawOperation {
                order_id: Some(raw.order_id.to_string()),
                client_order_id: raw.client_order_id.map(String::from),
                original_client_order_id: raw.original_client_order_id.map(String::from),
                symbol: Some("GFGC40000O".to_string()),
                option_type: Some("CALL".to_string()),
                side: Some("BUY".to_string()),
                quantity: Some(raw.quantity),
                price: Some(dec!(40)),
                status: Some(raw.status.to_string()),
                cumulative_qty: raw.cumulative_qty,
                average_price: raw.average_price,
                text: raw.text.map(String::from),
                trade_timestamp: Some(1_700_000_000_000),
                ..Default::default()
            }),
            Utc::now(),
        )
    }

    #[test]
    fn test_unlinked_cancelled_with_fill_is_extracted() {
        let outcome = extract_cancelled_fills(vec![op(Raw {
            status: "CANCELLED",
            quantity: dec!(20),
            cumulative_qty: Some(dec!(15)),
            average_price: Some(dec!(38.43)),
            ..Default::default()
        })]);

        assert_eq!(outcome.extracted_count, 1);
        assert_eq!(outcome.skipped_count, 0);
        assert_eq!(outcome.operations.len(), 1);

        let fill = &outcome.operations[0];
        assert_eq!(fill.status, OrderStatus::Filled);
        assert_eq!(fill.quantity, dec!(15));
        assert_eq!(fill.price, dec!(38.43));
        assert!(fill.extracted);
        assert_eq!(fill.original_status, Some(OrderStatus::Cancelled));
        assert!(fill.is_final());
    }

    #[test]
    fn test_price_falls_back_when_average_missing() {
        let outcome = extract_cancelled_fills(vec![op(Raw {
            status: "CANCELLED",
            cumulative_qty: Some(dec!(5)),
            average_price: None,
            ..Default::default()
        })]);

        assert_eq!(outcome.operations[0].price, dec!(40));
    }

    #[test]
    fn test_cancelled_without_fill_is_dropped() {
        let outcome = extract_cancelled_fills(vec![op(Raw {
            status: "CANCELLED",
            cumulative_qty: Some(dec!(0)),
            ..Default::default()
        })]);

        assert!(outcome.operations.is_empty());
        assert_eq!(outcome.extracted_count, 0);
        assert_eq!(outcome.skipped_count, 0);
    }

    #[test]
    fn test_replaced_text_skips_extraction() {
        for marker in ["Reemplazada por ajuste", "order REPLACED"] {
            let outcome = extract_cancelled_fills(vec![op(Raw {
                status: "CANCELLED",
                cumulative_qty: Some(dec!(8)),
                text: Some(marker),
                ..Default::default()
            })]);

            assert_eq!(outcome.extracted_count, 0);
            assert_eq!(outcome.skipped_count, 1);
            assert!(outcome.operations.is_empty());
            assert_eq!(outcome.metadata[0].skipped, Some(SkipReason::ReplacedText));
        }
    }

    #[test]
    fn test_filled_successor_prevents_double_count() {
        let predecessor = op(Raw {
            order_id: "O-1",
            client_order_id: Some("C-1"),
            status: "CANCELLED",
            cumulative_qty: Some(dec!(6)),
            ..Default::default()
        });
        let successor = op(Raw {
            order_id: "O-2",
            client_order_id: Some("C-2"),
            original_client_order_id: Some("C-1"),
            status: "FILLED",
            cumulative_qty: Some(dec!(10)),
            ..Default::default()
        });

        let outcome = extract_cancelled_fills(vec![predecessor, successor]);

        assert_eq!(outcome.extracted_count, 0);
        assert_eq!(outcome.skipped_count, 1);
        // Only the terminal fill survives.
        assert_eq!(outcome.operations.len(), 1);
        assert_eq!(outcome.operations[0].order_id, "O-2");
        assert_eq!(
            outcome.metadata[0].skipped,
            Some(SkipReason::SuccessorFilled)
        );
    }

    #[test]
    fn test_chain_extracts_only_terminal_cancelled_fill() {
        // A -> B, both cancelled with fills: only B (terminal) contributes.
        let a = op(Raw {
            order_id: "O-1",
            client_order_id: Some("C-1"),
            status: "CANCELLED",
            cumulative_qty: Some(dec!(4)),
            ..Default::default()
        });
        let b = op(Raw {
            order_id: "O-2",
            client_order_id: Some("C-2"),
            original_client_order_id: Some("C-1"),
            status: "CANCELLED",
            cumulative_qty: Some(dec!(9)),
            average_price: Some(dec!(41)),
            ..Default::default()
        });

        let outcome = extract_cancelled_fills(vec![a, b]);

        assert_eq!(outcome.extracted_count, 1);
        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.operations.len(), 1);
        assert_eq!(outcome.operations[0].order_id, "O-2");
        assert_eq!(outcome.operations[0].quantity, dec!(9));

        // Extracted quantity never exceeds the chain's maximum cumulative.
        let total_extracted: Decimal = outcome
            .metadata
            .iter()
            .filter(|m| m.skipped.is_none())
            .map(|m| m.quantity)
            .sum();
        assert!(total_extracted <= dec!(9));
    }

    #[test]
    fn test_non_cancelled_operations_pass_through() {
        let filled = op(Raw::default());
        let outcome = extract_cancelled_fills(vec![filled.clone()]);
        assert_eq!(outcome.operations, vec![filled]);
        assert!(outcome.metadata.is_empty());
    }

    #[test]
    fn test_metadata_records_value() {
        let outcome = extract_cancelled_fills(vec![op(Raw {
            status: "CANCELLED",
            cumulative_qty: Some(dec!(15)),
            average_price: Some(dec!(38.43)),
            ..Default::default()
        })]);

        let record = &outcome.metadata[0];
        assert_eq!(record.value, dec!(15) * dec!(38.43));
        assert!(record.skipped.is_none());
    }
}
