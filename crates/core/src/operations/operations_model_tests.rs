//! Tests for operation domain models.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::operations_model::*;
use crate::operations::normalizer::{normalize, BrokerRawOperation, RawOperation};

fn sample_operation() -> Operation {
    normalize(
        RawOperation::Broker(BrokerRawOperation {
            order_id: Some("O-1".to_string()),
            operation_id: Some("E-1".to_string()),
            symbol: Some("GFGC40000O".to_string()),
            underlying: Some("GGAL".to_string()),
            option_type: Some("CALL".to_string()),
            strike: Some(dec!(40000)),
            expiration: Some("2026-10-16".to_string()),
            side: Some("SELL".to_string()),
            quantity: Some(dec!(10)),
            price: Some(dec!(125.5)),
            status: Some("FILLED".to_string()),
            trade_timestamp: Some(1_700_000_000_000),
            ..Default::default()
        }),
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
    )
}

// ============================================================================
// Sign convention and validity
// ============================================================================

#[test]
fn test_signed_quantity_convention() {
    let mut op = sample_operation();
    assert_eq!(op.signed_quantity(), dec!(-10));

    op.side = OperationSide::Buy;
    assert_eq!(op.signed_quantity(), dec!(10));
}

#[test]
fn test_gross_value() {
    let op = sample_operation();
    assert_eq!(op.gross_value(), dec!(1255));
}

#[test]
fn test_is_final_rejects_zero_quantity_and_negative_price() {
    let mut op = sample_operation();
    assert!(op.is_final());

    op.quantity = Decimal::ZERO;
    assert!(!op.is_final());

    op.quantity = dec!(1);
    op.price = dec!(-0.01);
    assert!(!op.is_final());

    // Zero price is allowed (expired options trade at zero).
    op.price = Decimal::ZERO;
    assert!(op.is_final());
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_instrument_key_groups_across_orders() {
    let a = sample_operation();
    let mut b = sample_operation();
    b.order_id = "O-2".to_string();
    b.operation_id = Some("E-9".to_string());

    assert_eq!(a.instrument_key(), b.instrument_key());
    assert_ne!(a.order_key(), b.order_key());
}

#[test]
fn test_instrument_key_separates_calls_from_puts() {
    let a = sample_operation();
    let mut b = sample_operation();
    b.option_kind = OptionKind::Put;

    assert_ne!(a.instrument_key(), b.instrument_key());
}

#[test]
fn test_trading_day() {
    let op = sample_operation();
    // 1_700_000_000_000 ms = 2023-11-14 UTC
    assert_eq!(op.trading_day(), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
}

// ============================================================================
// Replacement markers
// ============================================================================

#[test]
fn test_replaced_marker_is_case_insensitive_and_bilingual() {
    let mut op = sample_operation();
    assert!(!op.is_marked_replaced());

    op.text = Some("Orden reemplazada por el cliente".to_string());
    assert!(op.is_marked_replaced());

    op.text = Some("REPLACED by O-2".to_string());
    assert!(op.is_marked_replaced());

    op.text = Some("partial fill".to_string());
    assert!(!op.is_marked_replaced());
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_operation_round_trips_with_epoch_ms() {
    let op = sample_operation();
    let json = serde_json::to_string(&op).unwrap();
    assert!(json.contains("\"tradeTimestamp\":1700000000000"));

    let parsed: Operation = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, op);
}

#[test]
fn test_enum_wire_format() {
    assert_eq!(
        serde_json::to_string(&OptionKind::Call).unwrap(),
        "\"CALL\""
    );
    assert_eq!(
        serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap(),
        "\"PARTIALLY_FILLED\""
    );
    assert_eq!(
        serde_json::to_string(&OperationSource::Broker).unwrap(),
        "\"BROKER\""
    );
}
