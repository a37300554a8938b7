//! Normalization of heterogeneous raw execution records.
//!
//! Raw records arrive in two shapes: the brokerage API payload and the
//! pre-tokenized flat-file row. Both are resolved exactly once, here, into
//! the canonical [`Operation`]; downstream stages never probe optional wire
//! fields. Normalization is total: it never fails, it defaults missing
//! numerics to zero and missing strings to `None` so the explicit validity
//! checks downstream can reject what they must.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::operations_model::{
    Operation, OperationSide, OperationSource, OptionKind, OrderStatus,
};

/// Parses a string into a Decimal, tolerating scientific notation.
/// Falls back to zero with an error log so a single bad cell never sinks a
/// whole import.
pub fn parse_decimal_tolerant(value_str: &str, field_name: &str) -> Decimal {
    match Decimal::from_str(value_str.trim()) {
        Ok(d) => d,
        Err(e_decimal) => match Decimal::from_scientific(value_str.trim()) {
            Ok(d) => d,
            Err(e_scientific) => {
                log::error!(
                    "Failed to parse {} '{}': as Decimal (err: {}), and as scientific (err: {}). Falling back to ZERO.",
                    field_name, value_str, e_decimal, e_scientific
                );
                Decimal::ZERO
            }
        },
    }
}

/// A raw execution record from the brokerage API.
///
/// Every field is optional and aliased for the snake_case variants some
/// endpoints emit; missing data is resolved during normalization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrokerRawOperation {
    #[serde(default)]
    #[serde(alias = "order_id", alias = "orderNumber")]
    pub order_id: Option<String>,

    #[serde(default)]
    #[serde(alias = "operation_id", alias = "executionId")]
    pub operation_id: Option<String>,

    #[serde(default)]
    #[serde(alias = "client_order_id", alias = "clOrdId")]
    pub client_order_id: Option<String>,

    #[serde(default)]
    #[serde(alias = "original_client_order_id", alias = "origClOrdId")]
    pub original_client_order_id: Option<String>,

    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default)]
    #[serde(alias = "underlying_symbol")]
    pub underlying: Option<String>,

    #[serde(default)]
    #[serde(alias = "option_type")]
    pub option_type: Option<String>,

    #[serde(default)]
    #[serde(alias = "strike_price")]
    pub strike: Option<Decimal>,

    #[serde(default)]
    #[serde(alias = "expiration_date")]
    pub expiration: Option<String>,

    #[serde(default)]
    pub side: Option<String>,

    #[serde(default)]
    #[serde(alias = "units")]
    pub quantity: Option<Decimal>,

    #[serde(default)]
    pub price: Option<Decimal>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    #[serde(alias = "cumulative_qty", alias = "cumQty")]
    pub cumulative_qty: Option<Decimal>,

    #[serde(default)]
    #[serde(alias = "average_price", alias = "avgPx")]
    pub average_price: Option<Decimal>,

    #[serde(default)]
    #[serde(alias = "last_qty")]
    pub last_qty: Option<Decimal>,

    #[serde(default)]
    #[serde(alias = "last_price")]
    pub last_price: Option<Decimal>,

    #[serde(default)]
    pub text: Option<String>,

    /// Trade execution time as epoch milliseconds.
    #[serde(default)]
    #[serde(alias = "trade_timestamp", alias = "transactTime")]
    pub trade_timestamp: Option<i64>,
}

/// A pre-tokenized flat-file row.
///
/// The CSV tokenizer itself is an external collaborator; by the time a row
/// reaches the engine it is a bag of optional strings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CsvRawOperation {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub strike: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Trade time: RFC 3339, `YYYY-MM-DD HH:MM:SS`, or date-only.
    #[serde(default)]
    pub trade_date: Option<String>,
}

/// Raw execution record, tagged by source shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawOperation {
    Broker(BrokerRawOperation),
    Csv(CsvRawOperation),
}

impl RawOperation {
    /// The provenance this record will carry after normalization.
    pub fn source(&self) -> OperationSource {
        match self {
            RawOperation::Broker(_) => OperationSource::Broker,
            RawOperation::Csv(_) => OperationSource::Csv,
        }
    }
}

/// Resolves a raw record into the canonical [`Operation`].
pub fn normalize(raw: RawOperation, imported_at: DateTime<Utc>) -> Operation {
    match raw {
        RawOperation::Broker(b) => normalize_broker(b, imported_at),
        RawOperation::Csv(c) => normalize_csv(c, imported_at),
    }
}

fn normalize_broker(raw: BrokerRawOperation, imported_at: DateTime<Utc>) -> Operation {
    Operation {
        order_id: raw.order_id.unwrap_or_default(),
        operation_id: raw.operation_id,
        client_order_id: raw.client_order_id,
        original_client_order_id: raw.original_client_order_id,
        symbol: raw.symbol.unwrap_or_default(),
        underlying: raw.underlying,
        option_kind: OptionKind::parse(raw.option_type.as_deref()),
        strike: raw.strike,
        expiration: raw.expiration.as_deref().and_then(parse_expiration),
        side: parse_side(raw.side.as_deref()),
        quantity: raw.quantity.unwrap_or(Decimal::ZERO),
        price: raw.price.unwrap_or(Decimal::ZERO),
        trade_timestamp: timestamp_from_millis(raw.trade_timestamp),
        status: OrderStatus::parse(raw.status.as_deref()),
        cumulative_qty: raw.cumulative_qty,
        average_price: raw.average_price,
        last_qty: raw.last_qty,
        last_price: raw.last_price,
        text: raw.text,
        source: OperationSource::Broker,
        import_timestamp: imported_at,
        extracted: false,
        original_status: None,
    }
}

fn normalize_csv(raw: CsvRawOperation, imported_at: DateTime<Utc>) -> Operation {
    Operation {
        order_id: raw.order_id.unwrap_or_default(),
        operation_id: raw.operation_id,
        client_order_id: None,
        original_client_order_id: None,
        symbol: raw.symbol.unwrap_or_default(),
        underlying: raw.underlying,
        option_kind: OptionKind::parse(raw.option_type.as_deref()),
        strike: raw
            .strike
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_decimal_tolerant(s, "strike")),
        expiration: raw.expiration.as_deref().and_then(parse_expiration),
        side: parse_side(raw.side.as_deref()),
        quantity: raw
            .quantity
            .as_deref()
            .map(|s| parse_decimal_tolerant(s, "quantity"))
            .unwrap_or(Decimal::ZERO),
        price: raw
            .price
            .as_deref()
            .map(|s| parse_decimal_tolerant(s, "price"))
            .unwrap_or(Decimal::ZERO),
        trade_timestamp: raw
            .trade_date
            .as_deref()
            .and_then(parse_trade_time)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        status: OrderStatus::parse(raw.status.as_deref()),
        cumulative_qty: None,
        average_price: None,
        last_qty: None,
        last_price: None,
        text: raw.text,
        source: OperationSource::Csv,
        import_timestamp: imported_at,
        extracted: false,
        original_status: None,
    }
}

fn parse_side(value: Option<&str>) -> OperationSide {
    match value.and_then(OperationSide::parse) {
        Some(side) => side,
        None => {
            if let Some(v) = value {
                log::debug!("Unrecognized side '{}', defaulting to BUY", v);
            }
            OperationSide::Buy
        }
    }
}

fn parse_expiration(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .ok()
}

fn parse_trade_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp_from_millis(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
