//! Operation domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::REPLACED_TEXT_MARKERS;

/// Side of an executed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationSide {
    Buy,
    Sell,
}

impl OperationSide {
    /// Maps a wire-level side label, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "BUY" | "B" => Some(OperationSide::Buy),
            "SELL" | "S" => Some(OperationSide::Sell),
            _ => None,
        }
    }
}

/// Instrument classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    Call,
    Put,
    Stock,
    #[default]
    Unknown,
}

impl OptionKind {
    /// Maps a wire-level instrument label, case-insensitively.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_uppercase()) {
            Some(ref v) if v == "CALL" || v == "C" => OptionKind::Call,
            Some(ref v) if v == "PUT" || v == "P" => OptionKind::Put,
            Some(ref v) if v == "STOCK" || v == "EQUITY" => OptionKind::Stock,
            _ => OptionKind::Unknown,
        }
    }
}

/// Order lifecycle status as reported by the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    #[default]
    Unknown,
}

impl OrderStatus {
    /// Maps a wire-level status label, case-insensitively.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_uppercase()) {
            Some(ref v) if v == "NEW" || v == "OPEN" || v == "PENDING" => OrderStatus::New,
            Some(ref v) if v == "PARTIALLY_FILLED" || v == "PARTIAL" => {
                OrderStatus::PartiallyFilled
            }
            Some(ref v) if v == "FILLED" || v == "EXECUTED" => OrderStatus::Filled,
            Some(ref v) if v == "CANCELLED" || v == "CANCELED" => OrderStatus::Cancelled,
            Some(ref v) if v == "REJECTED" => OrderStatus::Rejected,
            _ => OrderStatus::Unknown,
        }
    }
}

/// Where a record was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationSource {
    Broker,
    Csv,
}

/// Full instrument identity used by the averaged consolidation view and the
/// composite duplicate match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentKey {
    pub symbol: String,
    pub option_kind: OptionKind,
    pub strike: Option<Decimal>,
    pub expiration: Option<NaiveDate>,
}

/// Order-level identity used by the raw consolidation view: same-order legs
/// net together, distinct orders stay visible as separate rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    pub order_id: String,
    pub option_kind: OptionKind,
}

/// Canonical executed-order record, immutable once created.
///
/// Raw intermediate states (zero quantity, cancelled remnants) may exist
/// right after normalization; [`Operation::is_final`] gates what reaches the
/// consolidation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    // Identity
    pub order_id: String,
    pub operation_id: Option<String>,
    pub client_order_id: Option<String>,
    pub original_client_order_id: Option<String>,

    // Instrument
    pub symbol: String,
    pub underlying: Option<String>,
    pub option_kind: OptionKind,
    pub strike: Option<Decimal>,
    pub expiration: Option<NaiveDate>,

    // Economics
    pub side: OperationSide,
    pub quantity: Decimal,
    pub price: Decimal,

    // Timing
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub trade_timestamp: DateTime<Utc>,

    // Lifecycle fields preserved for fill extraction
    pub status: OrderStatus,
    pub cumulative_qty: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub last_qty: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub text: Option<String>,

    // Provenance
    pub source: OperationSource,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub import_timestamp: DateTime<Utc>,

    // Extraction audit trail
    #[serde(default)]
    pub extracted: bool,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_status: Option<OrderStatus>,
}

impl Operation {
    /// Signed quantity: BUY contributes positive, SELL negative.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            OperationSide::Buy => self.quantity,
            OperationSide::Sell => -self.quantity,
        }
    }

    /// Gross traded value of this operation.
    pub fn gross_value(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Whether this record may contribute to consolidation.
    pub fn is_final(&self) -> bool {
        self.quantity > Decimal::ZERO && self.price >= Decimal::ZERO
    }

    /// Full instrument identity for the averaged view.
    pub fn instrument_key(&self) -> InstrumentKey {
        InstrumentKey {
            symbol: self.symbol.clone(),
            option_kind: self.option_kind,
            strike: self.strike,
            expiration: self.expiration,
        }
    }

    /// Order-level identity for the raw view.
    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            order_id: self.order_id.clone(),
            option_kind: self.option_kind,
        }
    }

    /// Whether the free-text annotation marks this order as superseded by a
    /// replacement.
    pub fn is_marked_replaced(&self) -> bool {
        let Some(ref text) = self.text else {
            return false;
        };
        let upper = text.to_uppercase();
        REPLACED_TEXT_MARKERS
            .iter()
            .any(|marker| upper.contains(marker))
    }

    /// The trading day this operation belongs to (UTC).
    pub fn trading_day(&self) -> NaiveDate {
        self.trade_timestamp.date_naive()
    }
}
