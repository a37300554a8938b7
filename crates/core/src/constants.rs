/// Decimal precision applied at the reporting boundary.
///
/// Intermediate consolidation math stays at full `Decimal` precision;
/// rounding mid-calculation would compound error across many legs.
pub const REPORT_DECIMAL_PRECISION: u32 = 4;

/// Time bucket (seconds) used by the composite duplicate match to absorb
/// clock skew and rounding differences between sources.
pub const DEDUPE_BUCKET_SECS: i64 = 1;

/// Free-text markers a brokerage attaches to orders superseded by a
/// replacement. Matched case-insensitively.
pub const REPLACED_TEXT_MARKERS: [&str; 2] = ["REPLACED", "REEMPLAZADA"];
