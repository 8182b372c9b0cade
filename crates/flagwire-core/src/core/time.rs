// crates/flagwire-core/src/core/time.rs
// ============================================================================
// Module: Flagwire Time Helpers
// Description: Millisecond-epoch timestamps and date coercion for operators.
// Purpose: Provide the single time representation shared across the runtime.
// Dependencies: time, serde_json
// ============================================================================

//! ## Overview
//! All timestamps in the flag data model are milliseconds since the Unix
//! epoch, matching the wire format. Date-valued clause operands coerce from
//! either a numeric millisecond value or an RFC3339 date-time string with
//! offset; coercion failures yield `None` and callers treat them as
//! non-matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Milliseconds since the Unix epoch, as used throughout the data model.
pub type UnixMillis = i64;

/// Returns the current wall-clock time in Unix milliseconds.
///
/// Clock readings before the epoch collapse to zero.
#[must_use]
pub fn now_unix_millis() -> UnixMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Date Coercion
// ============================================================================

/// Parses an RFC3339 date-time string into fractional Unix milliseconds.
#[must_use]
pub fn parse_rfc3339_millis(value: &str) -> Option<f64> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339).ok()?;
    #[allow(clippy::cast_precision_loss, reason = "Dates are compared with millisecond tolerance.")]
    let nanos = parsed.unix_timestamp_nanos() as f64;
    Some(nanos / 1_000_000.0)
}

/// Coerces a JSON value to Unix milliseconds for date comparison.
///
/// Numbers are taken as millisecond epochs; strings parse as RFC3339.
/// Any other shape yields `None`.
#[must_use]
pub fn value_to_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_rfc3339_millis(text),
        _ => None,
    }
}
