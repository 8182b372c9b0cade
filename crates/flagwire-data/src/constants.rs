// crates/flagwire-data/src/constants.rs
// ============================================================================
// Module: Flagwire Data Constants
// Description: Default tuning values for the data pipeline.
// Purpose: Group every default in one place; no hidden initializers.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Defaults used when hosts do not override the corresponding configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Big-Segment Defaults
// ============================================================================

/// Default bound on the number of cached big-segment context keys.
pub const DEFAULT_BIG_SEGMENT_CACHE_SIZE: usize = 1000;

/// Default age bound for cached big-segment membership results.
pub const DEFAULT_BIG_SEGMENT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Default interval between big-segment metadata polls.
pub const DEFAULT_BIG_SEGMENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default age beyond which big-segment data counts as stale.
pub const DEFAULT_BIG_SEGMENT_STALE_AFTER: Duration = Duration::from_secs(120);

// ============================================================================
// SECTION: Outage Defaults
// ============================================================================

/// Default outage duration before the escalation log fires.
pub const DEFAULT_OUTAGE_LOGGING_TIMEOUT: Duration = Duration::from_secs(60);
