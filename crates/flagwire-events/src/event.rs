// crates/flagwire-events/src/event.rs
// ============================================================================
// Module: Flagwire Event Inputs
// Description: Analytics event inputs accepted by the processor.
// Purpose: Carry evaluation, identify, custom, and migration facts.
// Dependencies: flagwire-core, serde_json
// ============================================================================

//! ## Overview
//! Event inputs are plain records produced at evaluation or call time and
//! handed to the event processor. Delivery encoding is a transport concern
//! and lives outside this crate; these types only cover what the summarizer
//! and in-memory buffer need.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;

use flagwire_core::Context;
use flagwire_core::Detail;
use flagwire_core::EvaluationReason;
use flagwire_core::UnixMillis;
use serde_json::Value;

// ============================================================================
// SECTION: Evaluation Events
// ============================================================================

/// One flag evaluation, as recorded for analytics.
///
/// # Invariants
/// - `flag_version` is `None` when the flag was not found.
#[derive(Debug, Clone)]
pub struct EvaluationEvent {
    /// Millisecond epoch when the evaluation happened.
    pub creation_date: UnixMillis,
    /// The evaluated context.
    pub context: Context,
    /// Key of the evaluated flag.
    pub flag_key: String,
    /// Version of the evaluated flag.
    pub flag_version: Option<u64>,
    /// Selected variation index.
    pub variation_index: Option<usize>,
    /// Evaluated value.
    pub value: Value,
    /// Caller's default value.
    pub default_value: Value,
    /// Reason, when reason tracking is on for this evaluation.
    pub reason: Option<EvaluationReason>,
    /// Key of the dependent flag for prerequisite evaluations.
    pub prerequisite_of: Option<String>,
    /// Full-event tracking requested by the flag.
    pub track_events: bool,
    /// Debug-event cutoff from the flag.
    pub debug_events_until_date: Option<UnixMillis>,
    /// Excludes this evaluation from summary counters.
    pub exclude_from_summaries: bool,
    /// Event sampling ratio from the flag.
    pub sampling_ratio: Option<i64>,
}

// ============================================================================
// SECTION: Identify and Custom Events
// ============================================================================

/// An explicit context registration.
#[derive(Debug, Clone)]
pub struct IdentifyEvent {
    /// Millisecond epoch when the call happened.
    pub creation_date: UnixMillis,
    /// The registered context.
    pub context: Context,
}

/// A host-defined custom event.
#[derive(Debug, Clone)]
pub struct CustomEvent {
    /// Millisecond epoch when the call happened.
    pub creation_date: UnixMillis,
    /// The associated context.
    pub context: Context,
    /// Host-chosen event key.
    pub key: String,
    /// Optional payload.
    pub data: Option<Value>,
    /// Optional numeric metric.
    pub metric_value: Option<f64>,
}

// ============================================================================
// SECTION: Migration Events
// ============================================================================

/// The operation a migration performed.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationOp {
    /// A read operation.
    Read,
    /// A write operation.
    Write,
}

/// Which implementation a migration measurement refers to.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationOrigin {
    /// The pre-migration implementation.
    Old,
    /// The post-migration implementation.
    New,
}

/// One migration operation, as recorded for analytics.
///
/// # Invariants
/// - `latencies` and `errors` only mention invoked origins.
#[derive(Debug, Clone)]
pub struct MigrationOpEvent {
    /// Millisecond epoch when the operation happened.
    pub creation_date: UnixMillis,
    /// The context the migration flag was evaluated for.
    pub context: Context,
    /// Key of the migration flag.
    pub flag_key: String,
    /// The performed operation.
    pub operation: MigrationOp,
    /// Evaluation result that selected the migration stage.
    pub evaluation: Detail,
    /// Event sampling ratio from the flag.
    pub sampling_ratio: Option<i64>,
    /// Implementations that were invoked.
    pub invoked: BTreeSet<MigrationOrigin>,
    /// Measured latencies per invoked origin.
    pub latencies: BTreeMap<MigrationOrigin, Duration>,
    /// Origins that reported errors.
    pub errors: BTreeSet<MigrationOrigin>,
    /// Consistency-check outcome, when one was sampled.
    pub consistency_check: Option<bool>,
    /// Ratio at which consistency checks were sampled.
    pub consistency_check_ratio: Option<i64>,
}

// ============================================================================
// SECTION: Event Input
// ============================================================================

/// Any event accepted by the processor queue.
#[derive(Debug, Clone)]
pub enum EventInput {
    /// A flag evaluation.
    Evaluation(EvaluationEvent),
    /// A context registration.
    Identify(IdentifyEvent),
    /// A custom event.
    Custom(CustomEvent),
    /// A migration operation.
    MigrationOp(MigrationOpEvent),
}
