// crates/flagwire-events/src/migrations.rs
// ============================================================================
// Module: Flagwire Migration Tracker
// Description: Evaluation-scoped measurement of migration operations.
// Purpose: Build at most one consistent migration event per operation.
// Dependencies: flagwire-core, thiserror
// ============================================================================

//! ## Overview
//! A tracker lives for one migration-guarded operation. The host reports
//! which implementations ran, their latencies, any errors, and optionally a
//! consistency check that only executes when the flag's check ratio samples
//! it. Building the event validates the invariants; a tracker that saw a
//! latency or error for an origin that never ran refuses to emit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;

use flagwire_core::Context;
use flagwire_core::Detail;
use flagwire_core::now_unix_millis;
use thiserror::Error;

use crate::event::MigrationOp;
use crate::event::MigrationOpEvent;
use crate::event::MigrationOrigin;
use crate::sampling::sample_ratio;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a tracker refuses to emit an event.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MigrationTrackerError {
    /// No operation was reported.
    #[error("migration tracker has no operation")]
    MissingOperation,
    /// Neither implementation was invoked.
    #[error("migration tracker recorded no invocations")]
    NothingInvoked,
    /// A latency was reported for an origin that never ran.
    #[error("latency reported for an origin that was not invoked")]
    LatencyWithoutInvocation,
    /// An error was reported for an origin that never ran.
    #[error("error reported for an origin that was not invoked")]
    ErrorWithoutInvocation,
    /// A consistency result exists but both origins did not run.
    #[error("consistency check requires both origins to be invoked")]
    ConsistencyWithoutBothOrigins,
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Evaluation-scoped recorder for one migration operation.
///
/// # Invariants
/// - Emits at most one event, and only when its records are consistent.
#[derive(Debug)]
pub struct MigrationOpTracker {
    /// Key of the migration flag.
    flag_key: String,
    /// Context the migration flag was evaluated for.
    context: Context,
    /// Evaluation result that selected the migration stage.
    evaluation: Detail,
    /// Consistency-check sampling ratio from the flag.
    check_ratio: Option<i64>,
    /// Event sampling ratio from the flag.
    sampling_ratio: Option<i64>,
    /// Reported operation.
    operation: Option<MigrationOp>,
    /// Implementations that ran.
    invoked: BTreeSet<MigrationOrigin>,
    /// Measured latencies.
    latencies: BTreeMap<MigrationOrigin, Duration>,
    /// Origins that reported errors.
    errors: BTreeSet<MigrationOrigin>,
    /// Consistency-check outcome, when sampled and executed.
    consistency: Option<bool>,
}

impl MigrationOpTracker {
    /// Creates a tracker for one operation on a migration flag.
    #[must_use]
    pub fn new(
        flag_key: impl Into<String>,
        context: Context,
        evaluation: Detail,
        check_ratio: Option<i64>,
        sampling_ratio: Option<i64>,
    ) -> Self {
        Self {
            flag_key: flag_key.into(),
            context,
            evaluation,
            check_ratio,
            sampling_ratio,
            operation: None,
            invoked: BTreeSet::new(),
            latencies: BTreeMap::new(),
            errors: BTreeSet::new(),
            consistency: None,
        }
    }

    /// Reports the operation being performed.
    pub fn operation(&mut self, operation: MigrationOp) {
        self.operation = Some(operation);
    }

    /// Reports that an implementation ran.
    pub fn invoked(&mut self, origin: MigrationOrigin) {
        self.invoked.insert(origin);
    }

    /// Reports the latency of one implementation.
    pub fn latency(&mut self, origin: MigrationOrigin, duration: Duration) {
        self.latencies.insert(origin, duration);
    }

    /// Reports an error from one implementation.
    pub fn error(&mut self, origin: MigrationOrigin) {
        self.errors.insert(origin);
    }

    /// Runs a consistency check when the flag's check ratio samples it.
    ///
    /// The comparison closure only executes on sampled operations.
    pub fn consistency(&mut self, compare: impl FnOnce() -> bool) {
        if sample_ratio(self.check_ratio) {
            self.consistency = Some(compare());
        }
    }

    /// Validates the records and builds the event.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationTrackerError`] when the records are inconsistent;
    /// no event must be emitted in that case.
    pub fn build(self) -> Result<MigrationOpEvent, MigrationTrackerError> {
        let operation = self.operation.ok_or(MigrationTrackerError::MissingOperation)?;
        if self.invoked.is_empty() {
            return Err(MigrationTrackerError::NothingInvoked);
        }
        if self.latencies.keys().any(|origin| !self.invoked.contains(origin)) {
            return Err(MigrationTrackerError::LatencyWithoutInvocation);
        }
        if self.errors.iter().any(|origin| !self.invoked.contains(origin)) {
            return Err(MigrationTrackerError::ErrorWithoutInvocation);
        }
        if self.consistency.is_some()
            && !(self.invoked.contains(&MigrationOrigin::Old)
                && self.invoked.contains(&MigrationOrigin::New))
        {
            return Err(MigrationTrackerError::ConsistencyWithoutBothOrigins);
        }
        Ok(MigrationOpEvent {
            creation_date: now_unix_millis(),
            context: self.context,
            flag_key: self.flag_key,
            operation,
            evaluation: self.evaluation,
            sampling_ratio: self.sampling_ratio,
            invoked: self.invoked,
            latencies: self.latencies,
            errors: self.errors,
            consistency_check: self.consistency,
            consistency_check_ratio: self.check_ratio,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
