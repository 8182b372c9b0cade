// crates/flagwire-events/src/summary.rs
// ============================================================================
// Module: Flagwire Event Summarizer
// Description: Evaluation counters grouped for periodic flushing.
// Purpose: Compress per-evaluation facts into per-variation counters.
// Dependencies: flagwire-core, serde_json
// ============================================================================

//! ## Overview
//! The summarizer is a single-writer counter table: one owner thread calls
//! `summarize` per evaluation event, and flushing takes an immutable
//! snapshot before clearing. Counters key on `(variation, flag version)`
//! within each flag, and each flag entry remembers the caller default and
//! the context kinds seen. The summarizer is deliberately not thread-safe;
//! producers on other threads hand events over through the processor queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;

use flagwire_core::UnixMillis;
use serde_json::Value;

use crate::event::EvaluationEvent;

// ============================================================================
// SECTION: Summary Data
// ============================================================================

/// Counter key within one flag's summary.
///
/// # Invariants
/// - `variation_index` is `None` for default-value evaluations.
/// - `flag_version` is `None` when the flag was not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// Selected variation index.
    pub variation_index: Option<usize>,
    /// Version of the evaluated flag.
    pub flag_version: Option<u64>,
}

/// Counter state for one `(variation, version)` pair.
///
/// # Invariants
/// - `value` is the flag value every counted evaluation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterValue {
    /// Number of evaluations counted.
    pub count: u64,
    /// The evaluated value.
    pub value: Value,
}

/// Summary of all evaluations of one flag.
///
/// # Invariants
/// - `context_kinds` accumulates every kind seen across evaluations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlagSummary {
    /// Caller default value observed for this flag.
    pub default_value: Value,
    /// Context kinds seen across counted evaluations.
    pub context_kinds: BTreeSet<String>,
    /// Counters keyed by variation and version.
    pub counters: HashMap<CounterKey, CounterValue>,
}

/// An immutable summary snapshot covering one flush interval.
///
/// # Invariants
/// - `start_date <= end_date` whenever both are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventSummary {
    /// Earliest counted event time.
    pub start_date: Option<UnixMillis>,
    /// Latest counted event time.
    pub end_date: Option<UnixMillis>,
    /// Per-flag summaries.
    pub flags: HashMap<String, FlagSummary>,
}

impl EventSummary {
    /// Returns true when nothing has been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

// ============================================================================
// SECTION: Summarizer
// ============================================================================

/// Single-writer evaluation counter table.
///
/// # Invariants
/// - Owned by exactly one event-processing worker; not thread-safe.
#[derive(Debug, Default)]
pub struct EventSummarizer {
    /// Accumulating summary.
    summary: EventSummary,
}

impl EventSummarizer {
    /// Creates an empty summarizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one evaluation event.
    ///
    /// Events marked `exclude_from_summaries` are skipped.
    pub fn summarize(&mut self, event: &EvaluationEvent) {
        if event.exclude_from_summaries {
            return;
        }
        let start = self.summary.start_date.get_or_insert(event.creation_date);
        *start = (*start).min(event.creation_date);
        let end = self.summary.end_date.get_or_insert(event.creation_date);
        *end = (*end).max(event.creation_date);

        let flag = self.summary.flags.entry(event.flag_key.clone()).or_insert_with(|| {
            FlagSummary {
                default_value: event.default_value.clone(),
                context_kinds: BTreeSet::new(),
                counters: HashMap::new(),
            }
        });
        for kind in event.context.kind_names() {
            if !flag.context_kinds.contains(kind) {
                flag.context_kinds.insert(kind.to_string());
            }
        }
        let counter = flag
            .counters
            .entry(CounterKey {
                variation_index: event.variation_index,
                flag_version: event.flag_version,
            })
            .or_insert_with(|| CounterValue {
                count: 0,
                value: event.value.clone(),
            });
        counter.count += 1;
    }

    /// Returns an immutable snapshot of the current summary.
    #[must_use]
    pub fn snapshot(&self) -> EventSummary {
        self.summary.clone()
    }

    /// Discards all counted data.
    pub fn clear(&mut self) {
        self.summary = EventSummary::default();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
