// crates/flagwire-core/src/core/segment.rs
// ============================================================================
// Module: Flagwire Segments
// Description: Segment model, including big-segment metadata.
// Purpose: Hold reusable context predicates referenced by flag rules.
// Dependencies: crate::core::{clause, context, preprocessed}, serde
// ============================================================================

//! ## Overview
//! A segment is a named predicate over contexts: explicit include/exclude
//! lists first, then ordered rules, optionally weighted for partial
//! membership. Unbounded ("big") segments carry no inline membership; the
//! evaluator resolves them through the big-segment store using the segment's
//! generation-qualified reference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::clause::Clause;
use crate::core::context::ContextKind;
use crate::core::preprocessed::SegmentPreprocessed;
use crate::core::preprocessed::TargetPreprocessed;

// ============================================================================
// SECTION: Segment Targets
// ============================================================================

/// A kind-qualified include or exclude list.
///
/// # Invariants
/// - `values` holds context keys for `context_kind` (default `user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTarget {
    /// Kind of contexts the list applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<ContextKind>,
    /// Context keys, in declared order.
    #[serde(default)]
    pub values: Vec<String>,
    /// One-shot key-set cache attached during finalization.
    #[serde(skip)]
    pub(crate) preprocessed: Option<TargetPreprocessed>,
}

// ============================================================================
// SECTION: Segment Rules
// ============================================================================

/// An ordered segment rule: AND-ed clauses plus an optional weight.
///
/// # Invariants
/// - A present `weight` is in units of 1/100000; contexts bucket below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    /// Stable rule identifier for diagnostics.
    #[serde(default)]
    pub id: String,
    /// Conditions that must all hold.
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Partial-membership weight in units of 1/100000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    /// Attribute used for weighting buckets; the context key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
    /// Kind of the individual context to bucket on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_context_kind: Option<ContextKind>,
}

// ============================================================================
// SECTION: Segment
// ============================================================================

/// A versioned segment.
///
/// # Invariants
/// - Immutable after [`Segment::finalize`]; the store shares it.
/// - `generation` is present whenever `unbounded` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Segment key, unique within the environment.
    pub key: String,
    /// Monotonic version of this configuration.
    #[serde(default)]
    pub version: u64,
    /// Default-kind context keys always in the segment.
    #[serde(default)]
    pub included: Vec<String>,
    /// Default-kind context keys never in the segment.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Kind-qualified include lists, checked before `included`.
    #[serde(default)]
    pub included_contexts: Vec<SegmentTarget>,
    /// Kind-qualified exclude lists, checked before `excluded`.
    #[serde(default)]
    pub excluded_contexts: Vec<SegmentTarget>,
    /// Ordered rules applied after the explicit lists.
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    /// Salt mixed into weighting hashes.
    #[serde(default)]
    pub salt: String,
    /// Marks a big segment resolved through the membership store.
    #[serde(default)]
    pub unbounded: bool,
    /// Kind of contexts a big segment applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbounded_context_kind: Option<ContextKind>,
    /// Membership-store generation for big segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    /// Tombstone marker used by the wire format.
    #[serde(default)]
    pub deleted: bool,
    /// One-shot caches attached during finalization.
    #[serde(skip)]
    pub(crate) preprocessed: SegmentPreprocessed,
}

impl Segment {
    /// Returns the generation-qualified reference used by the membership
    /// store, or `None` for big segments missing a generation.
    #[must_use]
    pub fn membership_reference(&self) -> Option<String> {
        self.generation.map(|generation| format!("{}.g{generation}", self.key))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn membership_reference_includes_generation() {
        let segment: Segment =
            serde_json::from_value(json!({"key": "big", "version": 1, "unbounded": true, "generation": 7}))
                .unwrap();
        assert_eq!(segment.membership_reference().as_deref(), Some("big.g7"));
    }

    #[test]
    fn membership_reference_requires_generation() {
        let segment: Segment =
            serde_json::from_value(json!({"key": "big", "version": 1, "unbounded": true})).unwrap();
        assert_eq!(segment.membership_reference(), None);
    }
}
