// crates/flagwire-core/src/runtime/segments.rs
// ============================================================================
// Module: Flagwire Segment Matcher
// Description: Segment membership resolution during evaluation.
// Purpose: Decide whether a context belongs to a segment.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! Membership resolves in fixed order: kind-qualified exclusion lists, the
//! default-kind exclusion list, the matching inclusion lists, big-segment
//! store membership for unbounded segments, and finally rules. Exclusion
//! always wins over inclusion. Segment rules may reference other segments;
//! the scope's visit set turns re-entry into a silent non-match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::attributes::AttributeRef;
use crate::core::context::Context;
use crate::core::context::ContextKind;
use crate::core::reason::BigSegmentsStatus;
use crate::core::segment::Segment;
use crate::core::segment::SegmentRule;
use crate::core::segment::SegmentTarget;
use crate::runtime::bucketing::bucket_context;
use crate::runtime::evaluator::EvaluationScope;

// ============================================================================
// SECTION: Big-Segment Lookup Outcome
// ============================================================================

/// Result of consulting the big-segment store for one segment.
enum BigSegmentLookup {
    /// The store answered with an explicit inclusion or exclusion.
    Decided(bool),
    /// The store had no entry; rules decide membership.
    NoEntry,
    /// No membership was available; the segment does not match.
    Unavailable,
}

// ============================================================================
// SECTION: Segment Matching
// ============================================================================

impl EvaluationScope<'_, '_> {
    /// Decides whether the context belongs to the segment.
    pub(crate) fn segment_matches(&mut self, segment: &Arc<Segment>, context: &Context) -> bool {
        if self.segment_stack.iter().any(|key| *key == segment.key) {
            return false;
        }

        for target in &segment.excluded_contexts {
            if segment_target_has_key(target, context) {
                return false;
            }
        }
        if default_key_in(context, &segment.preprocessed.excluded_set, &segment.excluded) {
            return false;
        }
        for target in &segment.included_contexts {
            if segment_target_has_key(target, context) {
                return true;
            }
        }
        if default_key_in(context, &segment.preprocessed.included_set, &segment.included) {
            return true;
        }

        if segment.unbounded {
            match self.big_segment_lookup(segment, context) {
                BigSegmentLookup::Decided(included) => return included,
                BigSegmentLookup::Unavailable => return false,
                BigSegmentLookup::NoEntry => {}
            }
        }

        self.segment_stack.push(segment.key.clone());
        let matched = segment
            .rules
            .iter()
            .any(|rule| self.segment_rule_matches(segment, rule, context));
        self.segment_stack.pop();
        matched
    }

    /// Consults the big-segment resolver for an unbounded segment.
    fn big_segment_lookup(&mut self, segment: &Segment, context: &Context) -> BigSegmentLookup {
        let kind = segment.unbounded_context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
        let Some(individual) = context.individual_context(kind) else {
            return BigSegmentLookup::Decided(false);
        };
        let Some(reference) = segment.membership_reference() else {
            // An unbounded segment without a generation cannot be queried.
            self.record_big_segments_status(BigSegmentsStatus::NotConfigured);
            return BigSegmentLookup::Unavailable;
        };
        let Some(resolver) = self.evaluator.big_segments else {
            self.record_big_segments_status(BigSegmentsStatus::NotConfigured);
            return BigSegmentLookup::Unavailable;
        };
        let (membership, status) = resolver.query_membership(individual.key());
        self.record_big_segments_status(status);
        membership.map_or(BigSegmentLookup::Unavailable, |membership| {
            membership
                .included(&reference)
                .map_or(BigSegmentLookup::NoEntry, BigSegmentLookup::Decided)
        })
    }

    /// Tests one segment rule: all clauses, then the optional weight.
    fn segment_rule_matches(
        &mut self,
        segment: &Segment,
        rule: &SegmentRule,
        context: &Context,
    ) -> bool {
        if !rule.clauses.iter().all(|clause| self.clause_matches(clause, context)) {
            return false;
        }
        let Some(weight) = rule.weight else {
            return true;
        };

        let kind = rule.rollout_context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
        let bucket_by = rule.bucket_by.as_ref().map(|attribute| {
            if rule.rollout_context_kind.is_some() {
                AttributeRef::from_path(attribute.clone())
            } else {
                AttributeRef::from_literal(attribute.clone())
            }
        });
        let bucket = bucket_context(
            None,
            context,
            kind,
            bucket_by.as_ref(),
            &segment.key,
            &segment.salt,
            false,
        )
        .unwrap_or(0.0);
        #[allow(clippy::cast_precision_loss, reason = "Weights are bounded by 100000.")]
        let weight = weight as f64;
        bucket * 100_000.0 < weight
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Tests a kind-qualified segment target list against the context.
fn segment_target_has_key(target: &SegmentTarget, context: &Context) -> bool {
    let kind = target.context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
    let Some(individual) = context.individual_context(kind) else {
        return false;
    };
    target.preprocessed.as_ref().map_or_else(
        || target.values.iter().any(|value| value.as_str() == individual.key()),
        |preprocessed| preprocessed.values_set.contains(individual.key()),
    )
}

/// Tests the default-kind context key against a set, with a list fallback
/// for items stored without finalization.
fn default_key_in(
    context: &Context,
    preprocessed: &std::collections::HashSet<String>,
    raw: &[String],
) -> bool {
    let Some(individual) = context.individual_context(ContextKind::default_ref()) else {
        return false;
    };
    if preprocessed.is_empty() {
        raw.iter().any(|value| value.as_str() == individual.key())
    } else {
        preprocessed.contains(individual.key())
    }
}
