// crates/flagwire-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Flagwire Evaluator
// Description: Deterministic interpreter for the flag rule tree.
// Purpose: Turn a flag, a context, and store state into a value and reason.
// Dependencies: crate::core, crate::interfaces, crate::runtime, tracing
// ============================================================================

//! ## Overview
//! Evaluation walks a flag in fixed order: off switch, prerequisites,
//! explicit targets, rules, fallthrough. The evaluator never returns an
//! error to the caller; every internal failure maps to an error reason and
//! the caller's default value. Reads take only the store's read path and
//! never suspend, so evaluations may run concurrently from any number of
//! threads.
//!
//! Invariants:
//! - Prerequisites are all visited and recorded even after the first failure.
//! - Prerequisite and segment cycles are broken by per-evaluation visit sets;
//!   a prerequisite cycle surfaces `MALFORMED_FLAG`, a segment cycle is a
//!   silent non-match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::core::attributes::AttributeRef;
use crate::core::clause::Clause;
use crate::core::clause::Operator;
use crate::core::context::Context;
use crate::core::context::ContextKind;
use crate::core::descriptor::DataKind;
use crate::core::flag::FeatureFlag;
use crate::core::flag::FlagRule;
use crate::core::flag::Target;
use crate::core::flag::VariationOrRollout;
use crate::core::reason::BigSegmentsStatus;
use crate::core::reason::Detail;
use crate::core::reason::ErrorKind;
use crate::core::reason::EvaluationReason;
use crate::core::segment::Segment;
use crate::interfaces::BigSegmentResolver;
use crate::interfaces::DataStore;
use crate::runtime::bucketing::resolve_rollout;
use crate::runtime::operators::any_value_matches;

// ============================================================================
// SECTION: Results
// ============================================================================

/// One prerequisite evaluation performed on behalf of another flag.
///
/// # Invariants
/// - `detail` is the full evaluation result of `flag` for the same context.
#[derive(Debug, Clone)]
pub struct PrerequisiteEvaluation {
    /// The prerequisite flag that was evaluated.
    pub flag: Arc<FeatureFlag>,
    /// Key of the flag that required the prerequisite.
    pub prerequisite_of: String,
    /// Result of the prerequisite evaluation.
    pub detail: Detail,
}

/// Complete result of one top-level evaluation.
///
/// # Invariants
/// - `prerequisite_events` lists every visited prerequisite in visit order.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// Value, variation index, and reason.
    pub detail: Detail,
    /// The evaluated flag, for event construction; `None` when not found.
    pub flag: Option<Arc<FeatureFlag>>,
    /// Prerequisite evaluations to record as events.
    pub prerequisite_events: Vec<PrerequisiteEvaluation>,
}

impl EvaluationOutcome {
    /// Builds an error outcome with no flag and no events.
    fn error(error_kind: ErrorKind, default_value: Value) -> Self {
        Self {
            detail: Detail::error(error_kind, default_value),
            flag: None,
            prerequisite_events: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Deterministic flag evaluator over a data store.
///
/// # Invariants
/// - Holds no mutable state; safe to share across threads.
pub struct Evaluator<'a> {
    /// Store the evaluator reads flags and segments from.
    pub(crate) store: &'a dyn DataStore,
    /// Optional big-segment membership resolver.
    pub(crate) big_segments: Option<&'a dyn BigSegmentResolver>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator without big-segment support.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self {
            store,
            big_segments: None,
        }
    }

    /// Creates an evaluator with a big-segment resolver.
    #[must_use]
    pub const fn with_big_segments(
        store: &'a dyn DataStore,
        big_segments: &'a dyn BigSegmentResolver,
    ) -> Self {
        Self {
            store,
            big_segments: Some(big_segments),
        }
    }

    /// Evaluates a flag for a context.
    ///
    /// Never fails: missing flags, malformed data, and store errors all map
    /// to an error reason carrying `default_value`.
    #[must_use]
    pub fn evaluate(&self, flag_key: &str, context: &Context, default_value: Value) -> EvaluationOutcome {
        let flag = match self.store.get(DataKind::Features, flag_key) {
            Err(err) => {
                warn!(flag_key, error = %err, "flag lookup failed");
                return EvaluationOutcome::error(ErrorKind::Exception, default_value);
            }
            Ok(descriptor) => descriptor.and_then(|d| d.item).and_then(|item| item.as_flag().cloned()),
        };
        let Some(flag) = flag else {
            return EvaluationOutcome::error(ErrorKind::FlagNotFound, default_value);
        };

        let mut scope = EvaluationScope {
            evaluator: self,
            prerequisite_stack: Vec::new(),
            segment_stack: Vec::new(),
            events: Vec::new(),
            big_segments_status: None,
        };
        let mut detail = scope.evaluate_internal(&flag, context, &default_value);
        if let Some(status) = scope.big_segments_status {
            detail.reason = detail.reason.with_big_segments_status(status);
        }
        EvaluationOutcome {
            detail,
            flag: Some(flag),
            prerequisite_events: scope.events,
        }
    }
}

// ============================================================================
// SECTION: Evaluation Scope
// ============================================================================

/// Mutable state carried through one top-level evaluation.
///
/// # Invariants
/// - `prerequisite_stack` holds the keys of flags currently being evaluated.
/// - `segment_stack` holds the keys of segments currently being matched.
pub(crate) struct EvaluationScope<'e, 'a> {
    /// The owning evaluator.
    pub(crate) evaluator: &'e Evaluator<'a>,
    /// Flags on the current prerequisite chain.
    pub(crate) prerequisite_stack: Vec<String>,
    /// Segments on the current match chain.
    pub(crate) segment_stack: Vec<String>,
    /// Prerequisite evaluations recorded so far.
    pub(crate) events: Vec<PrerequisiteEvaluation>,
    /// Worst big-segment status observed so far.
    pub(crate) big_segments_status: Option<BigSegmentsStatus>,
}

impl EvaluationScope<'_, '_> {
    /// Evaluates one flag within this scope.
    fn evaluate_internal(
        &mut self,
        flag: &Arc<FeatureFlag>,
        context: &Context,
        default_value: &Value,
    ) -> Detail {
        if self.prerequisite_stack.iter().any(|key| *key == flag.key) {
            warn!(flag_key = %flag.key, "prerequisite cycle detected");
            return Detail::error(ErrorKind::MalformedFlag, default_value.clone());
        }
        if !flag.on {
            return off_detail(flag, EvaluationReason::off());
        }

        if let Some(detail) = self.check_prerequisites(flag, context, default_value) {
            return detail;
        }
        if let Some(detail) = check_targets(flag, context, default_value) {
            return detail;
        }
        for (index, rule) in flag.rules.iter().enumerate() {
            if self.rule_matches(rule, context) {
                return rule_detail(flag, rule, index, context, default_value);
            }
        }
        fallthrough_detail(flag, context, default_value)
    }

    /// Evaluates every prerequisite in declared order.
    ///
    /// Returns the short-circuit detail for the first failure, after every
    /// prerequisite has been visited and recorded.
    fn check_prerequisites(
        &mut self,
        flag: &Arc<FeatureFlag>,
        context: &Context,
        default_value: &Value,
    ) -> Option<Detail> {
        let mut first_failed = None;
        for (index, prerequisite) in flag.prerequisites.iter().enumerate() {
            let Some(prerequisite_flag) = self.get_flag(&prerequisite.key) else {
                first_failed.get_or_insert(index);
                continue;
            };

            self.prerequisite_stack.push(flag.key.clone());
            let detail = self.evaluate_internal(&prerequisite_flag, context, &Value::Null);
            self.prerequisite_stack.pop();

            if detail.reason.error_kind() == Some(ErrorKind::MalformedFlag) {
                return Some(Detail::error(ErrorKind::MalformedFlag, default_value.clone()));
            }
            let satisfied =
                prerequisite_flag.on && detail.variation_index == Some(prerequisite.variation);
            self.events.push(PrerequisiteEvaluation {
                flag: Arc::clone(&prerequisite_flag),
                prerequisite_of: flag.key.clone(),
                detail,
            });
            if !satisfied {
                first_failed.get_or_insert(index);
            }
        }

        let index = first_failed?;
        let reason = flag
            .preprocessed
            .prerequisite_failed_reasons
            .get(index)
            .cloned()
            .unwrap_or_else(|| {
                EvaluationReason::prerequisite_failed(flag.prerequisites[index].key.clone())
            });
        Some(off_detail(flag, reason))
    }

    /// Tests whether every clause of a rule matches.
    fn rule_matches(&mut self, rule: &FlagRule, context: &Context) -> bool {
        rule.clauses.iter().all(|clause| self.clause_matches(clause, context))
    }

    /// Tests one clause, resolving segment references as needed.
    pub(crate) fn clause_matches(&mut self, clause: &Clause, context: &Context) -> bool {
        if clause.op == Operator::SegmentMatch {
            let matched = self.segment_match_clause(clause, context);
            return matched != clause.negate;
        }

        let kind = clause.context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
        let Some(individual) = context.individual_context(kind) else {
            return false;
        };
        let computed;
        let reference: &AttributeRef = match clause.preprocessed.as_ref() {
            Some(preprocessed) => &preprocessed.attribute,
            None => {
                computed = clause.attribute_reference();
                &computed
            }
        };
        if !reference.is_valid() {
            return false;
        }
        let Some(value) = individual.get_value(reference) else {
            // A missing attribute is a non-match even for negated clauses.
            return false;
        };
        let matched = match value {
            Value::Array(items) => items.iter().any(|item| any_value_matches(clause, item)),
            single => any_value_matches(clause, single),
        };
        matched != clause.negate
    }

    /// Tests a `segmentMatch` clause against each referenced segment.
    fn segment_match_clause(&mut self, clause: &Clause, context: &Context) -> bool {
        for value in &clause.values {
            let Some(segment_key) = value.as_str() else {
                continue;
            };
            let Some(segment) = self.get_segment(segment_key) else {
                continue;
            };
            if self.segment_matches(&segment, context) {
                return true;
            }
        }
        false
    }

    /// Records the worst big-segment status observed in this evaluation.
    pub(crate) fn record_big_segments_status(&mut self, status: BigSegmentsStatus) {
        let keep = self
            .big_segments_status
            .is_none_or(|current| status_priority(status) > status_priority(current));
        if keep {
            self.big_segments_status = Some(status);
        }
    }

    /// Reads a flag from the store, mapping failures to "absent".
    fn get_flag(&self, key: &str) -> Option<Arc<FeatureFlag>> {
        match self.evaluator.store.get(DataKind::Features, key) {
            Ok(descriptor) => descriptor?.item?.as_flag().cloned(),
            Err(err) => {
                debug!(flag_key = key, error = %err, "flag lookup failed during evaluation");
                None
            }
        }
    }

    /// Reads a segment from the store, mapping failures to "absent".
    pub(crate) fn get_segment(&self, key: &str) -> Option<Arc<Segment>> {
        match self.evaluator.store.get(DataKind::Segments, key) {
            Ok(descriptor) => descriptor?.item?.as_segment().cloned(),
            Err(err) => {
                debug!(segment_key = key, error = %err, "segment lookup failed during evaluation");
                None
            }
        }
    }
}

// ============================================================================
// SECTION: Detail Construction
// ============================================================================

/// Builds the off-state detail: the off variation or a null value.
fn off_detail(flag: &FeatureFlag, reason: EvaluationReason) -> Detail {
    match flag.off_variation {
        Some(index) => variation_detail(flag, index, reason, &Value::Null),
        None => Detail {
            value: Value::Null,
            variation_index: None,
            reason,
        },
    }
}

/// Builds a detail for a variation index, guarding against bad indices.
fn variation_detail(
    flag: &FeatureFlag,
    index: usize,
    reason: EvaluationReason,
    default_value: &Value,
) -> Detail {
    flag.variation_value(index).map_or_else(
        || Detail::error(ErrorKind::MalformedFlag, default_value.clone()),
        |value| Detail {
            value: value.clone(),
            variation_index: Some(index),
            reason,
        },
    )
}

/// Builds the detail for a matched rule.
fn rule_detail(
    flag: &FeatureFlag,
    rule: &FlagRule,
    index: usize,
    context: &Context,
    default_value: &Value,
) -> Detail {
    match resolve_variation_or_rollout(flag, &rule.variation_or_rollout, context) {
        Some((variation_index, in_experiment)) => {
            let reason = flag.preprocessed.rule_match_reasons.get(index).map_or_else(
                || EvaluationReason::rule_match(index, rule.id.clone(), in_experiment),
                |reasons| {
                    if in_experiment {
                        reasons.matched_in_experiment.clone()
                    } else {
                        reasons.matched.clone()
                    }
                },
            );
            variation_detail(flag, variation_index, reason, default_value)
        }
        None => Detail::error(ErrorKind::MalformedFlag, default_value.clone()),
    }
}

/// Builds the fallthrough detail.
fn fallthrough_detail(flag: &FeatureFlag, context: &Context, default_value: &Value) -> Detail {
    match resolve_variation_or_rollout(flag, &flag.fallthrough, context) {
        Some((variation_index, in_experiment)) => variation_detail(
            flag,
            variation_index,
            EvaluationReason::fallthrough(in_experiment),
            default_value,
        ),
        None => Detail::error(ErrorKind::MalformedFlag, default_value.clone()),
    }
}

/// Resolves a fixed variation or rollout into `(index, in_experiment)`.
///
/// Returns `None` when neither is present or the rollout is empty.
fn resolve_variation_or_rollout(
    flag: &FeatureFlag,
    variation_or_rollout: &VariationOrRollout,
    context: &Context,
) -> Option<(usize, bool)> {
    if let Some(index) = variation_or_rollout.variation {
        return Some((index, false));
    }
    let rollout = variation_or_rollout.rollout.as_ref()?;
    let result = resolve_rollout(rollout, context, &flag.key, &flag.salt)?;
    Some((result.variation_index, result.in_experiment))
}

// ============================================================================
// SECTION: Targets
// ============================================================================

/// Checks context targets, then legacy user targets, in declared order.
fn check_targets(flag: &FeatureFlag, context: &Context, default_value: &Value) -> Option<Detail> {
    if flag.context_targets.is_empty() {
        for target in &flag.targets {
            if target_has_context_key(target, context) {
                return Some(target_detail(flag, target.variation, default_value));
            }
        }
        return None;
    }
    for target in &flag.context_targets {
        let is_user_kind = target.context_kind.as_ref().is_none_or(ContextKind::is_default);
        // User entries with no keys defer to the legacy list for that variation.
        if is_user_kind && target.values.is_empty() {
            for legacy in &flag.targets {
                if legacy.variation == target.variation && target_has_context_key(legacy, context) {
                    return Some(target_detail(flag, legacy.variation, default_value));
                }
            }
        } else if target_has_context_key(target, context) {
            return Some(target_detail(flag, target.variation, default_value));
        }
    }
    None
}

/// Tests whether the target's kind-resolved context key is listed.
fn target_has_context_key(target: &Target, context: &Context) -> bool {
    let kind = target.context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
    let Some(individual) = context.individual_context(kind) else {
        return false;
    };
    target.preprocessed.as_ref().map_or_else(
        || target.values.iter().any(|value| value.as_str() == individual.key()),
        |preprocessed| preprocessed.values_set.contains(individual.key()),
    )
}

/// Builds a target-match detail.
fn target_detail(flag: &FeatureFlag, variation: usize, default_value: &Value) -> Detail {
    variation_detail(flag, variation, EvaluationReason::target_match(), default_value)
}

// ============================================================================
// SECTION: Status Priority
// ============================================================================

/// Severity order used to keep the worst observed big-segment status.
const fn status_priority(status: BigSegmentsStatus) -> u8 {
    match status {
        BigSegmentsStatus::Healthy => 0,
        BigSegmentsStatus::Stale => 1,
        BigSegmentsStatus::NotConfigured => 2,
        BigSegmentsStatus::StoreError => 3,
    }
}
