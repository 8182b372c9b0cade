// crates/flagwire-core/src/core/preprocessed.rs
// ============================================================================
// Module: Flagwire Preprocessing
// Description: One-shot precomputation attached to deserialized items.
// Purpose: Move per-evaluation parsing and allocation to deserialization time.
// Dependencies: crate::core::{attributes, clause, flag, reason, segment,
// semver, time}, regex
// ============================================================================

//! ## Overview
//! Finalization runs exactly once, after deserialization and before an item
//! is published to the store. It compiles clause regexes, parses dates and
//! semantic versions index-aligned with the clause values, builds key sets
//! for target lists and `in` clauses, and caches the reason objects the
//! evaluator would otherwise rebuild per evaluation. Evaluation remains
//! correct without these caches, only slower.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;

use crate::core::attributes::AttributeRef;
use crate::core::clause::Clause;
use crate::core::clause::Operator;
use crate::core::flag::FeatureFlag;
use crate::core::flag::Target;
use crate::core::reason::EvaluationReason;
use crate::core::segment::Segment;
use crate::core::segment::SegmentTarget;
use crate::core::semver::SemanticVersion;
use crate::core::time::value_to_millis;

// ============================================================================
// SECTION: Cache Types
// ============================================================================

/// Key-set cache for a target list.
///
/// # Invariants
/// - `values_set` contains exactly the target's declared keys.
#[derive(Debug, Clone)]
pub(crate) struct TargetPreprocessed {
    /// Declared context keys for constant-time membership checks.
    pub(crate) values_set: HashSet<String>,
}

/// Parsed clause values, index-aligned with the raw value list.
///
/// # Invariants
/// - Vector variants have the same length as the clause's `values`.
#[derive(Debug, Clone)]
pub(crate) enum PreprocessedValues {
    /// String values of an `in` clause for constant-time lookup.
    StringSet(HashSet<String>),
    /// Compiled regexes; `None` marks values that failed to compile.
    Regexes(Vec<Option<Regex>>),
    /// Millisecond epochs; `None` marks values that failed to coerce.
    Dates(Vec<Option<f64>>),
    /// Parsed semantic versions; `None` marks values that failed to parse.
    Versions(Vec<Option<SemanticVersion>>),
}

/// Per-clause precomputation.
///
/// # Invariants
/// - `attribute` reflects the clause's context-kind-dependent interpretation.
#[derive(Debug, Clone)]
pub(crate) struct ClausePreprocessed {
    /// Parsed attribute reference.
    pub(crate) attribute: AttributeRef,
    /// Operator-specific parsed values, when the operator benefits.
    pub(crate) values: Option<PreprocessedValues>,
}

/// Cached reasons for one flag rule.
///
/// # Invariants
/// - Both variants carry the same rule index and id.
#[derive(Debug, Clone)]
pub(crate) struct RuleMatchReasons {
    /// Reason for a plain rule match.
    pub(crate) matched: EvaluationReason,
    /// Reason for a rule match from an experiment bucket.
    pub(crate) matched_in_experiment: EvaluationReason,
}

/// Per-flag precomputation.
///
/// # Invariants
/// - Vectors are index-aligned with the flag's prerequisites and rules once
///   finalization has run; both are empty beforehand.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlagPreprocessed {
    /// Cached `PREREQUISITE_FAILED` reasons per prerequisite.
    pub(crate) prerequisite_failed_reasons: Vec<EvaluationReason>,
    /// Cached `RULE_MATCH` reasons per rule.
    pub(crate) rule_match_reasons: Vec<RuleMatchReasons>,
}

/// Per-segment precomputation.
///
/// # Invariants
/// - Sets mirror the segment's default-kind include and exclude lists.
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentPreprocessed {
    /// Default-kind included keys.
    pub(crate) included_set: HashSet<String>,
    /// Default-kind excluded keys.
    pub(crate) excluded_set: HashSet<String>,
}

// ============================================================================
// SECTION: Clause Finalization
// ============================================================================

impl Clause {
    /// Attaches operator-specific parsed values and the attribute reference.
    pub(crate) fn preprocess(&mut self) {
        let values = match self.op {
            Operator::In if self.values.len() > 1 => {
                Some(PreprocessedValues::StringSet(string_set(&self.values)))
            }
            Operator::Matches => Some(PreprocessedValues::Regexes(
                self.values
                    .iter()
                    .map(|value| value.as_str().and_then(|pattern| Regex::new(pattern).ok()))
                    .collect(),
            )),
            Operator::Before | Operator::After => {
                Some(PreprocessedValues::Dates(self.values.iter().map(value_to_millis).collect()))
            }
            Operator::SemVerEqual | Operator::SemVerLessThan | Operator::SemVerGreaterThan => {
                Some(PreprocessedValues::Versions(
                    self.values
                        .iter()
                        .map(|value| value.as_str().and_then(SemanticVersion::parse))
                        .collect(),
                ))
            }
            _ => None,
        };
        self.preprocessed = Some(ClausePreprocessed {
            attribute: self.attribute_reference(),
            values,
        });
    }
}

/// Collects the string members of a value list into a set.
fn string_set(values: &[Value]) -> HashSet<String> {
    values.iter().filter_map(|value| value.as_str().map(str::to_string)).collect()
}

// ============================================================================
// SECTION: Target Finalization
// ============================================================================

/// Builds the key-set cache for a list of target keys.
fn target_set(values: &[String]) -> TargetPreprocessed {
    TargetPreprocessed {
        values_set: values.iter().cloned().collect(),
    }
}

impl Target {
    /// Attaches the key-set cache.
    pub(crate) fn preprocess(&mut self) {
        self.preprocessed = Some(target_set(&self.values));
    }
}

impl SegmentTarget {
    /// Attaches the key-set cache.
    pub(crate) fn preprocess(&mut self) {
        self.preprocessed = Some(target_set(&self.values));
    }
}

// ============================================================================
// SECTION: Item Finalization
// ============================================================================

impl FeatureFlag {
    /// Runs one-shot precomputation over the whole flag.
    ///
    /// Must be called exactly once, after deserialization and before the
    /// flag is shared.
    pub fn finalize(&mut self) {
        for target in &mut self.targets {
            target.preprocess();
        }
        for target in &mut self.context_targets {
            target.preprocess();
        }
        for rule in &mut self.rules {
            for clause in &mut rule.clauses {
                clause.preprocess();
            }
        }
        self.preprocessed = FlagPreprocessed {
            prerequisite_failed_reasons: self
                .prerequisites
                .iter()
                .map(|prerequisite| EvaluationReason::prerequisite_failed(prerequisite.key.clone()))
                .collect(),
            rule_match_reasons: self
                .rules
                .iter()
                .enumerate()
                .map(|(index, rule)| RuleMatchReasons {
                    matched: EvaluationReason::rule_match(index, rule.id.clone(), false),
                    matched_in_experiment: EvaluationReason::rule_match(index, rule.id.clone(), true),
                })
                .collect(),
        };
    }
}

impl Segment {
    /// Runs one-shot precomputation over the whole segment.
    ///
    /// Must be called exactly once, after deserialization and before the
    /// segment is shared.
    pub fn finalize(&mut self) {
        for target in &mut self.included_contexts {
            target.preprocess();
        }
        for target in &mut self.excluded_contexts {
            target.preprocess();
        }
        for rule in &mut self.rules {
            for clause in &mut rule.clauses {
                clause.preprocess();
            }
        }
        self.preprocessed = SegmentPreprocessed {
            included_set: self.included.iter().cloned().collect(),
            excluded_set: self.excluded.iter().cloned().collect(),
        };
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn matches_clause_compiles_patterns_and_marks_failures() {
        let mut clause: Clause = serde_json::from_value(
            json!({"attribute": "name", "op": "matches", "values": ["^a.*z$", "(unclosed"]}),
        )
        .unwrap();
        clause.preprocess();
        let Some(ClausePreprocessed {
            values: Some(PreprocessedValues::Regexes(regexes)),
            ..
        }) = clause.preprocessed
        else {
            panic!("expected compiled regexes");
        };
        assert_eq!(regexes.len(), 2);
        assert!(regexes[0].is_some());
        assert!(regexes[1].is_none());
    }

    #[test]
    fn in_clause_with_multiple_values_builds_string_set() {
        let mut clause: Clause = serde_json::from_value(
            json!({"attribute": "tier", "op": "in", "values": ["gold", "silver", 3]}),
        )
        .unwrap();
        clause.preprocess();
        let Some(ClausePreprocessed {
            values: Some(PreprocessedValues::StringSet(set)),
            ..
        }) = clause.preprocessed
        else {
            panic!("expected a string set");
        };
        assert!(set.contains("gold"));
        assert!(set.contains("silver"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn flag_finalize_caches_reasons() {
        let mut flag: FeatureFlag = serde_json::from_value(json!({
            "key": "f",
            "version": 1,
            "prerequisites": [{"key": "p", "variation": 0}],
            "rules": [{"id": "r0", "clauses": [], "variation": 1}],
        }))
        .unwrap();
        flag.finalize();
        assert_eq!(
            flag.preprocessed.prerequisite_failed_reasons,
            vec![EvaluationReason::prerequisite_failed("p".to_string())]
        );
        assert_eq!(
            flag.preprocessed.rule_match_reasons[0].matched,
            EvaluationReason::rule_match(0, "r0".to_string(), false)
        );
    }
}
