// crates/flagwire-core/src/runtime/operators.rs
// ============================================================================
// Module: Flagwire Operator Kernel
// Description: Evaluation of single clause operators over attribute values.
// Purpose: Decide whether one context value satisfies one clause value.
// Dependencies: crate::core, regex
// ============================================================================

//! ## Overview
//! The operator kernel is pure: it never touches the store and never fails.
//! Every coercion problem (bad regex, unparsable date or version, wrong
//! types) is a non-match. Preprocessed clause values are used when present
//! and recomputed on the fly when not, so items inserted without
//! finalization still evaluate correctly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use serde_json::Value;

use crate::core::clause::Clause;
use crate::core::clause::Operator;
use crate::core::preprocessed::PreprocessedValues;
use crate::core::semver::SemanticVersion;
use crate::core::time::value_to_millis;

// ============================================================================
// SECTION: Clause Matching
// ============================================================================

/// Tests a single context value against every clause value (OR).
///
/// `segmentMatch` and unknown operators never match here; segment
/// resolution happens in the evaluator.
#[must_use]
pub(crate) fn any_value_matches(clause: &Clause, context_value: &Value) -> bool {
    if clause.op == Operator::In
        && let Some(PreprocessedValues::StringSet(set)) =
            clause.preprocessed.as_ref().and_then(|pre| pre.values.as_ref())
        && let Some(text) = context_value.as_str()
    {
        return set.contains(text);
    }
    clause
        .values
        .iter()
        .enumerate()
        .any(|(index, clause_value)| value_matches(clause, index, clause_value, context_value))
}

/// Tests a single context value against the clause value at `index`.
fn value_matches(clause: &Clause, index: usize, clause_value: &Value, context_value: &Value) -> bool {
    match clause.op {
        Operator::In => json_eq(context_value, clause_value),
        Operator::StartsWith => {
            string_pair(context_value, clause_value)
                .is_some_and(|(text, prefix)| text.starts_with(prefix))
        }
        Operator::EndsWith => {
            string_pair(context_value, clause_value)
                .is_some_and(|(text, suffix)| text.ends_with(suffix))
        }
        Operator::Contains => {
            string_pair(context_value, clause_value)
                .is_some_and(|(text, needle)| text.contains(needle))
        }
        Operator::Matches => matches_regex(clause, index, clause_value, context_value),
        Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual => numeric_compare(clause.op, context_value, clause_value),
        Operator::Before | Operator::After => date_compare(clause, index, clause_value, context_value),
        Operator::SemVerEqual | Operator::SemVerLessThan | Operator::SemVerGreaterThan => {
            semver_compare(clause, index, clause_value, context_value)
        }
        Operator::SegmentMatch | Operator::Unknown => false,
    }
}

// ============================================================================
// SECTION: Equality
// ============================================================================

/// Deep JSON equality with numeric cross-type comparison.
fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left_num), Value::Number(right_num)) => {
            match (left_num.as_f64(), right_num.as_f64()) {
                #[allow(clippy::float_cmp, reason = "Wire values compare exactly, not approximately.")]
                (Some(left_f), Some(right_f)) => left_f == right_f,
                _ => left_num == right_num,
            }
        }
        (Value::Array(left_items), Value::Array(right_items)) => {
            left_items.len() == right_items.len()
                && left_items.iter().zip(right_items).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(left_map), Value::Object(right_map)) => {
            left_map.len() == right_map.len()
                && left_map
                    .iter()
                    .all(|(key, a)| right_map.get(key).is_some_and(|b| json_eq(a, b)))
        }
        _ => left == right,
    }
}

// ============================================================================
// SECTION: Strings and Regexes
// ============================================================================

/// Extracts a `(context, clause)` string pair, or `None` on type mismatch.
fn string_pair<'v>(context_value: &'v Value, clause_value: &'v Value) -> Option<(&'v str, &'v str)> {
    Some((context_value.as_str()?, clause_value.as_str()?))
}

/// Applies a clause regex, preferring the precompiled one.
fn matches_regex(clause: &Clause, index: usize, clause_value: &Value, context_value: &Value) -> bool {
    let Some(text) = context_value.as_str() else {
        return false;
    };
    if let Some(PreprocessedValues::Regexes(regexes)) =
        clause.preprocessed.as_ref().and_then(|pre| pre.values.as_ref())
    {
        return regexes
            .get(index)
            .and_then(Option::as_ref)
            .is_some_and(|regex| regex.is_match(text));
    }
    clause_value
        .as_str()
        .and_then(|pattern| Regex::new(pattern).ok())
        .is_some_and(|regex| regex.is_match(text))
}

// ============================================================================
// SECTION: Numbers, Dates, and Versions
// ============================================================================

/// Compares two numeric values under an ordering operator.
fn numeric_compare(op: Operator, context_value: &Value, clause_value: &Value) -> bool {
    let (Some(left), Some(right)) = (context_value.as_f64(), clause_value.as_f64()) else {
        return false;
    };
    match op {
        Operator::LessThan => left < right,
        Operator::LessThanOrEqual => left <= right,
        Operator::GreaterThan => left > right,
        Operator::GreaterThanOrEqual => left >= right,
        _ => false,
    }
}

/// Compares two date values, using the precomputed clause date when present.
fn date_compare(clause: &Clause, index: usize, clause_value: &Value, context_value: &Value) -> bool {
    let Some(context_millis) = value_to_millis(context_value) else {
        return false;
    };
    let clause_millis = match clause.preprocessed.as_ref().and_then(|pre| pre.values.as_ref()) {
        Some(PreprocessedValues::Dates(dates)) => dates.get(index).copied().flatten(),
        _ => value_to_millis(clause_value),
    };
    let Some(clause_millis) = clause_millis else {
        return false;
    };
    match clause.op {
        Operator::Before => context_millis < clause_millis,
        Operator::After => context_millis > clause_millis,
        _ => false,
    }
}

/// Compares two semantic versions, using the precomputed clause version when
/// present.
fn semver_compare(clause: &Clause, index: usize, clause_value: &Value, context_value: &Value) -> bool {
    let Some(context_version) = context_value.as_str().and_then(SemanticVersion::parse) else {
        return false;
    };
    let clause_version = match clause.preprocessed.as_ref().and_then(|pre| pre.values.as_ref()) {
        Some(PreprocessedValues::Versions(versions)) => versions.get(index).cloned().flatten(),
        _ => clause_value.as_str().and_then(SemanticVersion::parse),
    };
    let Some(clause_version) = clause_version else {
        return false;
    };
    match clause.op {
        Operator::SemVerEqual => context_version == clause_version,
        Operator::SemVerLessThan => context_version < clause_version,
        Operator::SemVerGreaterThan => context_version > clause_version,
        _ => false,
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

    fn clause(op: &str, values: Value) -> Clause {
        serde_json::from_value(json!({"attribute": "attr", "op": op, "values": values})).unwrap()
    }

    #[test]
    fn in_compares_numbers_across_representations() {
        let clause = clause("in", json!([99, "x"]));
        assert!(any_value_matches(&clause, &json!(99.0)));
        assert!(any_value_matches(&clause, &json!("x")));
        assert!(!any_value_matches(&clause, &json!("99")));
    }

    #[test]
    fn in_set_fast_path_agrees_with_slow_path() {
        let mut clause = clause("in", json!(["a", "b", "c"]));
        assert!(any_value_matches(&clause, &json!("b")));
        clause.preprocess();
        assert!(any_value_matches(&clause, &json!("b")));
        assert!(!any_value_matches(&clause, &json!("d")));
    }

    #[test]
    fn string_operators_are_case_sensitive() {
        assert!(any_value_matches(&clause("startsWith", json!(["ab"])), &json!("abc")));
        assert!(!any_value_matches(&clause("startsWith", json!(["AB"])), &json!("abc")));
        assert!(any_value_matches(&clause("endsWith", json!(["bc"])), &json!("abc")));
        assert!(any_value_matches(&clause("contains", json!(["b"])), &json!("abc")));
        assert!(!any_value_matches(&clause("contains", json!([7])), &json!("abc")));
    }

    #[test]
    fn matches_treats_bad_patterns_as_non_matches() {
        let mut bad = clause("matches", json!(["(unclosed"]));
        assert!(!any_value_matches(&bad, &json!("anything")));
        bad.preprocess();
        assert!(!any_value_matches(&bad, &json!("anything")));

        let good = clause("matches", json!(["^h.*o$"]));
        assert!(any_value_matches(&good, &json!("hello")));
        assert!(!any_value_matches(&good, &json!(42)));
    }

    #[test]
    fn numeric_operators_reject_non_numbers() {
        assert!(any_value_matches(&clause("lessThan", json!([10])), &json!(9.5)));
        assert!(any_value_matches(&clause("greaterThanOrEqual", json!([10])), &json!(10)));
        assert!(!any_value_matches(&clause("lessThan", json!(["10"])), &json!(9)));
        assert!(!any_value_matches(&clause("greaterThan", json!([10])), &json!("11")));
    }

    #[test]
    fn dates_coerce_from_millis_and_rfc3339() {
        let before = clause("before", json!(["2020-01-01T00:00:00Z"]));
        assert!(any_value_matches(&before, &json!("2019-12-31T23:59:59Z")));
        assert!(any_value_matches(&before, &json!(0)));
        assert!(!any_value_matches(&before, &json!("2021-06-01T00:00:00Z")));
        assert!(!any_value_matches(&before, &json!("not a date")));

        let after = clause("after", json!([0]));
        assert!(any_value_matches(&after, &json!("1970-01-02T00:00:00Z")));
        assert!(!any_value_matches(&after, &json!(-1)));
    }

    #[test]
    fn semver_operators_parse_permissively() {
        assert!(any_value_matches(&clause("semVerEqual", json!(["2.0"])), &json!("2.0.0")));
        assert!(any_value_matches(&clause("semVerLessThan", json!(["2"])), &json!("1.9.9")));
        assert!(any_value_matches(
            &clause("semVerGreaterThan", json!(["1.0.0-rc.1"])),
            &json!("1.0.0")
        ));
        assert!(!any_value_matches(&clause("semVerEqual", json!(["oops"])), &json!("1.0.0")));
    }

    #[test]
    fn unknown_operator_never_matches() {
        let unknown: Clause = serde_json::from_value(
            json!({"attribute": "attr", "op": "quantumLeap", "values": ["x"]}),
        )
        .unwrap();
        assert!(!any_value_matches(&unknown, &json!("x")));
    }
}
