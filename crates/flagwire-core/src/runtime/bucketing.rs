// crates/flagwire-core/src/runtime/bucketing.rs
// ============================================================================
// Module: Flagwire Bucketing
// Description: Stable SHA1-based bucket values and rollout selection.
// Purpose: Allocate contexts to rollout buckets deterministically.
// Dependencies: crate::core, sha1
// ============================================================================

//! ## Overview
//! Bucketing maps a context to a float in `[0, 1)` by hashing
//! `prefix + "." + bucketValue` with SHA1, taking the first fifteen hex
//! digits, and dividing by the fifteen-nibble scale. The prefix is the
//! rollout seed when present, otherwise `flagKey + "." + salt`. The result
//! must be stable across runs and platforms; the rest of the server
//! population computes the same allocation from the same inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha1::Digest;
use sha1::Sha1;

use crate::core::attributes::AttributeRef;
use crate::core::context::Context;
use crate::core::context::ContextKind;
use crate::core::flag::Rollout;
use crate::core::flag::RolloutKind;

// ============================================================================
// SECTION: Bucket Computation
// ============================================================================

/// Divisor for the first fifteen hex digits of the hash.
#[allow(clippy::cast_precision_loss, reason = "Fifteen hex digits fit the scheme's precision.")]
const BUCKET_SCALE: f64 = 0xFFF_FFFF_FFFF_FFFF_u64 as f64;

/// Computes the bucket value for a context.
///
/// Returns `None` when the context has no individual context of the
/// requested kind; callers treat that as the first bucket with experiment
/// tracking disabled. An absent or non-bucketable attribute value yields
/// `Some(0.0)`.
#[must_use]
pub fn bucket_context(
    seed: Option<i32>,
    context: &Context,
    context_kind: &ContextKind,
    bucket_by: Option<&AttributeRef>,
    key: &str,
    salt: &str,
    is_experiment: bool,
) -> Option<f64> {
    let individual = context.individual_context(context_kind)?;
    let bucket_by = if is_experiment { None } else { bucket_by };
    let owned_value;
    let bucket_value = match bucket_by {
        None => individual.key(),
        Some(reference) => match individual.get_value(reference) {
            Some(value) if value.is_string() => value.as_str().unwrap_or_default(),
            Some(value) if value.is_i64() || value.is_u64() => {
                owned_value = value.to_string();
                owned_value.as_str()
            }
            _ => return Some(0.0),
        },
    };

    let mut hasher = Sha1::new();
    match seed {
        Some(seed) => {
            hasher.update(seed.to_string().as_bytes());
        }
        None => {
            hasher.update(key.as_bytes());
            hasher.update(b".");
            hasher.update(salt.as_bytes());
        }
    }
    hasher.update(b".");
    hasher.update(bucket_value.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    #[allow(clippy::cast_precision_loss, reason = "Fifteen hex digits fit the scheme's precision.")]
    let numeric = u64::from_str_radix(&digest[..15], 16).ok()? as f64;
    Some(numeric / BUCKET_SCALE)
}

// ============================================================================
// SECTION: Rollout Selection
// ============================================================================

/// Outcome of resolving a rollout for a context.
///
/// # Invariants
/// - `variation_index` refers to the flag's variation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutResult {
    /// Selected variation index.
    pub variation_index: usize,
    /// True when the selection should be tracked as an experiment.
    pub in_experiment: bool,
}

/// Selects a weighted variation for a context.
///
/// Returns `None` when the rollout declares no variations (malformed data).
/// Weights accumulate in units of 1/100000; the first bucket whose
/// cumulative bound strictly exceeds the scaled bucket value wins, and any
/// floating-point residue falls to the last declared variation.
#[must_use]
pub fn resolve_rollout(
    rollout: &Rollout,
    context: &Context,
    key: &str,
    salt: &str,
) -> Option<RolloutResult> {
    let last = rollout.variations.last()?;
    let is_experiment = rollout.kind == RolloutKind::Experiment;
    let context_kind = rollout.context_kind.as_ref().unwrap_or_else(|| ContextKind::default_ref());
    let bucket_by = rollout.bucket_by.as_ref().map(|attribute| {
        if rollout.context_kind.is_some() {
            AttributeRef::from_path(attribute.clone())
        } else {
            AttributeRef::from_literal(attribute.clone())
        }
    });

    let bucket = bucket_context(
        rollout.seed,
        context,
        context_kind,
        bucket_by.as_ref(),
        key,
        salt,
        is_experiment,
    );
    let in_context = bucket.is_some();
    let scaled = bucket.unwrap_or(0.0) * 100_000.0;

    let mut cumulative = 0.0;
    for weighted in &rollout.variations {
        #[allow(clippy::cast_precision_loss, reason = "Weights are bounded by 100000.")]
        {
            cumulative += weighted.weight as f64;
        }
        if scaled < cumulative {
            return Some(RolloutResult {
                variation_index: weighted.variation,
                in_experiment: is_experiment && in_context && !weighted.untracked,
            });
        }
    }
    Some(RolloutResult {
        variation_index: last.variation,
        in_experiment: is_experiment && in_context && !last.untracked,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use serde_json::json;

    use crate::core::context::ContextBuilder;
    use crate::core::flag::WeightedVariation;

    use super::*;

    fn user(key: &str) -> Context {
        Context::new(key).unwrap()
    }

    #[test]
    fn bucket_is_deterministic_and_in_range() {
        let context = user("userkey-123");
        let kind = ContextKind::default_kind();
        let first = bucket_context(None, &context, &kind, None, "flagkey", "xyzzy", false).unwrap();
        let second = bucket_context(None, &context, &kind, None, "flagkey", "xyzzy", false).unwrap();
        assert!((0.0..1.0).contains(&first));
        assert!((first - second).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_varies_with_salt_and_seed() {
        let context = user("userkey-123");
        let kind = ContextKind::default_kind();
        let salted = bucket_context(None, &context, &kind, None, "flagkey", "one", false).unwrap();
        let other = bucket_context(None, &context, &kind, None, "flagkey", "two", false).unwrap();
        assert!((salted - other).abs() > f64::EPSILON);

        let seeded = bucket_context(Some(42), &context, &kind, None, "flagkey", "one", false).unwrap();
        let reseeded =
            bucket_context(Some(43), &context, &kind, None, "flagkey", "one", false).unwrap();
        assert!((seeded - reseeded).abs() > f64::EPSILON);
    }

    #[test]
    fn missing_context_kind_is_the_sentinel() {
        let context = user("userkey-123");
        let org = ContextKind::new("org").unwrap();
        assert!(bucket_context(None, &context, &org, None, "flagkey", "salt", false).is_none());
    }

    #[test]
    fn non_bucketable_attribute_values_bucket_to_zero() {
        let context = ContextBuilder::new("k").set("weights", json!([1, 2])).build().unwrap();
        let kind = ContextKind::default_kind();
        let reference = AttributeRef::from_literal("weights");
        let bucket =
            bucket_context(None, &context, &kind, Some(&reference), "flagkey", "salt", false)
                .unwrap();
        assert!(bucket.abs() < f64::EPSILON);

        let missing = AttributeRef::from_literal("nope");
        let bucket =
            bucket_context(None, &context, &kind, Some(&missing), "flagkey", "salt", false).unwrap();
        assert!(bucket.abs() < f64::EPSILON);
    }

    #[test]
    fn integer_attributes_bucket_like_their_decimal_string() {
        let by_int = ContextBuilder::new("k").set("group", json!(33)).build().unwrap();
        let by_str = ContextBuilder::new("k").set("group", json!("33")).build().unwrap();
        let kind = ContextKind::default_kind();
        let reference = AttributeRef::from_literal("group");
        let int_bucket =
            bucket_context(None, &by_int, &kind, Some(&reference), "f", "s", false).unwrap();
        let str_bucket =
            bucket_context(None, &by_str, &kind, Some(&reference), "f", "s", false).unwrap();
        assert!((int_bucket - str_bucket).abs() < f64::EPSILON);
    }

    #[test]
    fn residual_weight_falls_to_last_variation() {
        let rollout = Rollout {
            kind: RolloutKind::Rollout,
            variations: vec![WeightedVariation {
                variation: 3,
                weight: 1,
                untracked: false,
            }],
            bucket_by: None,
            seed: None,
            context_kind: None,
        };
        // Almost every context buckets above 1/100000; all land on the only bucket.
        let result = resolve_rollout(&rollout, &user("any-user"), "f", "s").unwrap();
        assert_eq!(result.variation_index, 3);
        assert!(!result.in_experiment);
    }

    #[test]
    fn empty_rollout_is_malformed() {
        let rollout = Rollout {
            kind: RolloutKind::Rollout,
            variations: Vec::new(),
            bucket_by: None,
            seed: None,
            context_kind: None,
        };
        assert!(resolve_rollout(&rollout, &user("u"), "f", "s").is_none());
    }

    #[test]
    fn experiment_without_context_is_untracked_first_bucket() {
        let rollout = Rollout {
            kind: RolloutKind::Experiment,
            variations: vec![
                WeightedVariation {
                    variation: 0,
                    weight: 10_000,
                    untracked: false,
                },
                WeightedVariation {
                    variation: 1,
                    weight: 90_000,
                    untracked: false,
                },
            ],
            bucket_by: None,
            seed: None,
            context_kind: Some(ContextKind::new("org").unwrap()),
        };
        let result = resolve_rollout(&rollout, &user("u"), "f", "s").unwrap();
        assert_eq!(result.variation_index, 0);
        assert!(!result.in_experiment);
    }
}
