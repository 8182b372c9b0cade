// crates/flagwire-core/src/core/flag.rs
// ============================================================================
// Module: Flagwire Feature Flags
// Description: Feature flag model as received from the configuration stream.
// Purpose: Hold the versioned rule tree the evaluator interprets.
// Dependencies: crate::core::{clause, context, preprocessed, time}, serde
// ============================================================================

//! ## Overview
//! A feature flag is immutable after deserialization. Field names mirror the
//! wire format; optional fields default so partial payloads deserialize
//! cleanly. [`FeatureFlag::finalize`] must run exactly once before a flag is
//! published to the store; it attaches the precomputed caches the evaluator
//! relies on for allocation-free hot paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::clause::Clause;
use crate::core::context::ContextKind;
use crate::core::preprocessed::FlagPreprocessed;
use crate::core::preprocessed::TargetPreprocessed;
use crate::core::time::UnixMillis;

// ============================================================================
// SECTION: Prerequisites and Targets
// ============================================================================

/// A prerequisite: another flag that must evaluate to a given variation.
///
/// # Invariants
/// - `variation` indexes into the prerequisite flag's variation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    /// Key of the prerequisite flag.
    pub key: String,
    /// Variation index the prerequisite must produce.
    pub variation: usize,
}

/// An explicit context-key target list for one variation.
///
/// # Invariants
/// - `values` holds context keys for `context_kind` (default `user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Kind of contexts the target applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<ContextKind>,
    /// Variation index returned on a key match.
    pub variation: usize,
    /// Context keys, in declared order.
    #[serde(default)]
    pub values: Vec<String>,
    /// One-shot key-set cache attached during finalization.
    #[serde(skip)]
    pub(crate) preprocessed: Option<TargetPreprocessed>,
}

// ============================================================================
// SECTION: Rollouts
// ============================================================================

/// Distinguishes plain percentage rollouts from experiments.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RolloutKind {
    /// Stable percentage rollout; bucketing may use a custom attribute.
    #[default]
    Rollout,
    /// Experiment rollout; bucketing always uses the context key.
    Experiment,
}

/// One bucket of a percentage rollout.
///
/// # Invariants
/// - `weight` is in units of 1/100000 and lies in `[0, 100000]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedVariation {
    /// Variation index this bucket selects.
    pub variation: usize,
    /// Bucket weight in units of 1/100000.
    #[serde(default)]
    pub weight: i64,
    /// Excludes this bucket from experiment tracking.
    #[serde(default)]
    pub untracked: bool,
}

/// A probabilistic selection among variations.
///
/// # Invariants
/// - Weights sum to at most 100000; any residual maps to the last bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    /// Rollout subtype.
    #[serde(default)]
    pub kind: RolloutKind,
    /// Weighted buckets in declared order.
    #[serde(default)]
    pub variations: Vec<WeightedVariation>,
    /// Attribute used for bucketing; the context key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
    /// Optional seed replacing the key-and-salt hash prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    /// Kind of the individual context to bucket on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<ContextKind>,
}

/// Either a fixed variation or a rollout.
///
/// # Invariants
/// - At most one of `variation` and `rollout` is meaningful; a fixed
///   variation takes precedence when both appear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationOrRollout {
    /// Fixed variation index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    /// Percentage rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// An ordered flag rule: AND-ed clauses plus a result.
///
/// # Invariants
/// - Clauses are AND-ed; the first matching rule in flag order wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRule {
    /// Stable rule identifier surfaced in reasons.
    #[serde(default)]
    pub id: String,
    /// Conditions that must all hold.
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Result when the rule matches.
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    /// Forces event tracking for evaluations matching this rule.
    #[serde(default)]
    pub track_events: bool,
}

// ============================================================================
// SECTION: Ancillary Settings
// ============================================================================

/// Client-side exposure settings.
///
/// # Invariants
/// - Mirrors the wire shape; absent on server-only flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    /// Flag is served to mobile SDK keys.
    #[serde(default)]
    pub using_mobile_key: bool,
    /// Flag is served to client-side environment IDs.
    #[serde(default)]
    pub using_environment_id: bool,
}

/// Migration-assist settings attached to a flag.
///
/// # Invariants
/// - `check_ratio` of `n` samples consistency checks once per `n` operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSettings {
    /// Consistency-check sampling ratio; one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_ratio: Option<i64>,
}

// ============================================================================
// SECTION: Feature Flag
// ============================================================================

/// A versioned feature flag.
///
/// # Invariants
/// - Immutable after [`FeatureFlag::finalize`]; the store shares it.
/// - `version` increases monotonically across updates to the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Flag key, unique within the environment.
    pub key: String,
    /// Monotonic version of this configuration.
    #[serde(default)]
    pub version: u64,
    /// Master switch; off flags serve the off variation.
    #[serde(default)]
    pub on: bool,
    /// Prerequisite flags in declared order.
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    /// Legacy user-kind target lists.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Kind-qualified target lists checked ahead of legacy targets.
    #[serde(default)]
    pub context_targets: Vec<Target>,
    /// Ordered rules.
    #[serde(default)]
    pub rules: Vec<FlagRule>,
    /// Result applied when no target or rule matches.
    #[serde(default)]
    pub fallthrough: VariationOrRollout,
    /// Variation served while the flag is off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_variation: Option<usize>,
    /// Variation values in index order.
    #[serde(default)]
    pub variations: Vec<Value>,
    /// Salt mixed into bucketing hashes.
    #[serde(default)]
    pub salt: String,
    /// Forces event tracking for every evaluation of this flag.
    #[serde(default)]
    pub track_events: bool,
    /// Forces event tracking for fallthrough evaluations.
    #[serde(default)]
    pub track_events_fallthrough: bool,
    /// Debug-event cutoff as a millisecond epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_events_until_date: Option<UnixMillis>,
    /// Legacy client-side exposure switch.
    #[serde(default)]
    pub client_side: bool,
    /// Refined client-side exposure settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_side_availability: Option<ClientSideAvailability>,
    /// Event sampling ratio; one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_ratio: Option<i64>,
    /// Excludes this flag's evaluations from summary counters.
    #[serde(default)]
    pub exclude_from_summaries: bool,
    /// Migration-assist settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationSettings>,
    /// Tombstone marker used by the wire format.
    #[serde(default)]
    pub deleted: bool,
    /// One-shot caches attached during finalization.
    #[serde(skip)]
    pub(crate) preprocessed: FlagPreprocessed,
}

impl FeatureFlag {
    /// Returns the value of a variation index, if in range.
    #[must_use]
    pub fn variation_value(&self, index: usize) -> Option<&Value> {
        self.variations.get(index)
    }

    /// Returns true when this flag may be served to client-side SDKs.
    #[must_use]
    pub fn is_client_side(&self) -> bool {
        self.client_side_availability
            .map_or(self.client_side, |availability| availability.using_environment_id)
    }
}
