// crates/flagwire-core/src/core/reason.rs
// ============================================================================
// Module: Flagwire Evaluation Reasons
// Description: Immutable reasons, error kinds, and evaluation details.
// Purpose: Explain every evaluation outcome with stable wire shapes.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every evaluation yields a reason explaining which branch of the flag
//! produced the value. Reasons are immutable value types compared by content;
//! the preprocessor caches the common ones so the evaluator reuses them
//! without rebuilding. A reason may additionally carry a big-segment status
//! when the evaluation touched an unbounded segment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Error taxonomy surfaced inside evaluation reasons.
///
/// # Invariants
/// - Variants are stable for serialization and programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The requested flag does not exist in the store.
    FlagNotFound,
    /// The flag data was structurally invalid (bad indices, cycles).
    MalformedFlag,
    /// The evaluation context was absent or invalid.
    UserNotSpecified,
    /// The client has not yet received any flag data.
    ClientNotReady,
    /// The flag value did not have the type the caller requested.
    WrongType,
    /// An unexpected internal failure, including store read errors.
    Exception,
}

// ============================================================================
// SECTION: Big-Segment Status
// ============================================================================

/// Health of big-segment data as observed during an evaluation.
///
/// # Invariants
/// - Variants are stable for serialization and programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BigSegmentsStatus {
    /// Membership data was available and current.
    Healthy,
    /// Membership data was available but older than the staleness bound.
    Stale,
    /// The big-segment store reported an error.
    StoreError,
    /// No big-segment store is configured.
    NotConfigured,
}

// ============================================================================
// SECTION: Reason Kinds
// ============================================================================

/// Serialization helper: skips `false` experiment markers on the wire.
#[allow(clippy::trivially_copy_pass_by_ref, reason = "Serde skip predicates take references.")]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// The branch of flag logic that produced an evaluation result.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonKind {
    /// The flag was off; the off variation applied.
    Off,
    /// The context key matched an explicit target list.
    TargetMatch,
    /// A rule matched the context.
    RuleMatch {
        /// Zero-based index of the matching rule.
        #[serde(rename = "ruleIndex")]
        rule_index: usize,
        /// Identifier of the matching rule.
        #[serde(rename = "ruleId")]
        rule_id: String,
        /// True when the result came from an experiment rollout bucket.
        #[serde(rename = "inExperiment", skip_serializing_if = "is_false")]
        in_experiment: bool,
    },
    /// A prerequisite flag did not produce its required variation.
    PrerequisiteFailed {
        /// Key of the failed prerequisite flag.
        #[serde(rename = "prerequisiteKey")]
        prerequisite_key: String,
    },
    /// No target or rule matched; the fallthrough applied.
    Fallthrough {
        /// True when the result came from an experiment rollout bucket.
        #[serde(rename = "inExperiment", skip_serializing_if = "is_false")]
        in_experiment: bool,
    },
    /// The evaluation failed; the caller's default value applied.
    Error {
        /// Error classification.
        #[serde(rename = "errorKind")]
        error_kind: ErrorKind,
    },
}

// ============================================================================
// SECTION: Evaluation Reason
// ============================================================================

/// Immutable explanation of an evaluation outcome.
///
/// # Invariants
/// - Equality is by content; cached instances compare equal to fresh ones.
/// - `big_segments_status` is present only when the evaluation consulted
///   big-segment data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReason {
    /// The branch of flag logic that produced the result.
    #[serde(flatten)]
    kind: ReasonKind,
    /// Big-segment health observed during the evaluation, if any.
    #[serde(rename = "bigSegmentsStatus", skip_serializing_if = "Option::is_none")]
    big_segments_status: Option<BigSegmentsStatus>,
}

impl EvaluationReason {
    /// Builds an `OFF` reason.
    #[must_use]
    pub const fn off() -> Self {
        Self {
            kind: ReasonKind::Off,
            big_segments_status: None,
        }
    }

    /// Builds a `TARGET_MATCH` reason.
    #[must_use]
    pub const fn target_match() -> Self {
        Self {
            kind: ReasonKind::TargetMatch,
            big_segments_status: None,
        }
    }

    /// Builds a `RULE_MATCH` reason.
    #[must_use]
    pub const fn rule_match(rule_index: usize, rule_id: String, in_experiment: bool) -> Self {
        Self {
            kind: ReasonKind::RuleMatch {
                rule_index,
                rule_id,
                in_experiment,
            },
            big_segments_status: None,
        }
    }

    /// Builds a `PREREQUISITE_FAILED` reason.
    #[must_use]
    pub const fn prerequisite_failed(prerequisite_key: String) -> Self {
        Self {
            kind: ReasonKind::PrerequisiteFailed {
                prerequisite_key,
            },
            big_segments_status: None,
        }
    }

    /// Builds a `FALLTHROUGH` reason.
    #[must_use]
    pub const fn fallthrough(in_experiment: bool) -> Self {
        Self {
            kind: ReasonKind::Fallthrough {
                in_experiment,
            },
            big_segments_status: None,
        }
    }

    /// Builds an `ERROR` reason.
    #[must_use]
    pub const fn error(error_kind: ErrorKind) -> Self {
        Self {
            kind: ReasonKind::Error {
                error_kind,
            },
            big_segments_status: None,
        }
    }

    /// Returns the reason kind.
    #[must_use]
    pub const fn kind(&self) -> &ReasonKind {
        &self.kind
    }

    /// Returns the error classification for `ERROR` reasons.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self.kind {
            ReasonKind::Error {
                error_kind,
            } => Some(error_kind),
            _ => None,
        }
    }

    /// Returns true when the result came from an experiment bucket.
    #[must_use]
    pub const fn in_experiment(&self) -> bool {
        match self.kind {
            ReasonKind::RuleMatch {
                in_experiment, ..
            }
            | ReasonKind::Fallthrough {
                in_experiment,
            } => in_experiment,
            _ => false,
        }
    }

    /// Returns the big-segment status attached to this reason, if any.
    #[must_use]
    pub const fn big_segments_status(&self) -> Option<BigSegmentsStatus> {
        self.big_segments_status
    }

    /// Returns this reason with a big-segment status attached.
    #[must_use]
    pub fn with_big_segments_status(mut self, status: BigSegmentsStatus) -> Self {
        self.big_segments_status = Some(status);
        self
    }
}

// ============================================================================
// SECTION: Evaluation Detail
// ============================================================================

/// Result of a single flag evaluation.
///
/// # Invariants
/// - `variation_index` is `None` exactly when the caller's default value
///   applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detail {
    /// The evaluated flag value.
    pub value: Value,
    /// Index into the flag's variation list, when one applied.
    #[serde(rename = "variationIndex", skip_serializing_if = "Option::is_none")]
    pub variation_index: Option<usize>,
    /// Explanation of the outcome.
    pub reason: EvaluationReason,
}

impl Detail {
    /// Builds a detail for an error outcome carrying the caller's default.
    #[must_use]
    pub const fn error(error_kind: ErrorKind, default_value: Value) -> Self {
        Self {
            value: default_value,
            variation_index: None,
            reason: EvaluationReason::error(error_kind),
        }
    }

    /// Returns true when the caller's default value applied.
    #[must_use]
    pub const fn is_default_value(&self) -> bool {
        self.variation_index.is_none()
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
    fn reasons_serialize_to_wire_shapes() {
        let reason = EvaluationReason::rule_match(2, "rule-a".to_string(), false);
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            json!({"kind": "RULE_MATCH", "ruleIndex": 2, "ruleId": "rule-a"})
        );

        let reason = EvaluationReason::fallthrough(true)
            .with_big_segments_status(BigSegmentsStatus::Stale);
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            json!({"kind": "FALLTHROUGH", "inExperiment": true, "bigSegmentsStatus": "STALE"})
        );

        let reason = EvaluationReason::error(ErrorKind::FlagNotFound);
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            json!({"kind": "ERROR", "errorKind": "FLAG_NOT_FOUND"})
        );
    }

    #[test]
    fn equality_is_by_content() {
        assert_eq!(
            EvaluationReason::prerequisite_failed("other".to_string()),
            EvaluationReason::prerequisite_failed("other".to_string())
        );
        assert_ne!(EvaluationReason::off(), EvaluationReason::target_match());
    }

    #[test]
    fn detail_defaults_track_variation_index() {
        let detail = Detail::error(ErrorKind::WrongType, json!("fallback"));
        assert!(detail.is_default_value());
        assert_eq!(detail.reason.error_kind(), Some(ErrorKind::WrongType));
    }
}
