// crates/flagwire-core/src/core/clause.rs
// ============================================================================
// Module: Flagwire Clauses
// Description: Clause model and the operator enumeration.
// Purpose: Represent a single attribute test inside flag and segment rules.
// Dependencies: crate::core::{context, preprocessed}, serde, serde_json
// ============================================================================

//! ## Overview
//! A clause tests one context attribute against a list of values; the values
//! are OR-ed and `negate` inverts the whole clause. The attribute field is a
//! literal name when no context kind is given and a `/`-separated reference
//! path when one is. Unknown operators deserialize to [`Operator::Unknown`]
//! and never match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::attributes::AttributeRef;
use crate::core::context::ContextKind;
use crate::core::preprocessed::ClausePreprocessed;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Clause operators supported by the evaluator.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Operators absent from this list deserialize as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Deep equality against any of the clause values.
    In,
    /// Case-sensitive string prefix test.
    StartsWith,
    /// Case-sensitive string suffix test.
    EndsWith,
    /// Case-sensitive substring test.
    Contains,
    /// Regular-expression match; compile failures never match.
    Matches,
    /// Numeric strictly-less-than comparison.
    LessThan,
    /// Numeric less-than-or-equal comparison.
    LessThanOrEqual,
    /// Numeric strictly-greater-than comparison.
    GreaterThan,
    /// Numeric greater-than-or-equal comparison.
    GreaterThanOrEqual,
    /// Date comparison: context value strictly before the clause value.
    Before,
    /// Date comparison: context value strictly after the clause value.
    After,
    /// Semantic-version equality.
    SemVerEqual,
    /// Semantic-version strictly-less-than comparison.
    SemVerLessThan,
    /// Semantic-version strictly-greater-than comparison.
    SemVerGreaterThan,
    /// Membership in any of the referenced segments.
    SegmentMatch,
    /// Operator not recognized by this runtime; never matches.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// SECTION: Clause
// ============================================================================

/// A single attribute test inside a rule.
///
/// # Invariants
/// - `values` are OR-ed; `negate` inverts the aggregate result.
/// - `attribute` is a literal name when `context_kind` is absent and a
///   reference path when it is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    /// Kind of the individual context this clause applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<ContextKind>,
    /// Attribute name or reference path, interpreted per `context_kind`.
    #[serde(default)]
    pub attribute: String,
    /// Operator applied between the attribute value and each clause value.
    pub op: Operator,
    /// Candidate values; a match against any one satisfies the clause.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Inverts the aggregate clause result.
    #[serde(default)]
    pub negate: bool,
    /// One-shot precomputation attached during finalization.
    #[serde(skip)]
    pub(crate) preprocessed: Option<ClausePreprocessed>,
}

impl Clause {
    /// Resolves the attribute field into a reference.
    ///
    /// With a context kind present the attribute is a reference path;
    /// without one it is a legacy literal name.
    #[must_use]
    pub fn attribute_reference(&self) -> AttributeRef {
        if self.context_kind.is_some() {
            AttributeRef::from_path(self.attribute.clone())
        } else {
            AttributeRef::from_literal(self.attribute.clone())
        }
    }

    /// Returns the kind of context this clause reads, defaulting to `user`.
    #[must_use]
    pub fn effective_context_kind(&self) -> ContextKind {
        self.context_kind.clone().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
