// crates/flagwire-core/src/core/context.rs
// ============================================================================
// Module: Flagwire Evaluation Contexts
// Description: Single-kind and multi-kind evaluation subjects.
// Purpose: Provide attribute resolution for the evaluator and bucketing.
// Dependencies: crate::core::attributes, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A context is the subject of a flag evaluation: either a single-kind
//! identity `(kind, key, attributes)` or a bundle of single-kind contexts
//! with distinct kinds. Attribute resolution selects the individual context
//! for a requested kind and then walks an attribute reference; the built-in
//! attributes `key`, `kind`, `name`, and `anonymous` resolve by name ahead of
//! custom attributes.
//!
//! Invariants:
//! - Every context holds a non-empty key per kind.
//! - Multi-kind bundles contain no duplicate kinds and no nested bundles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::attributes::AttributeRef;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Context construction errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Context key was empty.
    #[error("context key must not be empty")]
    EmptyKey,
    /// Context kind contained invalid characters or was reserved.
    #[error("invalid context kind: {0}")]
    InvalidKind(String),
    /// Multi-kind bundle contained two contexts of the same kind.
    #[error("duplicate context kind: {0}")]
    DuplicateKind(String),
    /// Multi-kind bundle contained another multi-kind context.
    #[error("multi-kind context cannot nest another multi-kind context")]
    NestedMultiKind,
    /// Multi-kind bundle was empty.
    #[error("multi-kind context requires at least one context")]
    EmptyMultiKind,
}

// ============================================================================
// SECTION: Context Kind
// ============================================================================

/// Validated context kind name.
///
/// # Invariants
/// - Locally built kinds are non-empty, limited to `[A-Za-z0-9._-]`, and
///   never the reserved words `kind` or `multi`.
/// - Kinds arriving in flag data deserialize as-is; a malformed kind simply
///   matches no context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKind(String);

impl ContextKind {
    /// The default kind applied when none is specified.
    pub const DEFAULT: &'static str = "user";

    /// Creates a validated context kind.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidKind`] for empty, reserved, or
    /// malformed kind names.
    pub fn new(kind: impl Into<String>) -> Result<Self, ContextError> {
        let kind = kind.into();
        let well_formed = !kind.is_empty()
            && kind.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
        if !well_formed || kind == "kind" || kind == "multi" {
            return Err(ContextError::InvalidKind(kind));
        }
        Ok(Self(kind))
    }

    /// Returns the default `user` kind.
    #[must_use]
    pub fn default_kind() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Returns a shared reference to the default `user` kind.
    ///
    /// Evaluation-path code uses this to avoid per-evaluation allocation.
    #[must_use]
    pub fn default_ref() -> &'static Self {
        /// Shared default kind instance.
        static DEFAULT: Lazy<ContextKind> = Lazy::new(ContextKind::default_kind);
        &DEFAULT
    }

    /// Returns true for the default `user` kind.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    /// Returns the kind name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextKind {
    fn default() -> Self {
        Self::default_kind()
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Single-Kind Context
// ============================================================================

/// A single-kind evaluation subject.
///
/// # Invariants
/// - `key` is non-empty.
/// - Cached built-in values mirror `kind`, `key`, `name`, and `anonymous`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleContext {
    /// Context kind.
    kind: ContextKind,
    /// Context key, unique within a kind.
    key: String,
    /// Optional display name.
    name: Option<String>,
    /// Anonymity marker.
    anonymous: bool,
    /// Custom attributes keyed by top-level name.
    attributes: Map<String, Value>,
    /// Cached `key` as a JSON value for reference resolution.
    key_value: Value,
    /// Cached `kind` as a JSON value for reference resolution.
    kind_value: Value,
    /// Cached `name` as a JSON value for reference resolution.
    name_value: Option<Value>,
    /// Cached `anonymous` as a JSON value for reference resolution.
    anonymous_value: Value,
}

impl SingleContext {
    /// Returns the context kind.
    #[must_use]
    pub const fn kind(&self) -> &ContextKind {
        &self.kind
    }

    /// Returns the context key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the display name when present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the anonymity marker.
    #[must_use]
    pub const fn anonymous(&self) -> bool {
        self.anonymous
    }

    /// Resolves an attribute reference against this context.
    ///
    /// Built-in attributes resolve first; deeper components traverse JSON
    /// objects only. Invalid references and missing attributes yield `None`.
    #[must_use]
    pub fn get_value(&self, reference: &AttributeRef) -> Option<&Value> {
        if !reference.is_valid() {
            return None;
        }
        let mut current = self.top_level_value(reference.component(0)?)?;
        for index in 1..reference.depth() {
            let component = reference.component(index)?;
            current = current.as_object()?.get(component)?;
        }
        Some(current)
    }

    /// Resolves a top-level attribute name, built-ins first.
    fn top_level_value(&self, name: &str) -> Option<&Value> {
        match name {
            "key" => Some(&self.key_value),
            "kind" => Some(&self.kind_value),
            "name" => self.name_value.as_ref(),
            "anonymous" => Some(&self.anonymous_value),
            other => self.attributes.get(other),
        }
    }
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// An evaluation context: one identity or a multi-kind bundle.
///
/// # Invariants
/// - Multi-kind bundles hold at least two contexts with distinct kinds,
///   ordered by kind name.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    /// A single-kind context.
    Single(SingleContext),
    /// A bundle of single-kind contexts with distinct kinds.
    Multi(Vec<SingleContext>),
}

impl Context {
    /// Creates a default-kind (`user`) context with the provided key.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::EmptyKey`] when the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ContextError> {
        ContextBuilder::new(key).build()
    }

    /// Creates a context of an explicit kind with the provided key.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is empty or the kind invalid.
    pub fn with_kind(kind: impl Into<String>, key: impl Into<String>) -> Result<Self, ContextError> {
        ContextBuilder::new(key).kind(kind).build()
    }

    /// Combines single-kind contexts into a multi-kind bundle.
    ///
    /// A bundle of one collapses to that single context.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] on empty input, nested bundles, or duplicate
    /// kinds.
    pub fn multi(contexts: Vec<Self>) -> Result<Self, ContextError> {
        if contexts.is_empty() {
            return Err(ContextError::EmptyMultiKind);
        }
        let mut singles = Vec::with_capacity(contexts.len());
        for context in contexts {
            match context {
                Self::Single(single) => singles.push(single),
                Self::Multi(_) => return Err(ContextError::NestedMultiKind),
            }
        }
        if singles.len() == 1 {
            let Some(only) = singles.pop() else {
                return Err(ContextError::EmptyMultiKind);
            };
            return Ok(Self::Single(only));
        }
        singles.sort_by(|left, right| left.kind().as_str().cmp(right.kind().as_str()));
        for pair in singles.windows(2) {
            if pair[0].kind() == pair[1].kind() {
                return Err(ContextError::DuplicateKind(pair[0].kind().as_str().to_string()));
            }
        }
        Ok(Self::Multi(singles))
    }

    /// Returns true for multi-kind bundles.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// Selects the individual context for a kind, if present.
    #[must_use]
    pub fn individual_context(&self, kind: &ContextKind) -> Option<&SingleContext> {
        match self {
            Self::Single(single) => (single.kind() == kind).then_some(single),
            Self::Multi(singles) => singles.iter().find(|single| single.kind() == kind),
        }
    }

    /// Returns every kind name in this context.
    #[must_use]
    pub fn kind_names(&self) -> Vec<&str> {
        match self {
            Self::Single(single) => vec![single.kind().as_str()],
            Self::Multi(singles) => singles.iter().map(|single| single.kind().as_str()).collect(),
        }
    }
}

// ============================================================================
// SECTION: Context Builder
// ============================================================================

/// Builder for single-kind contexts.
///
/// # Invariants
/// - `build` validates the key and kind; attributes are taken as-is.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    /// Kind name; validated at build time.
    kind: String,
    /// Context key.
    key: String,
    /// Optional display name.
    name: Option<String>,
    /// Anonymity marker.
    anonymous: bool,
    /// Custom attributes keyed by top-level name.
    attributes: Map<String, Value>,
}

impl ContextBuilder {
    /// Creates a builder with the provided key and the default kind.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::DEFAULT.to_string(),
            key: key.into(),
            name: None,
            anonymous: false,
            attributes: Map::new(),
        }
    }

    /// Sets the context kind.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the anonymity marker.
    #[must_use]
    pub const fn anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// Sets a custom top-level attribute.
    ///
    /// Built-in attributes (`key`, `kind`, `name`, `anonymous`) have
    /// dedicated builder methods and shadow custom attributes of the same
    /// name during resolution.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Builds the validated context.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is empty or the kind invalid.
    pub fn build(self) -> Result<Context, ContextError> {
        if self.key.is_empty() {
            return Err(ContextError::EmptyKey);
        }
        let kind = ContextKind::new(self.kind)?;
        let key_value = Value::String(self.key.clone());
        let kind_value = Value::String(kind.as_str().to_string());
        let name_value = self.name.clone().map(Value::String);
        let anonymous_value = Value::Bool(self.anonymous);
        Ok(Context::Single(SingleContext {
            kind,
            key: self.key,
            name: self.name,
            anonymous: self.anonymous,
            attributes: self.attributes,
            key_value,
            kind_value,
            name_value,
            anonymous_value,
        }))
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

    fn expect_single(context: Context) -> SingleContext {
        match context {
            Context::Single(single) => single,
            Context::Multi(_) => panic!("expected a single-kind context"),
        }
    }

    #[test]
    fn builtin_attributes_resolve_by_name() {
        let context = expect_single(
            ContextBuilder::new("alice")
                .name("Alice")
                .anonymous(true)
                .set("tier", json!("gold"))
                .build()
                .unwrap(),
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_literal("key")),
            Some(&json!("alice"))
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_literal("kind")),
            Some(&json!("user"))
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_literal("name")),
            Some(&json!("Alice"))
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_literal("anonymous")),
            Some(&json!(true))
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_literal("tier")),
            Some(&json!("gold"))
        );
        assert_eq!(context.get_value(&AttributeRef::from_literal("missing")), None);
    }

    #[test]
    fn path_references_traverse_objects() {
        let context = expect_single(
            ContextBuilder::new("alice")
                .set("address", json!({"city": {"name": "Oslo"}}))
                .build()
                .unwrap(),
        );
        assert_eq!(
            context.get_value(&AttributeRef::from_path("/address/city/name")),
            Some(&json!("Oslo"))
        );
        assert_eq!(context.get_value(&AttributeRef::from_path("/address/street")), None);
    }

    #[test]
    fn multi_kind_selects_by_kind() {
        let user = Context::new("u1").unwrap();
        let org = Context::with_kind("org", "acme").unwrap();
        let multi = Context::multi(vec![user, org]).unwrap();
        assert!(multi.is_multi());
        let org_kind = ContextKind::new("org").unwrap();
        assert_eq!(multi.individual_context(&org_kind).map(SingleContext::key), Some("acme"));
        assert_eq!(multi.kind_names(), vec!["org", "user"]);
    }

    #[test]
    fn invalid_constructions_are_rejected() {
        assert_eq!(Context::new("").unwrap_err(), ContextError::EmptyKey);
        assert!(matches!(
            Context::with_kind("kind", "x").unwrap_err(),
            ContextError::InvalidKind(_)
        ));
        assert!(matches!(
            Context::multi(vec![Context::new("a").unwrap(), Context::new("b").unwrap()])
                .unwrap_err(),
            ContextError::DuplicateKind(_)
        ));
        assert_eq!(Context::multi(Vec::new()).unwrap_err(), ContextError::EmptyMultiKind);
    }
}
