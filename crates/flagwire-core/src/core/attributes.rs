// crates/flagwire-core/src/core/attributes.rs
// ============================================================================
// Module: Flagwire Attribute References
// Description: Parsed references into context attribute structures.
// Purpose: Resolve clause and rollout attribute targets deterministically.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An attribute reference selects a value inside a context. It has two
//! constructors: a literal name (used when a clause carries no context kind)
//! and a JSON-pointer-like `/a/b/c` path (used when a kind is present).
//! Path components unescape `~1` to `/` and `~0` to `~`. An invalid
//! reference never matches and never raises an error during evaluation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Parse errors for attribute references.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttributeRefError {
    /// The reference string was empty.
    #[error("attribute reference is empty")]
    Empty,
    /// A path contained an empty component (leading, trailing, or doubled slash).
    #[error("attribute reference has an empty path component")]
    EmptyComponent,
    /// A path component contained an invalid `~` escape.
    #[error("attribute reference has an invalid escape sequence")]
    InvalidEscape,
}

// ============================================================================
// SECTION: Attribute Reference
// ============================================================================

/// A parsed reference to a context attribute.
///
/// # Invariants
/// - `components` is non-empty iff `error` is `None`.
/// - `raw` round-trips the original input for diagnostics and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeRef {
    /// Original reference string as received.
    raw: String,
    /// Unescaped path components; empty when the reference is invalid.
    components: Vec<String>,
    /// Parse error recorded for invalid references.
    error: Option<AttributeRefError>,
}

impl AttributeRef {
    /// Creates a reference treating the whole input as a single attribute name.
    ///
    /// A literal name may contain `/` or `~` without escaping.
    #[must_use]
    pub fn from_literal(name: impl Into<String>) -> Self {
        let raw = name.into();
        if raw.is_empty() {
            return Self::invalid(raw, AttributeRefError::Empty);
        }
        let component = raw.clone();
        Self {
            raw,
            components: vec![component],
            error: None,
        }
    }

    /// Creates a reference from a path string.
    ///
    /// Inputs starting with `/` parse as multi-component paths; anything else
    /// is treated as a literal single-component name.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let raw = path.into();
        if raw.is_empty() {
            return Self::invalid(raw, AttributeRefError::Empty);
        }
        if !raw.starts_with('/') {
            return Self::from_literal(raw);
        }
        if raw == "/" {
            return Self::invalid(raw, AttributeRefError::EmptyComponent);
        }
        let mut components = Vec::new();
        for part in raw[1..].split('/') {
            if part.is_empty() {
                return Self::invalid(raw, AttributeRefError::EmptyComponent);
            }
            match unescape_component(part) {
                Some(component) => components.push(component),
                None => return Self::invalid(raw, AttributeRefError::InvalidEscape),
            }
        }
        Self {
            raw,
            components,
            error: None,
        }
    }

    /// Builds an invalid reference carrying its parse error.
    fn invalid(raw: String, error: AttributeRefError) -> Self {
        Self {
            raw,
            components: Vec::new(),
            error: Some(error),
        }
    }

    /// Returns true when the reference parsed successfully.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the parse error for invalid references.
    #[must_use]
    pub const fn error(&self) -> Option<AttributeRefError> {
        self.error
    }

    /// Returns the number of path components (zero when invalid).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Returns the unescaped component at `index`.
    #[must_use]
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    /// Returns the original reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for AttributeRef {
    type Error = AttributeRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = Self::from_path(value);
        match parsed.error {
            Some(error) => Err(error),
            None => Ok(parsed),
        }
    }
}

impl From<AttributeRef> for String {
    fn from(value: AttributeRef) -> Self {
        value.raw
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Unescapes a single path component (`~1` to `/`, `~0` to `~`).
fn unescape_component(component: &str) -> Option<String> {
    if !component.contains('~') {
        return Some(component.to_string());
    }
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
