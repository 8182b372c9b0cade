// crates/flagwire-core/src/core/semver.rs
// ============================================================================
// Module: Flagwire Semantic Versions
// Description: Permissive semantic version parsing and SemVer 2.0 ordering.
// Purpose: Back the semVer clause operators with stable comparisons.
// Dependencies: once_cell, regex
// ============================================================================

//! ## Overview
//! Clause operands and context attributes parse permissively: a missing minor
//! or patch component defaults to zero, so `"2"` and `"2.0.0"` compare equal.
//! Build metadata is parsed and then ignored for ordering. Pre-release
//! identifiers order by the SemVer 2.0 precedence rules (numeric identifiers
//! before alphanumeric, a release above any of its pre-releases).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Permissive semantic version pattern with optional minor/patch components.
static VERSION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^(?P<major>0|[1-9]\d*)(\.(?P<minor>0|[1-9]\d*))?(\.(?P<patch>0|[1-9]\d*))?(-(?P<prerel>[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*))?(\+(?P<build>[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*))?$",
    )
    .ok()
});

/// A pre-release identifier ordered per SemVer 2.0.
///
/// # Invariants
/// - Numeric identifiers sort below alphanumeric identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    /// Purely numeric identifier compared as an integer.
    Numeric(u64),
    /// Alphanumeric identifier compared lexically by ASCII.
    Alphanumeric(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(left), Self::Numeric(right)) => left.cmp(right),
            (Self::Numeric(_), Self::Alphanumeric(_)) => Ordering::Less,
            (Self::Alphanumeric(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alphanumeric(left), Self::Alphanumeric(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed semantic version with permissive defaults.
///
/// # Invariants
/// - Build metadata never participates in ordering or equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    /// Major version component.
    major: u64,
    /// Minor version component (zero when omitted).
    minor: u64,
    /// Patch version component (zero when omitted).
    patch: u64,
    /// Pre-release identifiers in declared order; empty for releases.
    prerelease: Vec<Identifier>,
}

impl SemanticVersion {
    /// Parses a version string, defaulting missing minor/patch to zero.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let pattern = VERSION_PATTERN.as_ref()?;
        let captures = pattern.captures(input)?;
        let major = captures.name("major")?.as_str().parse().ok()?;
        let minor = match captures.name("minor") {
            Some(text) => text.as_str().parse().ok()?,
            None => 0,
        };
        let patch = match captures.name("patch") {
            Some(text) => text.as_str().parse().ok()?,
            None => 0,
        };
        let prerelease = match captures.name("prerel") {
            Some(text) => text.as_str().split('.').map(parse_identifier).collect(),
            None => Vec::new(),
        };
        Some(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}

/// Classifies a pre-release identifier as numeric or alphanumeric.
fn parse_identifier(text: &str) -> Identifier {
    // Identifiers with leading zeros are alphanumeric per the grammar.
    if text != "0" && text.starts_with('0') {
        return Identifier::Alphanumeric(text.to_string());
    }
    text.parse::<u64>()
        .map_or_else(|_| Identifier::Alphanumeric(text.to_string()), Identifier::Numeric)
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let core = self
            .major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch));
        if core != Ordering::Equal {
            return core;
        }
        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.prerelease.cmp(&other.prerelease),
        }
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
