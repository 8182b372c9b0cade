// crates/flagwire-core/src/core/descriptor.rs
// ============================================================================
// Module: Flagwire Data Descriptors
// Description: Data kinds, versioned item descriptors, and snapshots.
// Purpose: Define the units held by data stores and moved by data sources.
// Dependencies: crate::core::{flag, segment}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The store is polymorphic over a closed set of data kinds. Each entry is an
//! [`ItemDescriptor`]: a version paired with either a live item or a
//! tombstone. Tombstones preserve the version of a deletion so last-writer-
//! wins comparisons keep working after an item is gone. Items are shared
//! behind `Arc` so store reads never copy rule trees.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::flag::FeatureFlag;
use crate::core::segment::Segment;

// ============================================================================
// SECTION: Data Kinds
// ============================================================================

/// The closed set of replicated data kinds.
///
/// # Invariants
/// - Variants are stable for serialization and store keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// Feature flags.
    Features,
    /// Segments.
    Segments,
}

impl DataKind {
    /// Every data kind, in store-initialization order.
    pub const ALL: [Self; 2] = [Self::Features, Self::Segments];

    /// Returns the stable lowercase name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Segments => "segments",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one stored item: its kind and key.
///
/// # Invariants
/// - Used as the node identity in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KindAndKey {
    /// Data kind of the item.
    pub kind: DataKind,
    /// Item key within the kind.
    pub key: String,
}

impl KindAndKey {
    /// Creates an identity from a kind and key.
    #[must_use]
    pub fn new(kind: DataKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

// ============================================================================
// SECTION: Items and Descriptors
// ============================================================================

/// A live stored item.
///
/// # Invariants
/// - The variant always matches the [`DataKind`] it is stored under.
#[derive(Debug, Clone)]
pub enum Item {
    /// A feature flag.
    Flag(Arc<FeatureFlag>),
    /// A segment.
    Segment(Arc<Segment>),
}

impl Item {
    /// Returns the item's key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Flag(flag) => &flag.key,
            Self::Segment(segment) => &segment.key,
        }
    }

    /// Returns the item's version.
    #[must_use]
    pub fn version(&self) -> u64 {
        match self {
            Self::Flag(flag) => flag.version,
            Self::Segment(segment) => segment.version,
        }
    }

    /// Returns the flag when this item is one.
    #[must_use]
    pub const fn as_flag(&self) -> Option<&Arc<FeatureFlag>> {
        match self {
            Self::Flag(flag) => Some(flag),
            Self::Segment(_) => None,
        }
    }

    /// Returns the segment when this item is one.
    #[must_use]
    pub const fn as_segment(&self) -> Option<&Arc<Segment>> {
        match self {
            Self::Flag(_) => None,
            Self::Segment(segment) => Some(segment),
        }
    }
}

/// A versioned store entry: a live item or a tombstone.
///
/// # Invariants
/// - `item` is `None` exactly for tombstones.
/// - Descriptors with equal keys compare by `version` for last-writer-wins.
#[derive(Debug, Clone)]
pub struct ItemDescriptor {
    /// Version of the item or of its deletion.
    pub version: u64,
    /// The live item; `None` marks a tombstone.
    pub item: Option<Item>,
}

impl ItemDescriptor {
    /// Wraps a live item.
    #[must_use]
    pub fn new(item: Item) -> Self {
        Self {
            version: item.version(),
            item: Some(item),
        }
    }

    /// Creates a tombstone preserving the deletion version.
    #[must_use]
    pub const fn tombstone(version: u64) -> Self {
        Self {
            version,
            item: None,
        }
    }

    /// Returns true for tombstones.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.item.is_none()
    }
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// All items of one kind, as delivered in a snapshot.
///
/// # Invariants
/// - `items` holds at most one entry per key.
#[derive(Debug, Clone, Default)]
pub struct DataCollection {
    /// Keyed descriptors in delivery (or dependency) order.
    pub items: Vec<(String, ItemDescriptor)>,
}

/// A full replacement snapshot across all data kinds.
///
/// # Invariants
/// - Holds exactly one collection per [`DataKind`].
#[derive(Debug, Clone)]
pub struct FullDataSet {
    /// Collections in `(kind, collection)` order.
    pub collections: Vec<(DataKind, DataCollection)>,
}

impl FullDataSet {
    /// Creates an empty snapshot covering every kind.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            collections: DataKind::ALL
                .into_iter()
                .map(|kind| (kind, DataCollection::default()))
                .collect(),
        }
    }

    /// Returns the collection for a kind, if present.
    #[must_use]
    pub fn collection(&self, kind: DataKind) -> Option<&DataCollection> {
        self.collections.iter().find(|(entry_kind, _)| *entry_kind == kind).map(|(_, c)| c)
    }
}

// ============================================================================
// SECTION: Deserialization
// ============================================================================

/// Errors raised while deserializing wire data into items.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The payload was not a valid item of the expected kind.
    #[error("invalid {kind} json: {message}")]
    InvalidItem {
        /// Data kind that was being deserialized.
        kind: DataKind,
        /// Underlying parser message.
        message: String,
    },
}

/// Deserializes and finalizes one item of the given kind.
///
/// Wire tombstones (`deleted: true`) become tombstone descriptors.
/// Finalization runs here, exactly once, before the item is shared.
///
/// # Errors
///
/// Returns [`SerializationError`] when the payload does not parse.
pub fn deserialize_item(kind: DataKind, data: Value) -> Result<ItemDescriptor, SerializationError> {
    match kind {
        DataKind::Features => {
            let mut flag: FeatureFlag =
                serde_json::from_value(data).map_err(|err| SerializationError::InvalidItem {
                    kind,
                    message: err.to_string(),
                })?;
            if flag.deleted {
                return Ok(ItemDescriptor::tombstone(flag.version));
            }
            flag.finalize();
            Ok(ItemDescriptor::new(Item::Flag(Arc::new(flag))))
        }
        DataKind::Segments => {
            let mut segment: Segment =
                serde_json::from_value(data).map_err(|err| SerializationError::InvalidItem {
                    kind,
                    message: err.to_string(),
                })?;
            if segment.deleted {
                return Ok(ItemDescriptor::tombstone(segment.version));
            }
            segment.finalize();
            Ok(ItemDescriptor::new(Item::Segment(Arc::new(segment))))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
