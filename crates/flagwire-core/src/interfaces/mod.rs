// crates/flagwire-core/src/interfaces/mod.rs
// ============================================================================
// Module: Flagwire Interfaces
// Description: Backend-agnostic interfaces for stores, sources, and executors.
// Purpose: Define the contract surfaces the Flagwire runtime consumes.
// Dependencies: crate::core, base64, serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the runtime integrates with data stores, data
//! sources, big-segment backends, and the host's task executor without
//! embedding backend-specific details. Implementations must be deterministic
//! and fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::descriptor::DataKind;
use crate::core::descriptor::FullDataSet;
use crate::core::descriptor::ItemDescriptor;
use crate::core::reason::BigSegmentsStatus;
use crate::core::time::UnixMillis;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors surfaced by data-store and big-segment-store implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed to round-trip.
    #[error("store serialization error: {0}")]
    Serialization(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Data Store
// ============================================================================

/// Replicated store of versioned flag and segment descriptors.
///
/// Implementations must be safe for concurrent readers with exclusive
/// writers, and must apply last-writer-wins by version on `upsert`.
pub trait DataStore: Send + Sync {
    /// Atomically replaces all data with the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the snapshot cannot be committed.
    fn init(&self, data: FullDataSet) -> Result<(), StoreError>;

    /// Returns the descriptor for a key, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, kind: DataKind, key: &str) -> Result<Option<ItemDescriptor>, StoreError>;

    /// Returns every descriptor of a kind, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_all(&self, kind: DataKind) -> Result<Vec<(String, ItemDescriptor)>, StoreError>;

    /// Applies a descriptor iff its version is strictly newer.
    ///
    /// Returns true when the descriptor was applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> Result<bool, StoreError>;

    /// Returns true once a snapshot has been committed.
    fn is_initialized(&self) -> bool;

    /// Releases store resources.
    fn close(&self) {}
}

// ============================================================================
// SECTION: Data Source
// ============================================================================

/// A feed of flag configuration data (polling or streaming).
pub trait DataSource: Send {
    /// Begins ingestion.
    ///
    /// The returned channel yields `true` once the source has delivered its
    /// first full snapshot, or `false` if it gave up permanently.
    fn start(&mut self) -> Receiver<bool>;

    /// Stops ingestion and releases resources.
    fn close(&mut self);
}

/// Data-source lifecycle states.
///
/// # Invariants
/// - `Off` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceState {
    /// Starting up; no valid data received yet.
    Initializing,
    /// Receiving data normally.
    Valid,
    /// Connectivity or data problems; last known data still served.
    Interrupted,
    /// Permanently stopped.
    Off,
}

impl fmt::Display for DataSourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initializing => "INITIALIZING",
            Self::Valid => "VALID",
            Self::Interrupted => "INTERRUPTED",
            Self::Off => "OFF",
        })
    }
}

/// Classification of data-source errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceErrorKind {
    /// Unclassified failure.
    Unknown,
    /// Network-level failure reaching the service.
    NetworkError,
    /// HTTP error response from the service.
    ErrorResponse,
    /// A data-store operation failed.
    StoreError,
    /// Received data failed to deserialize.
    InvalidData,
}

impl fmt::Display for DataSourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "UNKNOWN",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ErrorResponse => "ERROR_RESPONSE",
            Self::StoreError => "STORE_ERROR",
            Self::InvalidData => "INVALID_DATA",
        })
    }
}

/// Details of the most recent data-source error.
///
/// # Invariants
/// - `time` is the millisecond epoch at which the error was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceErrorInfo {
    /// Error classification.
    pub kind: DataSourceErrorKind,
    /// HTTP status code for `ErrorResponse` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Human-readable description.
    pub message: String,
    /// Observation time.
    pub time: UnixMillis,
}

/// Snapshot of data-source health.
///
/// # Invariants
/// - `state_since` updates only on actual state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceStatus {
    /// Current lifecycle state.
    pub state: DataSourceState,
    /// When the current state was entered.
    pub state_since: UnixMillis,
    /// Most recent error, carried across state changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<DataSourceErrorInfo>,
}

/// Snapshot of persistent-store health.
///
/// # Invariants
/// - `refresh_needed` implies a cache may be serving stale data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataStoreStatus {
    /// Store is answering operations.
    pub available: bool,
    /// Store contents may be stale and should be rewritten when possible.
    pub refresh_needed: bool,
}

/// Sink through which a data source publishes updates.
///
/// Implementations commit to the store, maintain the dependency graph, emit
/// change events, and track source status.
pub trait DataSourceUpdateSink: Send + Sync {
    /// Replaces all data with a snapshot. Returns true on success.
    fn init(&self, data: FullDataSet) -> bool;

    /// Applies one descriptor. Returns true when the store accepted it.
    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> bool;

    /// Reports a data-source state transition.
    fn update_status(&self, state: DataSourceState, error: Option<DataSourceErrorInfo>);

    /// Returns the current persistent-store health.
    fn data_store_status(&self) -> DataStoreStatus;
}

// ============================================================================
// SECTION: Big-Segment Store
// ============================================================================

/// Membership answers for one hashed context key.
///
/// # Invariants
/// - Keys are generation-qualified segment references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BigSegmentMembership {
    /// Inclusion (`true`) or exclusion (`false`) per segment reference.
    map: HashMap<String, bool>,
}

impl BigSegmentMembership {
    /// Builds a membership from explicit per-reference answers.
    #[must_use]
    pub const fn new(map: HashMap<String, bool>) -> Self {
        Self {
            map,
        }
    }

    /// Returns the answer for a segment reference, or `None` when the store
    /// has no entry for it.
    #[must_use]
    pub fn included(&self, segment_ref: &str) -> Option<bool> {
        self.map.get(segment_ref).copied()
    }
}

/// Freshness metadata reported by a big-segment store.
///
/// # Invariants
/// - `last_up_to_date` is `None` when the backend has never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigSegmentStoreMetadata {
    /// Millisecond epoch of the last completed synchronization.
    pub last_up_to_date: Option<UnixMillis>,
}

/// Backend answering big-segment membership queries.
///
/// Queries receive the hashed context key produced by
/// [`big_segment_context_hash`].
pub trait BigSegmentStore: Send + Sync {
    /// Returns the membership map for a hashed context key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend query fails.
    fn membership(&self, hashed_key: &str) -> Result<Option<BigSegmentMembership>, StoreError>;

    /// Returns store freshness metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend query fails.
    fn metadata(&self) -> Result<BigSegmentStoreMetadata, StoreError>;

    /// Releases backend resources.
    fn close(&self) {}
}

/// Health of big-segment data as observed by the status poller.
///
/// # Invariants
/// - `stale` is meaningful only while `available` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigSegmentStoreStatus {
    /// The last metadata query succeeded.
    pub available: bool,
    /// The backend has not synchronized within the staleness bound.
    pub stale: bool,
}

/// Evaluator-facing membership resolver (the big-segment wrapper).
pub trait BigSegmentResolver: Send + Sync {
    /// Returns cached-or-fetched membership for an unhashed context key,
    /// plus the status the evaluation should surface.
    fn query_membership(
        &self,
        context_key: &str,
    ) -> (Option<Arc<BigSegmentMembership>>, BigSegmentsStatus);
}

/// Hashes a context key into the persisted big-segment key format:
/// standard-alphabet base64 (with padding) of the SHA-256 of the key.
#[must_use]
pub fn big_segment_context_hash(context_key: &str) -> String {
    STANDARD.encode(Sha256::digest(context_key.as_bytes()))
}

// ============================================================================
// SECTION: Task Executor
// ============================================================================

/// Host-provided executor for asynchronous listener dispatch.
///
/// Components never create their own worker pools; hosts inject one
/// executor, and components without an executor skip asynchronous work.
pub trait TaskExecutor: Send + Sync {
    /// Submits a task for eventual execution.
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_hash_is_base64_sha256() {
        // SHA-256("userkey") = 0b5e... ; spot-check shape and determinism.
        let hash = big_segment_context_hash("userkey");
        assert_eq!(hash.len(), 44);
        assert!(hash.ends_with('='));
        assert_eq!(hash, big_segment_context_hash("userkey"));
        assert_ne!(hash, big_segment_context_hash("userkey2"));
    }

    #[test]
    fn membership_answers_per_reference() {
        let membership = BigSegmentMembership::new(HashMap::from([
            ("seg.g1".to_string(), true),
            ("seg.g2".to_string(), false),
        ]));
        assert_eq!(membership.included("seg.g1"), Some(true));
        assert_eq!(membership.included("seg.g2"), Some(false));
        assert_eq!(membership.included("seg.g3"), None);
    }
}
