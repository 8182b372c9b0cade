// crates/flagwire-data/src/lib.rs
// ============================================================================
// Module: Flagwire Data Library
// Description: The replicated data pipeline behind the evaluation engine.
// Purpose: Store, order, and fan out flag configuration updates.
// Dependencies: flagwire-core, lru, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Flagwire Data implements the data half of the runtime: the in-memory
//! versioned store, the dependency-aware sink every data source publishes
//! through, source and store status machinery, the big-segment wrapper, and
//! the broadcaster plus flag trackers that deliver change events to hosts.
//! Invariants:
//! - Snapshots commit atomically; change events fire after the store
//!   reflects the update.
//! - Stale-version writes are no-ops and broadcast nothing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod big_segments;
pub mod broadcast;
pub mod constants;
pub mod dependencies;
pub mod listeners;
pub mod protocol;
pub mod sink;
pub mod status;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use big_segments::BigSegmentStoreWrapper;
pub use big_segments::BigSegmentsConfig;
pub use broadcast::Broadcaster;
pub use broadcast::ListenerHandle;
pub use dependencies::DependencyTracker;
pub use dependencies::compute_dependencies_from;
pub use dependencies::sort_all_collections;
pub use listeners::FlagChangeEvent;
pub use listeners::FlagTracker;
pub use listeners::FlagValueChangeEvent;
pub use protocol::parse_delete;
pub use protocol::parse_full_snapshot;
pub use protocol::parse_patch;
pub use protocol::parse_path;
pub use sink::StoreUpdateSink;
pub use status::DataSourceStatusHolder;
pub use status::DataStoreStatusHolder;
pub use status::OutageTracker;
pub use store::InMemoryDataStore;
