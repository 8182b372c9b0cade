// crates/flagwire-core/src/lib.rs
// ============================================================================
// Module: Flagwire Core Library
// Description: Flag evaluation engine, data model, and collaborator interfaces.
// Purpose: Evaluate feature flags deterministically against local data.
// Dependencies: base64, once_cell, regex, serde, serde_json, sha1, sha2,
// thiserror, time, tracing
// ============================================================================

//! ## Overview
//! Flagwire Core holds the server-side flag evaluation engine: the wire data
//! model, attribute and context resolution, the operator kernel, segment
//! matching, and the evaluator itself, plus the backend-agnostic interfaces
//! the data pipeline plugs into.
//! Invariants:
//! - Evaluation never returns an error to the caller; failures become error
//!   reasons carrying the caller's default value.
//! - Items are immutable after finalization and shared by reference.
//! - Bucketing is deterministic and stable across runs and platforms.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::AttributeRef;
pub use crate::core::BigSegmentsStatus;
pub use crate::core::Clause;
pub use crate::core::Context;
pub use crate::core::ContextBuilder;
pub use crate::core::ContextError;
pub use crate::core::ContextKind;
pub use crate::core::DataCollection;
pub use crate::core::DataKind;
pub use crate::core::Detail;
pub use crate::core::ErrorKind;
pub use crate::core::EvaluationReason;
pub use crate::core::FeatureFlag;
pub use crate::core::FullDataSet;
pub use crate::core::Item;
pub use crate::core::ItemDescriptor;
pub use crate::core::KindAndKey;
pub use crate::core::Operator;
pub use crate::core::Segment;
pub use crate::core::SerializationError;
pub use crate::core::UnixMillis;
pub use crate::core::deserialize_item;
pub use crate::core::now_unix_millis;
pub use crate::interfaces::BigSegmentMembership;
pub use crate::interfaces::BigSegmentResolver;
pub use crate::interfaces::BigSegmentStore;
pub use crate::interfaces::BigSegmentStoreMetadata;
pub use crate::interfaces::BigSegmentStoreStatus;
pub use crate::interfaces::DataSource;
pub use crate::interfaces::DataSourceErrorInfo;
pub use crate::interfaces::DataSourceErrorKind;
pub use crate::interfaces::DataSourceState;
pub use crate::interfaces::DataSourceStatus;
pub use crate::interfaces::DataSourceUpdateSink;
pub use crate::interfaces::DataStore;
pub use crate::interfaces::DataStoreStatus;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::TaskExecutor;
pub use crate::interfaces::big_segment_context_hash;
pub use crate::runtime::EvaluationOutcome;
pub use crate::runtime::Evaluator;
pub use crate::runtime::PrerequisiteEvaluation;
