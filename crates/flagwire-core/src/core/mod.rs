// crates/flagwire-core/src/core/mod.rs
// ============================================================================
// Module: Flagwire Core Model
// Description: Data model shared by the evaluator and the data pipeline.
// Purpose: Group contexts, flags, segments, descriptors, and reasons.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The core model mirrors the wire format of the flag configuration service.
//! Items are immutable after finalization and shared behind `Arc` by the
//! store, so evaluation reads never copy rule trees.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod attributes;
pub mod clause;
pub mod context;
pub mod descriptor;
pub mod flag;
pub mod preprocessed;
pub mod reason;
pub mod segment;
pub mod semver;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attributes::AttributeRef;
pub use attributes::AttributeRefError;
pub use clause::Clause;
pub use clause::Operator;
pub use context::Context;
pub use context::ContextBuilder;
pub use context::ContextError;
pub use context::ContextKind;
pub use context::SingleContext;
pub use descriptor::DataCollection;
pub use descriptor::DataKind;
pub use descriptor::FullDataSet;
pub use descriptor::Item;
pub use descriptor::ItemDescriptor;
pub use descriptor::KindAndKey;
pub use descriptor::SerializationError;
pub use descriptor::deserialize_item;
pub use flag::ClientSideAvailability;
pub use flag::FeatureFlag;
pub use flag::FlagRule;
pub use flag::MigrationSettings;
pub use flag::Prerequisite;
pub use flag::Rollout;
pub use flag::RolloutKind;
pub use flag::Target;
pub use flag::VariationOrRollout;
pub use flag::WeightedVariation;
pub use reason::BigSegmentsStatus;
pub use reason::Detail;
pub use reason::ErrorKind;
pub use reason::EvaluationReason;
pub use reason::ReasonKind;
pub use segment::Segment;
pub use segment::SegmentRule;
pub use segment::SegmentTarget;
pub use semver::SemanticVersion;
pub use time::UnixMillis;
pub use time::now_unix_millis;
