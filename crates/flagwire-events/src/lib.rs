// crates/flagwire-events/src/lib.rs
// ============================================================================
// Module: Flagwire Events Library
// Description: Analytics event inputs, summarization, and queueing.
// Purpose: Turn evaluation activity into flushable analytics batches.
// Dependencies: flagwire-core, rand, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! Flagwire Events covers the in-process half of analytics: typed event
//! inputs, the single-writer summarizer, the migration-operation tracker,
//! and a queue-fed processor that buffers full events between flushes.
//! Event delivery (wire encoding, batching endpoints) is a host concern and
//! lives outside this workspace.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod event;
pub mod migrations;
pub mod processor;
mod sampling;
pub mod summary;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use event::CustomEvent;
pub use event::EvaluationEvent;
pub use event::EventInput;
pub use event::IdentifyEvent;
pub use event::MigrationOp;
pub use event::MigrationOpEvent;
pub use event::MigrationOrigin;
pub use migrations::MigrationOpTracker;
pub use migrations::MigrationTrackerError;
pub use processor::DefaultEventProcessor;
pub use processor::EventBatch;
pub use processor::EventProcessor;
pub use summary::CounterKey;
pub use summary::CounterValue;
pub use summary::EventSummarizer;
pub use summary::EventSummary;
pub use summary::FlagSummary;
