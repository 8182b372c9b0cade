// crates/flagwire-data/tests/common/mod.rs
// ============================================================================
// Module: Data Test Support
// Description: Shared executors and fixtures for data pipeline tests.
// ============================================================================
//! ## Overview
//! Provides an inline executor for deterministic broadcast tests, a
//! thread-spawning executor for poller tests, and wire-JSON fixture
//! builders for flags and segments.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers; not every test file uses every helper."
)]

use flagwire_core::DataKind;
use flagwire_core::FullDataSet;
use flagwire_core::ItemDescriptor;
use flagwire_core::TaskExecutor;
use flagwire_core::deserialize_item;
use serde_json::Value;
use serde_json::json;

/// Runs tasks inline on the calling thread for deterministic assertions.
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Runs each task on its own thread, for long-running poller tasks.
pub struct SpawnExecutor;

impl TaskExecutor for SpawnExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(task);
    }
}

/// Builds a minimal boolean flag payload.
pub fn flag_json(key: &str, version: u64) -> Value {
    json!({
        "key": key,
        "version": version,
        "on": true,
        "variations": [false, true],
        "fallthrough": {"variation": 1},
        "offVariation": 0,
        "salt": "salt",
    })
}

/// Builds a flag payload with a prerequisite edge.
pub fn flag_with_prerequisite(key: &str, version: u64, prerequisite: &str) -> Value {
    json!({
        "key": key,
        "version": version,
        "on": true,
        "variations": [false, true],
        "fallthrough": {"variation": 1},
        "offVariation": 0,
        "prerequisites": [{"key": prerequisite, "variation": 1}],
        "salt": "salt",
    })
}

/// Builds a flag payload referencing a segment from a rule.
pub fn flag_with_segment(key: &str, version: u64, segment: &str) -> Value {
    json!({
        "key": key,
        "version": version,
        "on": true,
        "variations": [false, true],
        "fallthrough": {"variation": 0},
        "rules": [{
            "id": "seg-rule",
            "variation": 1,
            "clauses": [{"attribute": "", "op": "segmentMatch", "values": [segment]}],
        }],
        "salt": "salt",
    })
}

/// Builds a minimal segment payload.
pub fn segment_json(key: &str, version: u64, included: &[&str]) -> Value {
    json!({
        "key": key,
        "version": version,
        "included": included,
        "salt": "salt",
    })
}

/// Deserializes one finalized descriptor from fixture JSON.
pub fn descriptor(kind: DataKind, json: Value) -> ItemDescriptor {
    deserialize_item(kind, json).expect("fixture items deserialize")
}

/// Assembles a snapshot from flag and segment fixture JSON.
pub fn snapshot(flags: Vec<Value>, segments: Vec<Value>) -> FullDataSet {
    let mut payload_flags = serde_json::Map::new();
    for flag in flags {
        let key = flag.get("key").and_then(Value::as_str).expect("fixture key").to_string();
        payload_flags.insert(key, flag);
    }
    let mut payload_segments = serde_json::Map::new();
    for segment in segments {
        let key = segment.get("key").and_then(Value::as_str).expect("fixture key").to_string();
        payload_segments.insert(key, segment);
    }
    flagwire_data::parse_full_snapshot(json!({
        "flags": payload_flags,
        "segments": payload_segments,
    }))
    .expect("fixture snapshots parse")
}
