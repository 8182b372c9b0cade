// crates/flagwire-data/src/protocol.rs
// ============================================================================
// Module: Flagwire Wire Protocol
// Description: Snapshot, patch, and delete payloads from data sources.
// Purpose: Turn transport JSON into finalized store descriptors.
// Dependencies: flagwire-core, serde_json
// ============================================================================

//! ## Overview
//! Streaming and polling transports deliver three payload shapes: a full
//! snapshot (optional `flags`/`segments` maps), a patch (`path` plus one
//! item), and a delete (`path` plus a version). Paths are
//! `/flags/<key>` or `/segments/<key>`; unknown paths are silently ignored,
//! never treated as errors. All deserialization and finalization happens
//! here, before anything reaches the sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use flagwire_core::DataCollection;
use flagwire_core::DataKind;
use flagwire_core::FullDataSet;
use flagwire_core::ItemDescriptor;
use flagwire_core::SerializationError;
use flagwire_core::deserialize_item;

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Parses a patch or delete path into a kind and key.
///
/// Returns `None` for unknown paths, which callers ignore.
#[must_use]
pub fn parse_path(path: &str) -> Option<(DataKind, &str)> {
    path.strip_prefix("/flags/")
        .map(|key| (DataKind::Features, key))
        .or_else(|| path.strip_prefix("/segments/").map(|key| (DataKind::Segments, key)))
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Parses a full snapshot payload into a finalized data set.
///
/// # Errors
///
/// Returns [`SerializationError`] when any item fails to deserialize; the
/// snapshot is rejected as a whole.
pub fn parse_full_snapshot(payload: Value) -> Result<FullDataSet, SerializationError> {
    let mut object = match payload {
        Value::Object(object) => object,
        other => {
            return Err(SerializationError::InvalidItem {
                kind: DataKind::Features,
                message: format!("snapshot payload must be an object, got {}", type_name(&other)),
            });
        }
    };
    let flags = take_collection(&mut object, "flags", DataKind::Features)?;
    let segments = take_collection(&mut object, "segments", DataKind::Segments)?;
    Ok(FullDataSet {
        collections: vec![(DataKind::Features, flags), (DataKind::Segments, segments)],
    })
}

/// Deserializes one optional kind map out of the snapshot object.
fn take_collection(
    object: &mut Map<String, Value>,
    field: &str,
    kind: DataKind,
) -> Result<DataCollection, SerializationError> {
    let mut collection = DataCollection::default();
    let Some(Value::Object(items)) = object.remove(field) else {
        return Ok(collection);
    };
    for (key, item) in items {
        let descriptor = deserialize_item(kind, item)?;
        collection.items.push((key, descriptor));
    }
    Ok(collection)
}

/// Names a JSON value shape for error messages.
const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Patches and Deletes
// ============================================================================

/// Parses a patch payload into a store write.
///
/// Returns `Ok(None)` for unknown paths.
///
/// # Errors
///
/// Returns [`SerializationError`] when the item fails to deserialize.
pub fn parse_patch(
    path: &str,
    data: Value,
) -> Result<Option<(DataKind, String, ItemDescriptor)>, SerializationError> {
    let Some((kind, key)) = parse_path(path) else {
        return Ok(None);
    };
    let descriptor = deserialize_item(kind, data)?;
    Ok(Some((kind, key.to_string(), descriptor)))
}

/// Parses a delete payload into a tombstone write.
///
/// Returns `None` for unknown paths.
#[must_use]
pub fn parse_delete(path: &str, version: u64) -> Option<(DataKind, String, ItemDescriptor)> {
    let (kind, key) = parse_path(path)?;
    Some((kind, key.to_string(), ItemDescriptor::tombstone(version)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
