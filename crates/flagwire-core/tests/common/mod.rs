// crates/flagwire-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Support
// Description: Shared fixtures for evaluator and segment tests.
// ============================================================================
//! ## Overview
//! Builds finalized flags and segments from wire JSON and provides an
//! in-memory store stub for evaluator tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers; not every test file uses every helper."
)]

use std::collections::HashMap;
use std::sync::Mutex;

use flagwire_core::DataKind;
use flagwire_core::DataStore;
use flagwire_core::FullDataSet;
use flagwire_core::ItemDescriptor;
use flagwire_core::StoreError;
use flagwire_core::deserialize_item;
use serde_json::Value;

/// Minimal in-memory store for evaluator tests.
#[derive(Default)]
pub struct TestStore {
    items: Mutex<HashMap<(DataKind, String), ItemDescriptor>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a flag from wire JSON, finalizing it.
    pub fn with_flag(self, json: Value) -> Self {
        self.insert(DataKind::Features, json)
    }

    /// Inserts a segment from wire JSON, finalizing it.
    pub fn with_segment(self, json: Value) -> Self {
        self.insert(DataKind::Segments, json)
    }

    fn insert(self, kind: DataKind, json: Value) -> Self {
        let key = json
            .get("key")
            .and_then(Value::as_str)
            .expect("fixture items carry a key")
            .to_string();
        let descriptor = deserialize_item(kind, json).expect("fixture items deserialize");
        self.items.lock().unwrap().insert((kind, key), descriptor);
        self
    }
}

impl DataStore for TestStore {
    fn init(&self, data: FullDataSet) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap();
        items.clear();
        for (kind, collection) in data.collections {
            for (key, descriptor) in collection.items {
                items.insert((kind, key), descriptor);
            }
        }
        Ok(())
    }

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<ItemDescriptor>, StoreError> {
        Ok(self.items.lock().unwrap().get(&(kind, key.to_string())).cloned())
    }

    fn get_all(&self, kind: DataKind) -> Result<Vec<(String, ItemDescriptor)>, StoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|((item_kind, _), _)| *item_kind == kind)
            .map(|((_, key), descriptor)| (key.clone(), descriptor.clone()))
            .collect())
    }

    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> Result<bool, StoreError> {
        self.items.lock().unwrap().insert((kind, key.to_string()), item);
        Ok(true)
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

/// Store whose reads always fail, for error-path tests.
pub struct FailingStore;

impl DataStore for FailingStore {
    fn init(&self, _data: FullDataSet) -> Result<(), StoreError> {
        Err(StoreError::Io("injected".to_string()))
    }

    fn get(&self, _kind: DataKind, _key: &str) -> Result<Option<ItemDescriptor>, StoreError> {
        Err(StoreError::Io("injected".to_string()))
    }

    fn get_all(&self, _kind: DataKind) -> Result<Vec<(String, ItemDescriptor)>, StoreError> {
        Err(StoreError::Io("injected".to_string()))
    }

    fn upsert(&self, _kind: DataKind, _key: &str, _item: ItemDescriptor) -> Result<bool, StoreError> {
        Err(StoreError::Io("injected".to_string()))
    }

    fn is_initialized(&self) -> bool {
        false
    }
}
