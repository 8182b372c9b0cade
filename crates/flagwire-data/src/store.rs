// crates/flagwire-data/src/store.rs
// ============================================================================
// Module: Flagwire In-Memory Store
// Description: The default versioned data store.
// Purpose: Hold the replicated flag and segment descriptors in process.
// Dependencies: flagwire-core
// ============================================================================

//! ## Overview
//! The in-memory store keeps one descriptor map per data kind behind a
//! single read/write lock. Readers never block each other; `init` swaps all
//! kinds atomically, so a concurrent `get_all` observes either the old or
//! the new snapshot in full. Tombstones stay queryable so last-writer-wins
//! version comparison keeps working after deletions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;

use flagwire_core::DataKind;
use flagwire_core::DataStore;
use flagwire_core::FullDataSet;
use flagwire_core::ItemDescriptor;
use flagwire_core::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable state guarded by the store lock.
#[derive(Default)]
struct StoreState {
    /// Descriptor maps per data kind.
    data: HashMap<DataKind, HashMap<String, ItemDescriptor>>,
    /// True once a snapshot has been committed.
    initialized: bool,
}

/// The default in-process data store.
///
/// # Invariants
/// - At most one live descriptor per `(kind, key)`.
/// - `upsert` applies only strictly newer versions.
#[derive(Default)]
pub struct InMemoryDataStore {
    /// Guarded store state.
    state: RwLock<StoreState>,
}

impl InMemoryDataStore {
    /// Creates an empty, uninitialized store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a poisoned lock to a store error.
fn poisoned() -> StoreError {
    StoreError::Store("store lock poisoned".to_string())
}

impl DataStore for InMemoryDataStore {
    fn init(&self, data: FullDataSet) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let mut fresh: HashMap<DataKind, HashMap<String, ItemDescriptor>> = HashMap::new();
        for (kind, collection) in data.collections {
            fresh.entry(kind).or_default().extend(collection.items);
        }
        for kind in DataKind::ALL {
            fresh.entry(kind).or_default();
        }
        state.data = fresh;
        state.initialized = true;
        Ok(())
    }

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<ItemDescriptor>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.data.get(&kind).and_then(|items| items.get(key)).cloned())
    }

    fn get_all(&self, kind: DataKind) -> Result<Vec<(String, ItemDescriptor)>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .data
            .get(&kind)
            .map(|items| items.iter().map(|(key, item)| (key.clone(), item.clone())).collect())
            .unwrap_or_default())
    }

    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let items = state.data.entry(kind).or_default();
        if let Some(existing) = items.get(key)
            && existing.version >= item.version
        {
            return Ok(false);
        }
        items.insert(key.to_string(), item);
        Ok(true)
    }

    fn is_initialized(&self) -> bool {
        self.state.read().is_ok_and(|state| state.initialized)
    }
}
