// crates/flagwire-data/src/sink.rs
// ============================================================================
// Module: Flagwire Data-Source Sink
// Description: The commit path between data sources and the store.
// Purpose: Apply snapshots and patches, maintain the graph, emit events.
// Dependencies: flagwire-core, tracing
// ============================================================================

//! ## Overview
//! Every data source, polling or streaming, publishes through this sink.
//! Snapshots are sorted so dependencies land first, the dependency graph is
//! rebuilt, and flag-change events are emitted for every flag affected by a
//! version change, directly or transitively. Change events are broadcast
//! only after the store reflects the update, so listeners that read back
//! observe the new data.
//! Invariants:
//! - A no-op upsert (stale version) broadcasts nothing.
//! - Store failures transition the source status to `INTERRUPTED` with a
//!   `STORE_ERROR`, logged at warn once per outage and debug thereafter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flagwire_core::DataKind;
use flagwire_core::DataSourceErrorInfo;
use flagwire_core::DataSourceErrorKind;
use flagwire_core::DataSourceState;
use flagwire_core::DataSourceStatus;
use flagwire_core::DataSourceUpdateSink;
use flagwire_core::DataStore;
use flagwire_core::DataStoreStatus;
use flagwire_core::FullDataSet;
use flagwire_core::ItemDescriptor;
use flagwire_core::KindAndKey;
use flagwire_core::StoreError;
use flagwire_core::now_unix_millis;
use tracing::debug;
use tracing::warn;

use crate::broadcast::Broadcaster;
use crate::dependencies::DependencyTracker;
use crate::dependencies::sort_all_collections;
use crate::listeners::FlagChangeEvent;
use crate::status::DataSourceStatusHolder;
use crate::status::DataStoreStatusHolder;
use crate::status::OutageTracker;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// The default [`DataSourceUpdateSink`] over a data store.
///
/// # Invariants
/// - Writes are serialized through the store's write path; `init` and
///   `upsert` from different sources are linearized.
pub struct StoreUpdateSink {
    /// Destination store.
    store: Arc<dyn DataStore>,
    /// Dependency graph, rebuilt on snapshots and patched on upserts.
    dependencies: Mutex<DependencyTracker>,
    /// Flag-change event fan-out.
    flag_changes: Arc<Broadcaster<FlagChangeEvent>>,
    /// Data-source status state machine.
    status: Arc<DataSourceStatusHolder>,
    /// Persistent-store status cell.
    store_status: Arc<DataStoreStatusHolder>,
    /// Optional outage accounting.
    outage: Option<Arc<OutageTracker>>,
    /// Set while the most recent store operation failed.
    last_store_update_failed: AtomicBool,
}

impl StoreUpdateSink {
    /// Creates a sink over the given store and broadcasters.
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore>,
        flag_changes: Arc<Broadcaster<FlagChangeEvent>>,
        status: Arc<DataSourceStatusHolder>,
        store_status: Arc<DataStoreStatusHolder>,
    ) -> Self {
        Self {
            store,
            dependencies: Mutex::new(DependencyTracker::new()),
            flag_changes,
            status,
            store_status,
            outage: None,
            last_store_update_failed: AtomicBool::new(false),
        }
    }

    /// Enables outage accounting with the given escalation timeout.
    #[must_use]
    pub fn with_outage_logging(mut self, logging_timeout: Duration) -> Self {
        self.outage = Some(OutageTracker::new(logging_timeout));
        self
    }

    /// Returns the data-source status holder.
    #[must_use]
    pub fn status_holder(&self) -> Arc<DataSourceStatusHolder> {
        Arc::clone(&self.status)
    }

    /// Records a store failure: dedup logging plus a status transition.
    fn report_store_failure(&self, operation: &str, error: &StoreError) {
        if self.last_store_update_failed.swap(true, Ordering::SeqCst) {
            debug!(operation, error = %error, "data store operation failed");
        } else {
            warn!(operation, error = %error, "data store operation failed");
        }
        self.update_status(
            DataSourceState::Interrupted,
            Some(DataSourceErrorInfo {
                kind: DataSourceErrorKind::StoreError,
                status_code: None,
                message: error.to_string(),
                time: now_unix_millis(),
            }),
        );
    }

    /// Clears the failure dedup flag after a successful store operation.
    fn record_store_success(&self) {
        self.last_store_update_failed.store(false, Ordering::SeqCst);
    }

    /// Reads the store contents keyed for version diffing.
    fn snapshot_versions(&self) -> Option<HashMap<KindAndKey, u64>> {
        let mut versions = HashMap::new();
        for kind in DataKind::ALL {
            match self.store.get_all(kind) {
                Ok(items) => {
                    for (key, descriptor) in items {
                        versions.insert(KindAndKey::new(kind, key), descriptor.version);
                    }
                }
                Err(err) => {
                    debug!(kind = %kind, error = %err, "pre-init snapshot read failed");
                    return None;
                }
            }
        }
        Some(versions)
    }

    /// Broadcasts a change event for every affected flag key.
    fn broadcast_affected(&self, affected: HashSet<KindAndKey>) {
        for node in affected {
            if node.kind == DataKind::Features {
                self.flag_changes.broadcast(&FlagChangeEvent {
                    key: node.key,
                });
            }
        }
    }
}

impl DataSourceUpdateSink for StoreUpdateSink {
    fn init(&self, data: FullDataSet) -> bool {
        let old_versions =
            if self.flag_changes.has_listeners() { self.snapshot_versions() } else { None };

        let sorted = sort_all_collections(data);
        if let Err(err) = self.store.init(sorted.clone()) {
            self.report_store_failure("init", &err);
            return false;
        }
        self.record_store_success();

        let Ok(mut dependencies) = self.dependencies.lock() else {
            return false;
        };
        dependencies.reset();
        for (kind, collection) in &sorted.collections {
            for (key, descriptor) in &collection.items {
                dependencies.update_dependencies_from(*kind, key, descriptor);
            }
        }

        if let Some(old_versions) = old_versions {
            let mut affected = HashSet::new();
            let mut new_versions: HashMap<KindAndKey, u64> = HashMap::new();
            for (kind, collection) in &sorted.collections {
                for (key, descriptor) in &collection.items {
                    new_versions.insert(KindAndKey::new(*kind, key.clone()), descriptor.version);
                }
            }
            for (node, new_version) in &new_versions {
                if old_versions.get(node) != Some(new_version) {
                    dependencies.add_affected_items(&mut affected, node);
                }
            }
            for node in old_versions.keys() {
                if !new_versions.contains_key(node) {
                    dependencies.add_affected_items(&mut affected, node);
                }
            }
            drop(dependencies);
            self.broadcast_affected(affected);
        }

        self.update_status(DataSourceState::Valid, None);
        true
    }

    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> bool {
        let applied = match self.store.upsert(kind, key, item.clone()) {
            Ok(applied) => applied,
            Err(err) => {
                self.report_store_failure("upsert", &err);
                return false;
            }
        };
        self.record_store_success();
        if !applied {
            return false;
        }

        if let Ok(mut dependencies) = self.dependencies.lock() {
            dependencies.update_dependencies_from(kind, key, &item);
            let mut affected = HashSet::new();
            dependencies.add_affected_items(&mut affected, &KindAndKey::new(kind, key));
            drop(dependencies);
            self.broadcast_affected(affected);
        }
        true
    }

    fn update_status(&self, state: DataSourceState, error: Option<DataSourceErrorInfo>) {
        if let Some(outage) = &self.outage {
            match state {
                DataSourceState::Interrupted => {
                    let (kind, status_code) = error.as_ref().map_or(
                        (DataSourceErrorKind::Unknown, None),
                        |info| (info.kind, info.status_code),
                    );
                    outage.record_error(kind, status_code);
                }
                DataSourceState::Valid => outage.record_recovery(),
                DataSourceState::Initializing | DataSourceState::Off => {}
            }
        }
        self.status.update(state, error);
    }

    fn data_store_status(&self) -> DataStoreStatus {
        self.store_status.status()
    }
}

// ============================================================================
// SECTION: Status Introspection
// ============================================================================

impl StoreUpdateSink {
    /// Returns the current data-source status.
    #[must_use]
    pub fn source_status(&self) -> DataSourceStatus {
        self.status.status()
    }
}
