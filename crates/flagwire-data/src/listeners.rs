// crates/flagwire-data/src/listeners.rs
// ============================================================================
// Module: Flagwire Flag Trackers
// Description: Key-change events and derived value-change listeners.
// Purpose: Let hosts observe flag configuration and value changes.
// Dependencies: flagwire-core, serde_json
// ============================================================================

//! ## Overview
//! The sink broadcasts a [`FlagChangeEvent`] for every flag whose
//! configuration (or transitive dependency) changed. The flag tracker layers
//! value-change listeners on top: each adapter re-evaluates its flag on a
//! matching key-change event and fires only when the evaluated value really
//! differs, holding the previous value in a one-slot cell.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use flagwire_core::Context;
use serde_json::Value;

use crate::broadcast::Broadcaster;
use crate::broadcast::ListenerHandle;

// ============================================================================
// SECTION: Events
// ============================================================================

/// A flag whose configuration may have changed.
///
/// # Invariants
/// - Emitted only after the store reflects the new configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagChangeEvent {
    /// Key of the affected flag.
    pub key: String,
}

/// A flag whose evaluated value changed for a specific context.
///
/// # Invariants
/// - `old_value` and `new_value` differ by deep equality.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagValueChangeEvent {
    /// Key of the affected flag.
    pub key: String,
    /// Value before the change.
    pub old_value: Value,
    /// Value after the change.
    pub new_value: Value,
}

// ============================================================================
// SECTION: Flag Tracker
// ============================================================================

/// Evaluation callback used to recompute flag values.
pub type EvaluateFn = dyn Fn(&str, &Context) -> Value + Send + Sync;

/// Derives value-change events from key-change events.
///
/// # Invariants
/// - Value listeners fire only when re-evaluation yields a different value.
pub struct FlagTracker {
    /// Key-change event source.
    broadcaster: Arc<Broadcaster<FlagChangeEvent>>,
    /// Host evaluation callback.
    evaluate: Arc<EvaluateFn>,
}

impl FlagTracker {
    /// Creates a tracker over the sink's key-change broadcaster.
    #[must_use]
    pub fn new(broadcaster: Arc<Broadcaster<FlagChangeEvent>>, evaluate: Arc<EvaluateFn>) -> Self {
        Self {
            broadcaster,
            evaluate,
        }
    }

    /// Registers a raw key-change listener.
    pub fn add_flag_change_listener(
        &self,
        listener: impl Fn(&FlagChangeEvent) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.broadcaster.register(listener)
    }

    /// Removes a listener registered through this tracker.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.broadcaster.unregister(handle);
    }

    /// Registers a value-change listener for one flag and context.
    ///
    /// The current value is evaluated eagerly as the baseline; the listener
    /// fires on the first change after registration.
    pub fn add_flag_value_change_listener(
        &self,
        flag_key: impl Into<String>,
        context: Context,
        listener: impl Fn(&FlagValueChangeEvent) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let flag_key = flag_key.into();
        let evaluate = Arc::clone(&self.evaluate);
        let previous = Mutex::new(evaluate(&flag_key, &context));
        self.broadcaster.register(move |event: &FlagChangeEvent| {
            if event.key != flag_key {
                return;
            }
            let new_value = evaluate(&flag_key, &context);
            let Ok(mut slot) = previous.lock() else {
                return;
            };
            if *slot == new_value {
                return;
            }
            let old_value = std::mem::replace(&mut *slot, new_value.clone());
            drop(slot);
            listener(&FlagValueChangeEvent {
                key: flag_key.clone(),
                old_value,
                new_value,
            });
        })
    }
}
