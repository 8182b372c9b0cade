// crates/flagwire-data/src/broadcast.rs
// ============================================================================
// Module: Flagwire Broadcaster
// Description: Typed listener lists with asynchronous dispatch.
// Purpose: Fan out change and status events without blocking producers.
// Dependencies: flagwire-core, tracing
// ============================================================================

//! ## Overview
//! A broadcaster holds a listener list behind a read/write lock and
//! dispatches each event as one task per listener on the host-provided
//! executor. Registration and removal take the write lock briefly; dispatch
//! works from a snapshot, so listeners may register or unregister from
//! inside a callback. Without an executor (test mode) broadcasts are no-ops.
//! Invariants:
//! - Listener panics are caught and logged, never propagated.
//! - Events reach the listeners present at broadcast time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use flagwire_core::TaskExecutor;
use tracing::warn;

// ============================================================================
// SECTION: Listener Handles
// ============================================================================

/// Opaque handle identifying one registered listener.
///
/// # Invariants
/// - Unique within the issuing broadcaster for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

// ============================================================================
// SECTION: Broadcaster
// ============================================================================

/// Shared listener callback type.
type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A typed listener list with asynchronous dispatch.
///
/// # Invariants
/// - `broadcast` never blocks on listener execution.
pub struct Broadcaster<T> {
    /// Registered listeners with their handles.
    listeners: RwLock<Vec<(u64, Listener<T>)>>,
    /// Next handle value.
    next_handle: AtomicU64,
    /// Host executor; `None` disables dispatch.
    executor: Option<Arc<dyn TaskExecutor>>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    /// Creates a broadcaster dispatching on the provided executor.
    #[must_use]
    pub fn new(executor: Option<Arc<dyn TaskExecutor>>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            executor,
        }
    }

    /// Registers a listener and returns its handle.
    pub fn register(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerHandle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push((handle, Arc::new(listener)));
        }
        ListenerHandle(handle)
    }

    /// Removes a previously registered listener.
    pub fn unregister(&self, handle: ListenerHandle) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.retain(|(id, _)| *id != handle.0);
        }
    }

    /// Returns true when at least one listener is registered.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        self.listeners.read().is_ok_and(|listeners| !listeners.is_empty())
    }

    /// Dispatches one event to every current listener.
    ///
    /// Each listener runs as its own executor task; a panicking listener is
    /// logged at warn and swallowed.
    pub fn broadcast(&self, event: &T) {
        let Some(executor) = &self.executor else {
            return;
        };
        let snapshot: Vec<Listener<T>> = match self.listeners.read() {
            Ok(listeners) => listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect(),
            Err(_) => return,
        };
        for listener in snapshot {
            let event = event.clone();
            executor.execute(Box::new(move || {
                if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                    warn!("event listener panicked");
                }
            }));
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Executor that runs tasks inline on the caller's thread.
    struct InlineExecutor;

    impl TaskExecutor for InlineExecutor {
        fn execute(&self, task: Box<dyn FnOnce() + Send>) {
            task();
        }
    }

    #[test]
    fn broadcast_reaches_registered_listeners() {
        let broadcaster: Broadcaster<String> = Broadcaster::new(Some(Arc::new(InlineExecutor)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = broadcaster.register(move |event: &String| {
            sink.lock().unwrap().push(event.clone());
        });

        broadcaster.broadcast(&"one".to_string());
        broadcaster.unregister(handle);
        broadcaster.broadcast(&"two".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string()]);
    }

    #[test]
    fn broadcast_without_executor_is_a_no_op() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(None);
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        broadcaster.register(move |_: &u32| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        broadcaster.broadcast(&7);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_poison_dispatch() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(Some(Arc::new(InlineExecutor)));
        let count = Arc::new(AtomicUsize::new(0));
        broadcaster.register(|_: &u32| panic!("listener failure"));
        let sink = Arc::clone(&count);
        broadcaster.register(move |_: &u32| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        broadcaster.broadcast(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
