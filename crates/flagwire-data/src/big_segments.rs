// crates/flagwire-data/src/big_segments.rs
// ============================================================================
// Module: Flagwire Big-Segment Wrapper
// Description: Cache and status poller over a big-segment store backend.
// Purpose: Answer membership queries with bounded cost and tracked health.
// Dependencies: flagwire-core, lru, tracing
// ============================================================================

//! ## Overview
//! The wrapper sits between the evaluator and a user-supplied big-segment
//! store. Membership results are cached per context key in a size-and-age
//! bounded LRU; the backend only ever sees the hashed key form. A fixed-
//! interval poller queries store metadata and tracks two booleans: whether
//! the last query returned, and whether the data is older than the
//! staleness bound. Status changes broadcast to registered listeners; the
//! first `status` call before any completed poll queries synchronously.
//! Invariants:
//! - The cache key is the unhashed context key; hashing happens on misses.
//! - Closing stops the poller, clears the cache, and closes the backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use flagwire_core::BigSegmentMembership;
use flagwire_core::BigSegmentResolver;
use flagwire_core::BigSegmentStore;
use flagwire_core::BigSegmentStoreStatus;
use flagwire_core::BigSegmentsStatus;
use flagwire_core::TaskExecutor;
use flagwire_core::big_segment_context_hash;
use flagwire_core::now_unix_millis;
use lru::LruCache;
use tracing::warn;

use crate::broadcast::Broadcaster;
use crate::broadcast::ListenerHandle;
use crate::constants::DEFAULT_BIG_SEGMENT_CACHE_SIZE;
use crate::constants::DEFAULT_BIG_SEGMENT_CACHE_TTL;
use crate::constants::DEFAULT_BIG_SEGMENT_POLL_INTERVAL;
use crate::constants::DEFAULT_BIG_SEGMENT_STALE_AFTER;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tuning for the big-segment wrapper.
///
/// # Invariants
/// - `membership_cache_size` is at least one.
#[derive(Debug, Clone, Copy)]
pub struct BigSegmentsConfig {
    /// Maximum number of cached context keys.
    pub membership_cache_size: usize,
    /// Maximum age of a cached membership result.
    pub membership_cache_ttl: Duration,
    /// Interval between metadata polls.
    pub status_poll_interval: Duration,
    /// Age beyond which store data counts as stale.
    pub stale_after: Duration,
}

impl Default for BigSegmentsConfig {
    fn default() -> Self {
        Self {
            membership_cache_size: DEFAULT_BIG_SEGMENT_CACHE_SIZE,
            membership_cache_ttl: DEFAULT_BIG_SEGMENT_CACHE_TTL,
            status_poll_interval: DEFAULT_BIG_SEGMENT_POLL_INTERVAL,
            stale_after: DEFAULT_BIG_SEGMENT_STALE_AFTER,
        }
    }
}

// ============================================================================
// SECTION: Wrapper State
// ============================================================================

/// A cached membership result with its insertion time.
struct CachedMembership {
    /// Shared membership answers.
    membership: Arc<BigSegmentMembership>,
    /// When the entry was fetched.
    fetched_at: Instant,
}

/// State shared between the wrapper, the poller task, and resolvers.
struct WrapperState {
    /// Backend store; queries receive hashed keys.
    store: Arc<dyn BigSegmentStore>,
    /// Wrapper tuning.
    config: BigSegmentsConfig,
    /// Per-context-key membership cache.
    cache: Mutex<LruCache<String, CachedMembership>>,
    /// Most recent poll result; `None` before the first completed poll.
    last_status: Mutex<Option<BigSegmentStoreStatus>>,
    /// Status-change fan-out.
    status_changes: Arc<Broadcaster<BigSegmentStoreStatus>>,
    /// Poller shutdown flag under its wake-up lock.
    stopped: Mutex<bool>,
    /// Wakes the poller early on close.
    stop_signal: Condvar,
}

impl WrapperState {
    /// Queries metadata and refreshes the cached status, broadcasting on
    /// change.
    fn poll_store_and_update(&self) -> BigSegmentStoreStatus {
        let status = match self.store.metadata() {
            Ok(metadata) => BigSegmentStoreStatus {
                available: true,
                stale: metadata.last_up_to_date.is_none_or(|last| {
                    let age_millis = now_unix_millis().saturating_sub(last);
                    let bound = i64::try_from(self.config.stale_after.as_millis()).unwrap_or(i64::MAX);
                    age_millis > bound
                }),
            },
            Err(err) => {
                warn!(error = %err, "big segment store metadata query failed");
                BigSegmentStoreStatus {
                    available: false,
                    stale: false,
                }
            }
        };
        let changed = self
            .last_status
            .lock()
            .map(|mut last| {
                let changed = *last != Some(status);
                *last = Some(status);
                changed
            })
            .unwrap_or(false);
        if changed {
            self.status_changes.broadcast(&status);
        }
        status
    }

    /// Returns the latest poll result, polling synchronously when none has
    /// completed yet.
    fn current_status(&self) -> BigSegmentStoreStatus {
        let cached = self.last_status.lock().ok().and_then(|status| *status);
        cached.unwrap_or_else(|| self.poll_store_and_update())
    }

    /// Poller loop body, submitted as one task to the shared executor.
    fn run_poller(&self) {
        loop {
            {
                let Ok(guard) = self.stopped.lock() else {
                    return;
                };
                let wait = self.stop_signal.wait_timeout_while(
                    guard,
                    self.config.status_poll_interval,
                    |stopped| !*stopped,
                );
                match wait {
                    Ok((stopped, _)) if !*stopped => {}
                    _ => return,
                }
            }
            self.poll_store_and_update();
        }
    }
}

// ============================================================================
// SECTION: Wrapper
// ============================================================================

/// Cacheing, status-tracking front for a big-segment store.
///
/// # Invariants
/// - Owns the backend handle; closing the wrapper closes the backend.
pub struct BigSegmentStoreWrapper {
    /// Shared state, also held by the poller task.
    state: Arc<WrapperState>,
}

impl BigSegmentStoreWrapper {
    /// Creates a wrapper and schedules its poller on the executor.
    ///
    /// Without an executor (test mode) no poller runs; status queries fall
    /// back to synchronous metadata polls.
    #[must_use]
    pub fn new(
        store: Arc<dyn BigSegmentStore>,
        config: BigSegmentsConfig,
        executor: Option<Arc<dyn TaskExecutor>>,
        status_changes: Arc<Broadcaster<BigSegmentStoreStatus>>,
    ) -> Self {
        let cache_size =
            NonZeroUsize::new(config.membership_cache_size).unwrap_or(NonZeroUsize::MIN);
        let state = Arc::new(WrapperState {
            store,
            config,
            cache: Mutex::new(LruCache::new(cache_size)),
            last_status: Mutex::new(None),
            status_changes,
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
        });
        if let Some(executor) = executor {
            let poller = Arc::clone(&state);
            executor.execute(Box::new(move || poller.run_poller()));
        }
        Self {
            state,
        }
    }

    /// Returns the current store status, per the most recent poll.
    #[must_use]
    pub fn status(&self) -> BigSegmentStoreStatus {
        self.state.current_status()
    }

    /// Registers a status-change listener.
    pub fn add_status_listener(
        &self,
        listener: impl Fn(&BigSegmentStoreStatus) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.state.status_changes.register(listener)
    }

    /// Stops the poller, clears the cache, and closes the backend.
    pub fn close(&self) {
        if let Ok(mut stopped) = self.state.stopped.lock() {
            *stopped = true;
            self.state.stop_signal.notify_all();
        }
        if let Ok(mut cache) = self.state.cache.lock() {
            cache.clear();
        }
        self.state.store.close();
    }
}

impl BigSegmentResolver for BigSegmentStoreWrapper {
    fn query_membership(
        &self,
        context_key: &str,
    ) -> (Option<Arc<BigSegmentMembership>>, BigSegmentsStatus) {
        let membership = self.lookup_membership(context_key);
        let status = self.state.current_status();
        let evaluation_status = if membership.is_none() || !status.available {
            BigSegmentsStatus::StoreError
        } else if status.stale {
            BigSegmentsStatus::Stale
        } else {
            BigSegmentsStatus::Healthy
        };
        (membership, evaluation_status)
    }
}

impl BigSegmentStoreWrapper {
    /// Returns cached membership or fetches it from the backend.
    fn lookup_membership(&self, context_key: &str) -> Option<Arc<BigSegmentMembership>> {
        if let Ok(mut cache) = self.state.cache.lock()
            && let Some(entry) = cache.get(context_key)
            && entry.fetched_at.elapsed() <= self.state.config.membership_cache_ttl
        {
            return Some(Arc::clone(&entry.membership));
        }

        let hashed = big_segment_context_hash(context_key);
        match self.state.store.membership(&hashed) {
            Ok(result) => {
                let membership = Arc::new(result.unwrap_or_default());
                if let Ok(mut cache) = self.state.cache.lock() {
                    cache.put(
                        context_key.to_string(),
                        CachedMembership {
                            membership: Arc::clone(&membership),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                Some(membership)
            }
            Err(err) => {
                warn!(error = %err, "big segment membership query failed");
                None
            }
        }
    }
}
