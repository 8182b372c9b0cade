// crates/flagwire-data/src/status.rs
// ============================================================================
// Module: Flagwire Status Machinery
// Description: Data-source and data-store health state machines.
// Purpose: Track source health, support blocking waits, account outages.
// Dependencies: flagwire-core, tracing
// ============================================================================

//! ## Overview
//! The data-source status holder is a small state machine guarded by a
//! mutex-and-condvar pair: `INITIALIZING` to `VALID`/`INTERRUPTED` and back,
//! with `OFF` terminal. An `INTERRUPTED` report while still initializing is
//! coerced back to `INITIALIZING`, but the error is still recorded and
//! waiters are still woken. The outage tracker accumulates error counts
//! during an outage and escalates to a single high-severity log when the
//! outage outlives the configured timeout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use flagwire_core::DataSourceErrorInfo;
use flagwire_core::DataSourceErrorKind;
use flagwire_core::DataSourceState;
use flagwire_core::DataSourceStatus;
use flagwire_core::DataStoreStatus;
use flagwire_core::now_unix_millis;
use tracing::error;

use crate::broadcast::Broadcaster;

// ============================================================================
// SECTION: Data-Source Status Holder
// ============================================================================

/// Guarded data-source status with blocking waits.
///
/// # Invariants
/// - `OFF` is terminal; later updates are ignored.
/// - Every update signals the condvar, coerced transitions included.
pub struct DataSourceStatusHolder {
    /// Current status under the wait lock.
    status: Mutex<DataSourceStatus>,
    /// Signalled on every update.
    signal: Condvar,
    /// Listener fan-out for status changes.
    broadcaster: Arc<Broadcaster<DataSourceStatus>>,
}

impl DataSourceStatusHolder {
    /// Creates a holder in the `INITIALIZING` state.
    #[must_use]
    pub fn new(broadcaster: Arc<Broadcaster<DataSourceStatus>>) -> Self {
        Self {
            status: Mutex::new(DataSourceStatus {
                state: DataSourceState::Initializing,
                state_since: now_unix_millis(),
                last_error: None,
            }),
            signal: Condvar::new(),
            broadcaster,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> DataSourceStatus {
        self.status.lock().map_or_else(
            |poisoned| poisoned.into_inner().clone(),
            |status| status.clone(),
        )
    }

    /// Applies a state transition and optional error.
    pub fn update(&self, new_state: DataSourceState, error: Option<DataSourceErrorInfo>) {
        let mut changed = false;
        if let Ok(mut status) = self.status.lock() {
            if status.state == DataSourceState::Off {
                return;
            }
            let effective = if new_state == DataSourceState::Interrupted
                && status.state == DataSourceState::Initializing
            {
                DataSourceState::Initializing
            } else {
                new_state
            };
            if effective != status.state {
                status.state = effective;
                status.state_since = now_unix_millis();
                changed = true;
            }
            if let Some(error) = error {
                status.last_error = Some(error);
                changed = true;
            }
            self.signal.notify_all();
            if changed {
                let snapshot = status.clone();
                drop(status);
                self.broadcaster.broadcast(&snapshot);
            }
        }
    }

    /// Blocks until the state equals `desired`.
    ///
    /// Returns false when the source turns `OFF` or the timeout elapses.
    /// A zero timeout waits indefinitely.
    #[must_use]
    pub fn wait_for(&self, desired: DataSourceState, timeout: Duration) -> bool {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let Ok(mut status) = self.status.lock() else {
            return false;
        };
        loop {
            if status.state == desired {
                return true;
            }
            if status.state == DataSourceState::Off {
                return false;
            }
            match deadline {
                None => {
                    status = match self.signal.wait(status) {
                        Ok(guard) => guard,
                        Err(_) => return false,
                    };
                }
                Some(deadline) => {
                    let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                        return false;
                    };
                    status = match self.signal.wait_timeout(status, remaining) {
                        Ok((guard, _)) => guard,
                        Err(_) => return false,
                    };
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Outage Tracker
// ============================================================================

/// Error counts keyed by kind and status code.
type OutageCounts = HashMap<(DataSourceErrorKind, Option<u16>), u64>;

/// Mutable outage accounting state.
#[derive(Default)]
struct OutageState {
    /// True while an outage is in progress.
    in_outage: bool,
    /// Monotonic outage generation; cancels stale timers.
    epoch: u64,
    /// Error counts for the current outage.
    counts: OutageCounts,
}

/// Accumulates errors during an outage and escalates after a timeout.
///
/// # Invariants
/// - At most one escalation log per outage.
/// - Recovery before the timeout cancels the pending log and its counts.
pub struct OutageTracker {
    /// How long an outage may last before the escalation log.
    logging_timeout: Duration,
    /// Guarded outage state.
    state: Mutex<OutageState>,
    /// Wakes the timer early on recovery.
    signal: Condvar,
}

impl OutageTracker {
    /// Creates a tracker with the given escalation timeout.
    #[must_use]
    pub fn new(logging_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            logging_timeout,
            state: Mutex::new(OutageState::default()),
            signal: Condvar::new(),
        })
    }

    /// Records one error, starting an outage (and its timer) if none is
    /// active.
    pub fn record_error(self: &Arc<Self>, kind: DataSourceErrorKind, status_code: Option<u16>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if !state.in_outage {
            state.in_outage = true;
            state.epoch += 1;
            state.counts.clear();
            let tracker = Arc::clone(self);
            let epoch = state.epoch;
            std::thread::spawn(move || tracker.run_timer(epoch));
        }
        *state.counts.entry((kind, status_code)).or_insert(0) += 1;
    }

    /// Records recovery, cancelling the pending timer and its counts.
    pub fn record_recovery(&self) {
        if let Ok(mut state) = self.state.lock()
            && state.in_outage
        {
            state.in_outage = false;
            state.epoch += 1;
            state.counts.clear();
            self.signal.notify_all();
        }
    }

    /// One-shot timer body: logs the escalation if the outage outlived it.
    fn run_timer(&self, epoch: u64) {
        let Ok(state) = self.state.lock() else {
            return;
        };
        let wait = self.signal.wait_timeout_while(state, self.logging_timeout, |state| {
            state.in_outage && state.epoch == epoch
        });
        if let Ok((state, result)) = wait
            && result.timed_out()
            && state.in_outage
            && state.epoch == epoch
        {
            error!(
                timeout_seconds = self.logging_timeout.as_secs(),
                errors = %describe_counts(&state.counts),
                "data source outage exceeded the logging timeout"
            );
        }
    }
}

/// Renders outage counts as `KIND(code) xN` pairs for the escalation log.
fn describe_counts(counts: &OutageCounts) -> String {
    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort_by_key(|((kind, code), _)| (kind.to_string(), *code));
    let mut out = String::new();
    for ((kind, status_code), count) in entries {
        if !out.is_empty() {
            out.push_str(", ");
        }
        match status_code {
            Some(code) => {
                let _ = write!(out, "{kind}({code}) x{count}");
            }
            None => {
                let _ = write!(out, "{kind} x{count}");
            }
        }
    }
    out
}

// ============================================================================
// SECTION: Data-Store Status Holder
// ============================================================================

/// Guarded persistent-store status with change broadcast.
///
/// # Invariants
/// - Broadcasts fire only on actual status changes.
pub struct DataStoreStatusHolder {
    /// Current status.
    status: Mutex<DataStoreStatus>,
    /// Listener fan-out for status changes.
    broadcaster: Arc<Broadcaster<DataStoreStatus>>,
}

impl DataStoreStatusHolder {
    /// Creates a holder reporting an available store.
    #[must_use]
    pub fn new(broadcaster: Arc<Broadcaster<DataStoreStatus>>) -> Self {
        Self {
            status: Mutex::new(DataStoreStatus {
                available: true,
                refresh_needed: false,
            }),
            broadcaster,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> DataStoreStatus {
        self.status.lock().map_or(
            DataStoreStatus {
                available: false,
                refresh_needed: false,
            },
            |status| *status,
        )
    }

    /// Applies a new status, broadcasting when it differs.
    pub fn update(&self, new_status: DataStoreStatus) {
        if let Ok(mut status) = self.status.lock()
            && *status != new_status
        {
            *status = new_status;
            drop(status);
            self.broadcaster.broadcast(&new_status);
        }
    }
}
