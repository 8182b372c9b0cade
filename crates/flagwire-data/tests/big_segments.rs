// crates/flagwire-data/tests/big_segments.rs
// ============================================================================
// Module: Big-Segment Wrapper Tests
// Description: Verifies caching, hashing, staleness, and polling.
// ============================================================================
//! ## Overview
//! The wrapper must hand the backend only hashed keys, cache membership per
//! unhashed context key within the TTL, derive staleness from metadata age,
//! and broadcast status changes from its poller.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::SpawnExecutor;
use flagwire_core::BigSegmentMembership;
use flagwire_core::BigSegmentResolver;
use flagwire_core::BigSegmentStore;
use flagwire_core::BigSegmentStoreMetadata;
use flagwire_core::BigSegmentStoreStatus;
use flagwire_core::BigSegmentsStatus;
use flagwire_core::StoreError;
use flagwire_core::TaskExecutor;
use flagwire_core::big_segment_context_hash;
use flagwire_core::now_unix_millis;
use flagwire_data::BigSegmentStoreWrapper;
use flagwire_data::BigSegmentsConfig;
use flagwire_data::Broadcaster;

/// Backend stub with scripted metadata and recorded queries.
struct StubStore {
    /// Millisecond epoch reported as last-up-to-date.
    last_up_to_date: Mutex<Option<i64>>,
    /// Keys the backend has been queried with.
    queried_keys: Mutex<Vec<String>>,
    /// Number of membership queries served.
    membership_queries: AtomicUsize,
    /// Number of metadata queries served.
    metadata_queries: AtomicUsize,
    /// Fail membership queries when set.
    fail_membership: bool,
}

impl StubStore {
    fn with_age(age: Duration) -> Self {
        Self {
            last_up_to_date: Mutex::new(Some(
                now_unix_millis() - i64::try_from(age.as_millis()).unwrap(),
            )),
            queried_keys: Mutex::new(Vec::new()),
            membership_queries: AtomicUsize::new(0),
            metadata_queries: AtomicUsize::new(0),
            fail_membership: false,
        }
    }
}

impl BigSegmentStore for StubStore {
    fn membership(&self, hashed_key: &str) -> Result<Option<BigSegmentMembership>, StoreError> {
        self.membership_queries.fetch_add(1, Ordering::SeqCst);
        self.queried_keys.lock().unwrap().push(hashed_key.to_string());
        if self.fail_membership {
            return Err(StoreError::Io("backend down".to_string()));
        }
        Ok(Some(BigSegmentMembership::new(HashMap::from([("seg.g1".to_string(), true)]))))
    }

    fn metadata(&self) -> Result<BigSegmentStoreMetadata, StoreError> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        Ok(BigSegmentStoreMetadata {
            last_up_to_date: *self.last_up_to_date.lock().unwrap(),
        })
    }
}

fn config() -> BigSegmentsConfig {
    BigSegmentsConfig {
        membership_cache_size: 10,
        membership_cache_ttl: Duration::from_secs(60),
        status_poll_interval: Duration::from_millis(10),
        stale_after: Duration::from_secs(300),
    }
}

fn wrapper(store: Arc<StubStore>, config: BigSegmentsConfig) -> BigSegmentStoreWrapper {
    BigSegmentStoreWrapper::new(store, config, None, Arc::new(Broadcaster::new(None)))
}

#[test]
fn backend_receives_hashed_keys() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(1)));
    let wrapper = wrapper(Arc::clone(&store), config());
    let (membership, status) = wrapper.query_membership("userkey");
    assert_eq!(membership.unwrap().included("seg.g1"), Some(true));
    assert_eq!(status, BigSegmentsStatus::Healthy);

    let queried = store.queried_keys.lock().unwrap();
    assert_eq!(queried.as_slice(), [big_segment_context_hash("userkey")]);
}

#[test]
fn membership_is_cached_per_context_key() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(1)));
    let wrapper = wrapper(Arc::clone(&store), config());
    let _ = wrapper.query_membership("userkey");
    let _ = wrapper.query_membership("userkey");
    let _ = wrapper.query_membership("other");
    assert_eq!(store.membership_queries.load(Ordering::SeqCst), 2);
}

#[test]
fn cache_entries_expire_after_the_ttl() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(1)));
    let mut tuned = config();
    tuned.membership_cache_ttl = Duration::from_millis(10);
    let wrapper = wrapper(Arc::clone(&store), tuned);
    let _ = wrapper.query_membership("userkey");
    std::thread::sleep(Duration::from_millis(25));
    let _ = wrapper.query_membership("userkey");
    assert_eq!(store.membership_queries.load(Ordering::SeqCst), 2);
}

#[test]
fn stale_metadata_reports_stale_but_still_answers() {
    // Metadata last synchronized ten minutes ago with a five-minute bound.
    let store = Arc::new(StubStore::with_age(Duration::from_secs(600)));
    let mut tuned = config();
    tuned.stale_after = Duration::from_secs(300);
    let wrapper = wrapper(Arc::clone(&store), tuned);

    let status = wrapper.status();
    assert!(status.available);
    assert!(status.stale);

    let (membership, evaluation_status) = wrapper.query_membership("userkey");
    assert_eq!(membership.unwrap().included("seg.g1"), Some(true));
    assert_eq!(evaluation_status, BigSegmentsStatus::Stale);
}

#[test]
fn fresh_metadata_reports_healthy() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(5)));
    let wrapper = wrapper(store, config());
    let status = wrapper.status();
    assert!(status.available);
    assert!(!status.stale);
}

#[test]
fn membership_failure_surfaces_store_error() {
    let mut stub = StubStore::with_age(Duration::from_secs(1));
    stub.fail_membership = true;
    let wrapper = wrapper(Arc::new(stub), config());
    let (membership, status) = wrapper.query_membership("userkey");
    assert!(membership.is_none());
    assert_eq!(status, BigSegmentsStatus::StoreError);
}

#[test]
fn poller_broadcasts_status_changes() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(1)));
    let broadcaster = Arc::new(Broadcaster::new(Some(
        Arc::new(SpawnExecutor) as Arc<dyn TaskExecutor>
    )));
    let seen: Arc<Mutex<Vec<BigSegmentStoreStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    broadcaster.register(move |status: &BigSegmentStoreStatus| {
        sink.lock().unwrap().push(*status);
    });

    let wrapper = BigSegmentStoreWrapper::new(
        Arc::clone(&store) as Arc<dyn BigSegmentStore>,
        config(),
        Some(Arc::new(SpawnExecutor)),
        broadcaster,
    );
    std::thread::sleep(Duration::from_millis(40));

    // Age the metadata past the staleness bound; the poller must notice.
    *store.last_up_to_date.lock().unwrap() = Some(now_unix_millis() - 1_000_000_000);
    std::thread::sleep(Duration::from_millis(60));
    wrapper.close();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|status| status.available && !status.stale));
    assert!(seen.iter().any(|status| status.available && status.stale));
}

#[test]
fn close_stops_the_poller() {
    let store = Arc::new(StubStore::with_age(Duration::from_secs(1)));
    let wrapper = BigSegmentStoreWrapper::new(
        Arc::clone(&store) as Arc<dyn BigSegmentStore>,
        config(),
        Some(Arc::new(SpawnExecutor)),
        Arc::new(Broadcaster::new(None)),
    );
    std::thread::sleep(Duration::from_millis(30));
    wrapper.close();
    std::thread::sleep(Duration::from_millis(20));
    let queries_after_close = store.metadata_queries.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(store.metadata_queries.load(Ordering::SeqCst), queries_after_close);
}
