// crates/flagwire-data/tests/store.rs
// ============================================================================
// Module: In-Memory Store Tests
// Description: Verifies versioned store semantics.
// ============================================================================
//! ## Overview
//! Covers last-writer-wins upserts, atomic snapshot replacement, tombstone
//! version retention, and initialization tracking, plus a randomized
//! last-writer-wins property.

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

use common::descriptor;
use common::flag_json;
use common::segment_json;
use common::snapshot;
use flagwire_core::DataKind;
use flagwire_core::DataStore;
use flagwire_core::ItemDescriptor;
use flagwire_data::InMemoryDataStore;
use proptest::prelude::*;

#[test]
fn upsert_applies_only_newer_versions() {
    let store = InMemoryDataStore::new();
    let v2 = descriptor(DataKind::Features, flag_json("f", 2));
    assert!(store.upsert(DataKind::Features, "f", v2).unwrap());

    let v1 = descriptor(DataKind::Features, flag_json("f", 1));
    assert!(!store.upsert(DataKind::Features, "f", v1).unwrap());
    assert_eq!(store.get(DataKind::Features, "f").unwrap().unwrap().version, 2);

    let v2_again = descriptor(DataKind::Features, flag_json("f", 2));
    assert!(!store.upsert(DataKind::Features, "f", v2_again).unwrap());

    let v3 = descriptor(DataKind::Features, flag_json("f", 3));
    assert!(store.upsert(DataKind::Features, "f", v3).unwrap());
    assert_eq!(store.get(DataKind::Features, "f").unwrap().unwrap().version, 3);
}

#[test]
fn tombstones_preserve_versions_for_comparison() {
    let store = InMemoryDataStore::new();
    assert!(store.upsert(DataKind::Features, "f", ItemDescriptor::tombstone(5)).unwrap());

    // A resurrect attempt at an older version loses to the tombstone.
    let v4 = descriptor(DataKind::Features, flag_json("f", 4));
    assert!(!store.upsert(DataKind::Features, "f", v4).unwrap());

    let stored = store.get(DataKind::Features, "f").unwrap().unwrap();
    assert!(stored.is_tombstone());
    assert_eq!(stored.version, 5);

    let v6 = descriptor(DataKind::Features, flag_json("f", 6));
    assert!(store.upsert(DataKind::Features, "f", v6).unwrap());
    assert!(!store.get(DataKind::Features, "f").unwrap().unwrap().is_tombstone());
}

#[test]
fn init_replaces_everything_atomically() {
    let store = InMemoryDataStore::new();
    assert!(!store.is_initialized());

    store
        .init(snapshot(vec![flag_json("old", 1)], vec![segment_json("old-seg", 1, &[])]))
        .unwrap();
    assert!(store.is_initialized());
    assert!(store.get(DataKind::Features, "old").unwrap().is_some());

    store.init(snapshot(vec![flag_json("new", 1)], vec![])).unwrap();
    assert!(store.get(DataKind::Features, "old").unwrap().is_none());
    assert!(store.get(DataKind::Features, "new").unwrap().is_some());
    assert!(store.get(DataKind::Segments, "old-seg").unwrap().is_none());
}

#[test]
fn get_all_returns_every_descriptor_of_a_kind() {
    let store = InMemoryDataStore::new();
    store
        .init(snapshot(
            vec![flag_json("f1", 1), flag_json("f2", 2)],
            vec![segment_json("s1", 1, &[])],
        ))
        .unwrap();
    let mut flags = store.get_all(DataKind::Features).unwrap();
    flags.sort_by(|(a, _), (b, _)| a.cmp(b));
    let keys: Vec<&str> = flags.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["f1", "f2"]);
    assert_eq!(store.get_all(DataKind::Segments).unwrap().len(), 1);
}

proptest! {
    #[test]
    fn last_writer_wins_over_any_version_sequence(versions in prop::collection::vec(1_u64..50, 1..20)) {
        let store = InMemoryDataStore::new();
        let mut highest = 0_u64;
        for version in versions {
            let applied = store
                .upsert(DataKind::Features, "f", descriptor(DataKind::Features, flag_json("f", version)))
                .unwrap();
            prop_assert_eq!(applied, version > highest);
            highest = highest.max(version);
            let stored = store.get(DataKind::Features, "f").unwrap().unwrap();
            prop_assert_eq!(stored.version, highest);
        }
    }
}
