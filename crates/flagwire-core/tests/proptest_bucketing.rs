// crates/flagwire-core/tests/proptest_bucketing.rs
// ============================================================================
// Module: Bucketing Property Tests
// Description: Randomized invariants for bucket computation.
// ============================================================================
//! ## Overview
//! Bucket values stay in `[0, 1)` and are a pure function of their inputs
//! for arbitrary keys and salts.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use flagwire_core::Context;
use flagwire_core::ContextKind;
use flagwire_core::runtime::bucket_context;
use proptest::prelude::*;

fn bucket(key: &str, flag_key: &str, salt: &str) -> f64 {
    let context = Context::new(key).expect("non-empty keys build contexts");
    bucket_context(None, &context, ContextKind::default_ref(), None, flag_key, salt, false)
        .expect("default-kind context always resolves")
}

proptest! {
    #[test]
    fn bucket_is_in_unit_interval(
        key in "[a-zA-Z0-9_-]{1,32}",
        flag_key in "[a-zA-Z0-9_-]{1,32}",
        salt in "[a-zA-Z0-9]{0,16}",
    ) {
        let value = bucket(&key, &flag_key, &salt);
        prop_assert!((0.0..1.0).contains(&value));
    }

    #[test]
    fn bucket_is_deterministic(
        key in "[a-zA-Z0-9_-]{1,32}",
        flag_key in "[a-zA-Z0-9_-]{1,32}",
        salt in "[a-zA-Z0-9]{0,16}",
    ) {
        prop_assert_eq!(bucket(&key, &flag_key, &salt).to_bits(), bucket(&key, &flag_key, &salt).to_bits());
    }

    #[test]
    fn seeded_bucket_ignores_key_and_salt(
        key in "[a-zA-Z0-9_-]{1,32}",
        seed in any::<i32>(),
    ) {
        let context = Context::new(key).expect("non-empty keys build contexts");
        let kind = ContextKind::default_ref();
        let one = bucket_context(Some(seed), &context, kind, None, "flag-a", "salt-a", false)
            .expect("default-kind context always resolves");
        let two = bucket_context(Some(seed), &context, kind, None, "flag-b", "salt-b", false)
            .expect("default-kind context always resolves");
        prop_assert_eq!(one.to_bits(), two.to_bits());
    }
}
