// crates/flagwire-data/tests/flag_tracker.rs
// ============================================================================
// Module: Flag Tracker Tests
// Description: Verifies derived value-change listeners.
// ============================================================================
//! ## Overview
//! Value-change listeners re-evaluate on matching key-change events and
//! fire only when the value really changed, comparing deeply.

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

use std::sync::Arc;
use std::sync::Mutex;

use common::InlineExecutor;
use flagwire_core::Context;
use flagwire_core::TaskExecutor;
use flagwire_data::Broadcaster;
use flagwire_data::FlagChangeEvent;
use flagwire_data::FlagTracker;
use flagwire_data::FlagValueChangeEvent;
use serde_json::Value;
use serde_json::json;

/// Tracker rig with a scriptable evaluation result.
struct Rig {
    broadcaster: Arc<Broadcaster<FlagChangeEvent>>,
    tracker: FlagTracker,
    current_value: Arc<Mutex<Value>>,
    seen: Arc<Mutex<Vec<FlagValueChangeEvent>>>,
}

fn rig(initial: Value) -> Rig {
    let broadcaster = Arc::new(Broadcaster::new(Some(
        Arc::new(InlineExecutor) as Arc<dyn TaskExecutor>
    )));
    let current_value = Arc::new(Mutex::new(initial));
    let source = Arc::clone(&current_value);
    let tracker = FlagTracker::new(
        Arc::clone(&broadcaster),
        Arc::new(move |_key: &str, _context: &Context| source.lock().unwrap().clone()),
    );
    Rig {
        broadcaster,
        tracker,
        current_value,
        seen: Arc::new(Mutex::new(Vec::new())),
    }
}

impl Rig {
    fn listen(&self, flag_key: &str) {
        let seen = Arc::clone(&self.seen);
        self.tracker.add_flag_value_change_listener(
            flag_key,
            Context::new("u1").unwrap(),
            move |event: &FlagValueChangeEvent| {
                seen.lock().unwrap().push(event.clone());
            },
        );
    }

    fn change_value_and_fire(&self, key: &str, value: Value) {
        *self.current_value.lock().unwrap() = value;
        self.broadcaster.broadcast(&FlagChangeEvent {
            key: key.to_string(),
        });
    }
}

#[test]
fn fires_once_per_actual_value_change() {
    let rig = rig(json!("red"));
    rig.listen("color");

    rig.change_value_and_fire("color", json!("blue"));
    // Same value again: configuration changed, value did not.
    rig.change_value_and_fire("color", json!("blue"));
    rig.change_value_and_fire("color", json!("green"));

    let seen = rig.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].old_value, json!("red"));
    assert_eq!(seen[0].new_value, json!("blue"));
    assert_eq!(seen[1].old_value, json!("blue"));
    assert_eq!(seen[1].new_value, json!("green"));
}

#[test]
fn ignores_events_for_other_keys() {
    let rig = rig(json!(1));
    rig.listen("watched");
    rig.change_value_and_fire("unwatched", json!(2));
    assert!(rig.seen.lock().unwrap().is_empty());
}

#[test]
fn compares_structured_values_deeply() {
    let rig = rig(json!({"a": [1, 2], "b": "x"}));
    rig.listen("obj");

    // Identical structure: no event.
    rig.change_value_and_fire("obj", json!({"a": [1, 2], "b": "x"}));
    assert!(rig.seen.lock().unwrap().is_empty());

    rig.change_value_and_fire("obj", json!({"a": [1, 2, 3], "b": "x"}));
    assert_eq!(rig.seen.lock().unwrap().len(), 1);
}

#[test]
fn raw_key_change_listeners_see_every_event() {
    let rig = rig(json!(true));
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    rig.tracker.add_flag_change_listener(move |event: &FlagChangeEvent| {
        sink.lock().unwrap().push(event.key.clone());
    });
    rig.change_value_and_fire("a", json!(true));
    rig.change_value_and_fire("b", json!(true));
    assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
}
