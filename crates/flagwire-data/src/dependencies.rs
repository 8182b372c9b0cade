// crates/flagwire-data/src/dependencies.rs
// ============================================================================
// Module: Flagwire Dependency Tracker
// Description: Bidirectional dependency graph over flags and segments.
// Purpose: Order snapshots and expand the blast radius of updates.
// Dependencies: flagwire-core
// ============================================================================

//! ## Overview
//! Flags depend on their prerequisite flags and on every segment referenced
//! by a `segmentMatch` clause; segments depend on segments referenced from
//! their own rules. The tracker keeps both edge directions: the forward map
//! orders snapshot writes, the reverse map expands the set of flags whose
//! value may have changed after an update.
//! Invariants:
//! - Forward and reverse maps stay mirror images of each other.
//! - Cycle re-entry during traversal is a no-op, so every node appears once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use flagwire_core::Clause;
use flagwire_core::DataCollection;
use flagwire_core::DataKind;
use flagwire_core::FullDataSet;
use flagwire_core::Item;
use flagwire_core::ItemDescriptor;
use flagwire_core::KindAndKey;
use flagwire_core::Operator;

// ============================================================================
// SECTION: Dependency Computation
// ============================================================================

/// Computes the outgoing dependencies of one descriptor.
#[must_use]
pub fn compute_dependencies_from(descriptor: &ItemDescriptor) -> HashSet<KindAndKey> {
    let mut out = HashSet::new();
    match &descriptor.item {
        Some(Item::Flag(flag)) => {
            for prerequisite in &flag.prerequisites {
                out.insert(KindAndKey::new(DataKind::Features, prerequisite.key.clone()));
            }
            for rule in &flag.rules {
                collect_segment_refs(&rule.clauses, &mut out);
            }
        }
        Some(Item::Segment(segment)) => {
            for rule in &segment.rules {
                collect_segment_refs(&rule.clauses, &mut out);
            }
        }
        None => {}
    }
    out
}

/// Adds the segment keys referenced by `segmentMatch` clauses.
fn collect_segment_refs(clauses: &[Clause], out: &mut HashSet<KindAndKey>) {
    for clause in clauses {
        if clause.op == Operator::SegmentMatch {
            for value in &clause.values {
                if let Some(key) = value.as_str() {
                    out.insert(KindAndKey::new(DataKind::Segments, key));
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Dependency Tracker
// ============================================================================

/// Bidirectional dependency graph over stored items.
///
/// # Invariants
/// - `from` and `to` are exact inverses after every update.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// Outgoing edges: item to its dependencies.
    from: HashMap<KindAndKey, HashSet<KindAndKey>>,
    /// Incoming edges: item to its dependants.
    to: HashMap<KindAndKey, HashSet<KindAndKey>>,
}

impl DependencyTracker {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outgoing edges of one item and fixes the reverse map.
    pub fn update_dependencies_from(
        &mut self,
        kind: DataKind,
        key: &str,
        descriptor: &ItemDescriptor,
    ) {
        let node = KindAndKey::new(kind, key);
        if let Some(old_deps) = self.from.remove(&node) {
            for dep in old_deps {
                if let Some(dependants) = self.to.get_mut(&dep) {
                    dependants.remove(&node);
                }
            }
        }
        let new_deps = compute_dependencies_from(descriptor);
        for dep in &new_deps {
            self.to.entry(dep.clone()).or_default().insert(node.clone());
        }
        self.from.insert(node, new_deps);
    }

    /// Clears the whole graph.
    pub fn reset(&mut self) {
        self.from.clear();
        self.to.clear();
    }

    /// Adds `node` and everything that transitively depends on it to `out`.
    pub fn add_affected_items(&self, out: &mut HashSet<KindAndKey>, node: &KindAndKey) {
        if !out.insert(node.clone()) {
            return;
        }
        if let Some(dependants) = self.to.get(node) {
            for dependant in dependants {
                self.add_affected_items(out, dependant);
            }
        }
    }
}

// ============================================================================
// SECTION: Snapshot Ordering
// ============================================================================

/// Orders a snapshot so dependencies precede their dependants.
///
/// Segments are written before flags, and flags are sorted by a post-order
/// traversal of their prerequisite edges. Cycles are tolerated: a node
/// already emitted is skipped, so each item appears exactly once.
#[must_use]
pub fn sort_all_collections(data: FullDataSet) -> FullDataSet {
    let mut segments = DataCollection::default();
    let mut features = DataCollection::default();
    for (kind, collection) in data.collections {
        match kind {
            DataKind::Segments => segments.items.extend(collection.items),
            DataKind::Features => features.items.extend(collection.items),
        }
    }

    let ordered_features = sort_features(features);
    FullDataSet {
        collections: vec![(DataKind::Segments, segments), (DataKind::Features, ordered_features)],
    }
}

/// Post-order traversal of flags along prerequisite edges.
fn sort_features(collection: DataCollection) -> DataCollection {
    let order: Vec<String> = collection.items.iter().map(|(key, _)| key.clone()).collect();
    let mut pending: HashMap<String, ItemDescriptor> = collection.items.into_iter().collect();
    let mut items = Vec::with_capacity(order.len());
    for key in order {
        visit_feature(&key, &mut pending, &mut items);
    }
    DataCollection {
        items,
    }
}

/// Emits one flag after its still-pending prerequisites.
fn visit_feature(
    key: &str,
    pending: &mut HashMap<String, ItemDescriptor>,
    items: &mut Vec<(String, ItemDescriptor)>,
) {
    // Removal doubles as the visited set; re-entry on cycles is a no-op.
    let Some(descriptor) = pending.remove(key) else {
        return;
    };
    if let Some(Item::Flag(flag)) = &descriptor.item {
        for prerequisite in &flag.prerequisites {
            if pending.contains_key(&prerequisite.key) {
                visit_feature(&prerequisite.key, pending, items);
            }
        }
    }
    items.push((key.to_string(), descriptor));
}
