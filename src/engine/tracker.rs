//! Idempotency tracking.
//!
//! A weak-membership set of already-rewritten nodes: repeated passes over
//! a growing tree never double-process a node, and entries do not keep
//! detached nodes alive. An explicit process-scoped object handed to the
//! engine at construction rather than an ambient singleton, with `reset()`
//! for tests.

use std::collections::HashMap;

use crate::dom::{NodeHandle, NodeId, WeakHandle};

/// Weak-membership record of processed nodes.
///
/// Keyed by node pointer identity; each entry also holds a weak handle so
/// a lookup only counts when the upgraded pointer is the very node being
/// queried. A plain pointer-keyed set would false-positive when the
/// allocator reuses a freed node's address.
#[derive(Default)]
pub struct ProcessedSet {
    entries: HashMap<NodeId, WeakHandle>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record that `node` has been rewritten.
    pub fn mark(&mut self, node: &NodeHandle) {
        self.entries.insert(node.id(), node.downgrade());
    }

    /// Whether `node` was already rewritten. Dead entries read as unmarked.
    pub fn is_marked(&self, node: &NodeHandle) -> bool {
        self.entries
            .get(&node.id())
            .and_then(|weak| weak.upgrade())
            .is_some_and(|held| held.ptr_eq(node))
    }

    /// Drop entries whose nodes the host has released. Called once per
    /// pass; correctness never depends on it, only memory use.
    pub fn compact(&mut self) {
        self.entries.retain(|_, weak| weak.upgrade().is_some());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
