use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Per-node boolean tracked alongside the tree (completion, expansion).
///
/// Keyed by stable `NodeId` rather than position, so structural edits to a
/// sibling list never move a flag onto the wrong node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowMap(BTreeMap<NodeId, bool>);

impl ShadowMap {
    pub fn new() -> Self {
        ShadowMap(BTreeMap::new())
    }

    /// Create the entry for a freshly inserted node
    pub fn insert_default(&mut self, id: NodeId) {
        self.0.insert(id, false);
    }

    pub fn get(&self, id: NodeId) -> Option<bool> {
        self.0.get(&id).copied()
    }

    pub fn set(&mut self, id: NodeId, value: bool) {
        self.0.insert(id, value);
    }

    /// Flip the flag and return the new value. A missing entry counts as
    /// `false` before the flip.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        let slot = self.0.entry(id).or_insert(false);
        *slot = !*slot;
        *slot
    }

    /// Drop the entries of a removed subtree
    pub fn remove_all(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.0.remove(id);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.keys().copied()
    }
}
