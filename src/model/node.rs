use serde::{Deserialize, Serialize};

/// Stable identifier of a node. Assigned once at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A task or subtask. The structure is recursive: a top-level task and a
/// subtask at any depth have the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered children; position is the addressing basis for paths
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a leaf node. An empty description is stored as `None`.
    pub fn new(id: NodeId, title: String, description: Option<String>) -> Self {
        Node {
            id,
            title,
            description: description.filter(|d| !d.is_empty()),
            children: Vec::new(),
        }
    }

    /// Visit this node and every descendant, pre-order.
    pub fn walk(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Ids of this node and all its descendants
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.walk(&mut |n| ids.push(n.id));
        ids
    }

    /// Number of nodes in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }
}
