use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::node::{Node, NodeId};
use crate::model::path::NodePath;
use crate::model::shadow::ShadowMap;

/// Error type for tree operations. A failed operation leaves the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("path not found: {path} (segment {segment} is out of range)")]
    PathNotFound { path: NodePath, segment: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("corrupt state: {0}")]
    CorruptState(String),
}

fn not_found(path: &NodePath, segment: usize) -> TreeError {
    TreeError::PathNotFound {
        path: path.clone(),
        segment,
    }
}

/// The forest of tasks plus its id-keyed shadow state.
#[derive(Debug, Clone)]
pub struct TaskTree {
    tasks: Vec<Node>,
    completed: ShadowMap,
    expanded: ShadowMap,
    /// Next id to hand out; persisted so ids are never reused
    next_id: u64,
    /// Most recently toggled or selected node (view pointer, not persisted)
    inspected: Option<NodeId>,
}

impl Default for TaskTree {
    fn default() -> Self {
        TaskTree {
            tasks: Vec::new(),
            completed: ShadowMap::new(),
            expanded: ShadowMap::new(),
            next_id: 1,
            inspected: None,
        }
    }
}

/// Equality ignores the inspected pointer, which is view state only.
impl PartialEq for TaskTree {
    fn eq(&self, other: &Self) -> bool {
        self.tasks == other.tasks
            && self.completed == other.completed
            && self.expanded == other.expanded
            && self.next_id == other.next_id
    }
}

impl Eq for TaskTree {}

/// Persisted form of the tree
#[derive(Serialize)]
struct SnapshotRef<'a> {
    next_id: u64,
    tasks: &'a [Node],
    completed: &'a ShadowMap,
    expanded: &'a ShadowMap,
}

#[derive(Deserialize)]
struct Snapshot {
    next_id: u64,
    tasks: Vec<Node>,
    completed: ShadowMap,
    expanded: ShadowMap,
}

/// Trim a title and reject it if nothing is left.
fn validate_title(title: &str) -> Result<String, TreeError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TreeError::InvalidInput("title must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Path resolution
    // -----------------------------------------------------------------------

    /// Walk the first `upto` segments of `path` and return the children of
    /// the node reached (the forest itself when `upto == 0`). Errors name the
    /// first out-of-range segment of the full path.
    fn children_at(&self, path: &NodePath, upto: usize) -> Result<&Vec<Node>, TreeError> {
        let mut children = &self.tasks;
        for (seg, &idx) in path.indices()[..upto].iter().enumerate() {
            children = &children.get(idx).ok_or_else(|| not_found(path, seg))?.children;
        }
        Ok(children)
    }

    fn children_at_mut(
        &mut self,
        path: &NodePath,
        upto: usize,
    ) -> Result<&mut Vec<Node>, TreeError> {
        let mut children = &mut self.tasks;
        for (seg, &idx) in path.indices()[..upto].iter().enumerate() {
            children = &mut children
                .get_mut(idx)
                .ok_or_else(|| not_found(path, seg))?
                .children;
        }
        Ok(children)
    }

    /// Resolve a path to its node.
    pub fn resolve(&self, path: &NodePath) -> Result<&Node, TreeError> {
        let (_, last) = path.split_last().ok_or_else(|| not_found(path, 0))?;
        let upto = path.len() - 1;
        self.children_at(path, upto)?
            .get(last)
            .ok_or_else(|| not_found(path, upto))
    }

    pub fn resolve_mut(&mut self, path: &NodePath) -> Result<&mut Node, TreeError> {
        let (_, last) = path.split_last().ok_or_else(|| not_found(path, 0))?;
        let upto = path.len() - 1;
        self.children_at_mut(path, upto)?
            .get_mut(last)
            .ok_or_else(|| not_found(path, upto))
    }

    fn alloc_id(&mut self) -> Result<NodeId, TreeError> {
        let next = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| TreeError::CorruptState("node id counter is exhausted".into()))?;
        let id = NodeId(self.next_id);
        self.next_id = next;
        Ok(id)
    }

    fn register(&mut self, id: NodeId) {
        self.completed.insert_default(id);
        self.expanded.insert_default(id);
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a new top-level task. Returns its id.
    pub fn add_task(
        &mut self,
        title: &str,
        description: Option<String>,
    ) -> Result<NodeId, TreeError> {
        let title = validate_title(title)?;
        let id = self.alloc_id()?;
        self.tasks
            .push(Node::new(id, title, normalize_description(description)));
        self.register(id);
        Ok(id)
    }

    /// Append a child under the node at `parent_path`. Returns its id.
    pub fn add_subtask(
        &mut self,
        parent_path: &NodePath,
        title: &str,
        description: Option<String>,
    ) -> Result<NodeId, TreeError> {
        let title = validate_title(title)?;
        // Resolve before allocating so a bad path leaves the counter alone.
        self.resolve(parent_path)?;
        let id = self.alloc_id()?;
        let parent = self.resolve_mut(parent_path)?;
        parent
            .children
            .push(Node::new(id, title, normalize_description(description)));
        self.register(id);
        Ok(id)
    }

    /// Replace title and description. Identity and children are kept.
    pub fn edit_node(
        &mut self,
        path: &NodePath,
        title: &str,
        description: Option<String>,
    ) -> Result<(), TreeError> {
        let title = validate_title(title)?;
        let node = self.resolve_mut(path)?;
        node.title = title;
        node.description = normalize_description(description);
        Ok(())
    }

    /// Remove the node at `path` with its whole subtree and shadow entries.
    /// Later siblings shift down one index. Returns the removed node.
    pub fn delete_node(&mut self, path: &NodePath) -> Result<Node, TreeError> {
        let (_, last) = path.split_last().ok_or_else(|| not_found(path, 0))?;
        let upto = path.len() - 1;
        let siblings = self.children_at_mut(path, upto)?;
        if last >= siblings.len() {
            return Err(not_found(path, upto));
        }
        let removed = siblings.remove(last);

        let ids = removed.subtree_ids();
        self.completed.remove_all(&ids);
        self.expanded.remove_all(&ids);
        if self.inspected.is_some_and(|id| ids.contains(&id)) {
            self.inspected = None;
        }
        Ok(removed)
    }

    /// Flip the completion flag and return the new value. The node becomes
    /// the inspected node.
    pub fn toggle_completion(&mut self, path: &NodePath) -> Result<bool, TreeError> {
        let id = self.resolve(path)?.id;
        let done = self.completed.toggle(id);
        self.inspected = Some(id);
        Ok(done)
    }

    /// Flip the expansion flag and return the new value.
    pub fn toggle_expansion(&mut self, path: &NodePath) -> Result<bool, TreeError> {
        let id = self.resolve(path)?.id;
        Ok(self.expanded.toggle(id))
    }

    /// Look up a node and make it the inspected node.
    pub fn select_node(&mut self, path: &NodePath) -> Result<&Node, TreeError> {
        let id = self.resolve(path)?.id;
        self.inspected = Some(id);
        self.resolve(path)
    }

    pub fn clear_inspected(&mut self) {
        self.inspected = None;
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &[Node] {
        &self.tasks
    }

    pub fn is_completed(&self, id: NodeId) -> bool {
        self.completed.get(id).unwrap_or(false)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.get(id).unwrap_or(false)
    }

    pub fn completion(&self) -> &ShadowMap {
        &self.completed
    }

    pub fn expansion(&self) -> &ShadowMap {
        &self.expanded
    }

    pub fn inspected_id(&self) -> Option<NodeId> {
        self.inspected
    }

    pub fn inspected(&self) -> Option<&Node> {
        self.inspected.and_then(|id| self.find(id))
    }

    /// Find a node anywhere in the forest by id
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        fn find_in(nodes: &[Node], id: NodeId) -> Option<&Node> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(n) = find_in(&node.children, id) {
                    return Some(n);
                }
            }
            None
        }
        find_in(&self.tasks, id)
    }

    /// Current path of a node, if it still exists
    pub fn path_of(&self, id: NodeId) -> Option<NodePath> {
        fn path_in(nodes: &[Node], id: NodeId, prefix: &mut Vec<usize>) -> bool {
            for (i, node) in nodes.iter().enumerate() {
                prefix.push(i);
                if node.id == id || path_in(&node.children, id, prefix) {
                    return true;
                }
                prefix.pop();
            }
            false
        }
        let mut prefix = Vec::new();
        path_in(&self.tasks, id, &mut prefix).then(|| NodePath::new(prefix))
    }

    /// Completed and total counts over a node's direct children
    pub fn child_progress(&self, node: &Node) -> (usize, usize) {
        let done = node
            .children
            .iter()
            .filter(|c| self.is_completed(c.id))
            .count();
        (done, node.children.len())
    }

    /// Positional projection of completion state: each top-level index maps
    /// to the flags of that task's direct children, in order.
    pub fn completion_by_position(&self) -> BTreeMap<usize, Vec<bool>> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let flags = task
                    .children
                    .iter()
                    .map(|c| self.is_completed(c.id))
                    .collect();
                (i, flags)
            })
            .collect()
    }

    /// Total node count across the forest
    pub fn len(&self) -> usize {
        self.tasks.iter().map(Node::subtree_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialize the forest, both shadow maps and the id counter.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&SnapshotRef {
            next_id: self.next_id,
            tasks: &self.tasks,
            completed: &self.completed,
            expanded: &self.expanded,
        })
    }

    /// Parse and validate a blob into a fresh tree.
    pub fn deserialize(blob: &str) -> Result<TaskTree, TreeError> {
        let snap: Snapshot = serde_json::from_str(blob)
            .map_err(|e| TreeError::CorruptState(format!("malformed blob: {}", e)))?;

        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut problem: Option<String> = None;
        for task in &snap.tasks {
            task.walk(&mut |n| {
                if problem.is_some() {
                    return;
                }
                if !seen.insert(n.id) {
                    problem = Some(format!("duplicate node id {}", n.id));
                } else if n.title.trim().is_empty() {
                    problem = Some(format!("node {} has an empty title", n.id));
                }
            });
        }
        if let Some(p) = problem {
            return Err(TreeError::CorruptState(p));
        }

        for (name, map) in [("completion", &snap.completed), ("expansion", &snap.expanded)] {
            if let Some(id) = seen.iter().find(|id| !map.contains(**id)) {
                return Err(TreeError::CorruptState(format!(
                    "node {} has no {} entry",
                    id, name
                )));
            }
            if let Some(id) = map.keys().find(|id| !seen.contains(id)) {
                return Err(TreeError::CorruptState(format!(
                    "{} entry {} has no node",
                    name, id
                )));
            }
        }

        if snap.next_id == u64::MAX {
            return Err(TreeError::CorruptState(format!(
                "id counter {} leaves no ids to assign",
                snap.next_id
            )));
        }
        if let Some(max) = seen.iter().map(|id| id.0).max()
            && snap.next_id <= max
        {
            return Err(TreeError::CorruptState(format!(
                "id counter {} is not above highest id {}",
                snap.next_id, max
            )));
        }

        Ok(TaskTree {
            tasks: snap.tasks,
            completed: snap.completed,
            expanded: snap.expanded,
            next_id: snap.next_id.max(1),
            inspected: None,
        })
    }
}
