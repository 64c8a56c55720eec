use serde::Serialize;

use crate::model::node::Node;
use crate::model::path::NodePath;
use crate::ops::search::SearchHit;
use crate::ops::tree_ops::TaskTree;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NodeJson {
    pub path: String,
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub done: bool,
    pub expanded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeJson>,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub path: String,
    pub title: String,
    pub field: String,
}

/// Returned by write commands so scripts can chain on the new path.
#[derive(Serialize)]
pub struct MutationJson {
    pub path: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn node_to_json(tree: &TaskTree, node: &Node, path: &NodePath) -> NodeJson {
    NodeJson {
        path: path.to_string(),
        id: node.id.0,
        title: node.title.clone(),
        description: node.description.clone(),
        done: tree.is_completed(node.id),
        expanded: tree.is_expanded(node.id),
        children: node
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| node_to_json(tree, child, &path.child(i)))
            .collect(),
    }
}

pub fn hit_to_json(tree: &TaskTree, hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        path: hit.path.to_string(),
        title: tree
            .resolve(&hit.path)
            .map(|n| n.title.clone())
            .unwrap_or_default(),
        field: hit.field.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn check_char(done: bool) -> char {
    if done { 'x' } else { ' ' }
}

/// One-line summary: `[x] 0.1  Title (2/3)`
pub fn format_node_line(tree: &TaskTree, node: &Node, path: &NodePath) -> String {
    let progress = if node.children.is_empty() {
        String::new()
    } else {
        let (done, total) = tree.child_progress(node);
        format!(" ({}/{})", done, total)
    };
    format!(
        "[{}] {:<6} {}{}",
        check_char(tree.is_completed(node.id)),
        path.to_string(),
        node.title,
        progress
    )
}

/// Format a node with all of its descendants, indented
pub fn format_node_tree(tree: &TaskTree, node: &Node, path: &NodePath, indent: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}",
        "  ".repeat(indent),
        format_node_line(tree, node, path)
    )];
    for (i, child) in node.children.iter().enumerate() {
        lines.extend(format_node_tree(tree, child, &path.child(i), indent + 1));
    }
    lines
}

/// Format the detailed view used by `tt show`
pub fn format_node_detail(tree: &TaskTree, node: &Node, path: &NodePath) -> Vec<String> {
    let mut lines = vec![format!(
        "[{}] {}",
        check_char(tree.is_completed(node.id)),
        node.title
    )];
    lines.push(format!("path: {}", path));
    lines.push(format!("id: {}", node.id));

    if let Some(desc) = &node.description {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }

    if !node.children.is_empty() {
        let (done, total) = tree.child_progress(node);
        lines.push(String::new());
        lines.push(format!("subtasks ({}/{} done):", done, total));
        for (i, child) in node.children.iter().enumerate() {
            lines.extend(format_node_tree(tree, child, &path.child(i), 1));
        }
    }

    lines
}
