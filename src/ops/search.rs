use std::ops::Range;

use regex::Regex;

use crate::model::node::Node;
use crate::model::path::NodePath;
use crate::ops::tree_ops::TaskTree;

/// Which field of a node matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Description,
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchField::Title => write!(f, "title"),
            MatchField::Description => write!(f, "description"),
        }
    }
}

/// A search hit on one field of one node
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: NodePath,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Compile a user pattern case-insensitively, falling back to a literal
/// match when the pattern is not a valid regex.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("(?i){}", pattern))
        .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(pattern))))
        .ok()
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Top-level indices of tasks whose title, or the title of any descendant,
/// contains `term` (case-insensitive). An empty term keeps every task.
pub fn filter_tasks(tree: &TaskTree, term: &str) -> Vec<usize> {
    let needle = term.trim().to_lowercase();
    tree.tasks()
        .iter()
        .enumerate()
        .filter(|(_, task)| needle.is_empty() || subtree_title_matches(task, &needle))
        .map(|(i, _)| i)
        .collect()
}

/// Whether a node's title or any descendant title contains `needle`.
/// `needle` must already be lowercase.
pub fn subtree_title_matches(node: &Node, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle)
        || node
            .children
            .iter()
            .any(|c| subtree_title_matches(c, needle))
}

// ---------------------------------------------------------------------------
// Regex search
// ---------------------------------------------------------------------------

/// Search every node's title and description.
pub fn search_nodes(tree: &TaskTree, re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for (i, task) in tree.tasks().iter().enumerate() {
        search_node(re, task, NodePath::top(i), &mut hits);
    }
    hits
}

fn search_node(re: &Regex, node: &Node, path: NodePath, hits: &mut Vec<SearchHit>) {
    let spans = find_matches(re, &node.title);
    if !spans.is_empty() {
        hits.push(SearchHit {
            path: path.clone(),
            field: MatchField::Title,
            spans,
        });
    }

    if let Some(desc) = &node.description {
        let spans = find_matches(re, desc);
        if !spans.is_empty() {
            hits.push(SearchHit {
                path: path.clone(),
                field: MatchField::Description,
                spans,
            });
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        search_node(re, child, path.child(i), hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TaskTree {
        let mut tree = TaskTree::new();
        tree.add_task("Finish the project", Some("Due end of month".into()))
            .unwrap();
        tree.add_task("Prepare report", None).unwrap();
        tree.add_task("Team meeting", None).unwrap();
        tree.add_subtask(&NodePath::top(0), "Write code", None)
            .unwrap();
        tree.add_subtask(&NodePath::top(1), "Collect DATA", None)
            .unwrap();
        tree.add_subtask(&NodePath::new(vec![1, 0]), "Query the warehouse", None)
            .unwrap();
        tree
    }

    #[test]
    fn filter_empty_term_keeps_all() {
        assert_eq!(filter_tasks(&sample_tree(), ""), vec![0, 1, 2]);
        assert_eq!(filter_tasks(&sample_tree(), "   "), vec![0, 1, 2]);
    }

    #[test]
    fn filter_matches_own_title_case_insensitive() {
        assert_eq!(filter_tasks(&sample_tree(), "TEAM"), vec![2]);
    }

    #[test]
    fn filter_matches_through_descendants() {
        assert_eq!(filter_tasks(&sample_tree(), "data"), vec![1]);
        assert_eq!(filter_tasks(&sample_tree(), "warehouse"), vec![1]);
        assert!(filter_tasks(&sample_tree(), "nothing here").is_empty());
    }

    #[test]
    fn search_reports_paths_and_fields() {
        let tree = sample_tree();
        let re = compile_pattern("the").unwrap();
        let hits = search_nodes(&tree, &re);
        let found: Vec<(String, MatchField)> = hits
            .iter()
            .map(|h| (h.path.to_string(), h.field))
            .collect();
        assert_eq!(
            found,
            vec![
                ("0".to_string(), MatchField::Title),
                ("1.0.0".to_string(), MatchField::Title),
            ]
        );
        assert_eq!(hits[0].spans, vec![7..10]);
    }

    #[test]
    fn search_matches_description() {
        let tree = sample_tree();
        let re = compile_pattern("month").unwrap();
        let hits = search_nodes(&tree, &re);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field, MatchField::Description);
    }

    #[test]
    fn invalid_regex_falls_back_to_literal() {
        let re = compile_pattern("(unclosed").unwrap();
        assert!(re.is_match("an (UNCLOSED paren"));
    }
}
