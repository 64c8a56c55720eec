use std::fmt;
use std::str::FromStr;

/// Positional address of a node: `[i0, i1, ..., ik]` descends through
/// `tasks[i0].children[i1]...`. Not stable across structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

/// Error type for parsing dotted path text like `0.2.1`
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("empty path")]
    Empty,
    #[error("invalid path segment '{0}': expected a non-negative integer")]
    BadSegment(String),
}

impl NodePath {
    pub fn new(indices: Vec<usize>) -> Self {
        NodePath(indices)
    }

    /// The implicit forest root (parent of top-level tasks)
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    /// Path of a top-level task
    pub fn top(index: usize) -> Self {
        NodePath(vec![index])
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Nesting depth (0 = top-level task). The root has no depth.
    pub fn depth(&self) -> Option<usize> {
        self.0.len().checked_sub(1)
    }

    /// Split into parent path and final index. `None` for the root.
    pub fn split_last(&self) -> Option<(NodePath, usize)> {
        let (last, parent) = self.0.split_last()?;
        Some((NodePath(parent.to_vec()), *last))
    }

    /// Path of the `index`-th child of this node
    pub fn child(&self, index: usize) -> NodePath {
        let mut v = self.0.clone();
        v.push(index);
        NodePath(v)
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(v: Vec<usize>) -> Self {
        NodePath(v)
    }
}

impl From<&[usize]> for NodePath {
    fn from(v: &[usize]) -> Self {
        NodePath(v.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        s.split('.')
            .map(|seg| {
                seg.parse::<usize>()
                    .map_err(|_| PathParseError::BadSegment(seg.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NodePath)
    }
}
