//! Error types for graph construction and traversal.

use crate::node::NodeKey;
use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or sorting a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node with the same key is already a member of the graph.
    #[error("Duplicate key: {0}")]
    DuplicateKey(NodeKey),

    /// An edge endpoint is not a member of the graph.
    ///
    /// `role` is either `"from"` or `"to"`.
    #[error("Missing {role} node: {key}")]
    NoSuchNode {
        /// Which endpoint was missing
        role: &'static str,
        /// Key of the missing node
        key: NodeKey,
    },

    /// The relation selected by an edge kind contains a cycle.
    #[error("Cycle detected in edge kind {kind}: {}", format_path(.path))]
    Cycle {
        /// Edge kind that was being sorted
        kind: u32,
        /// Nodes participating in (one of) the cycles
        path: Vec<NodeKey>,
    },
}

fn format_path(path: &[NodeKey]) -> String {
    path.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
