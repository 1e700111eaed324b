//! Typed, attributed edges between nodes.

use crate::node::{Attributes, NodeKey, NodeRef, Value};
use std::cmp::Ordering;
use std::fmt;

/// Tag partitioning one node set into independent relations.
///
/// Several edge kinds can coexist over the same nodes, e.g. a data dependency
/// graph and a control dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKind(pub u32);

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an edge: at most one edge exists per (kind, from, to).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId {
    pub kind: EdgeKind,
    pub from: NodeKey,
    pub to: NodeKey,
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind, self.from, self.to)
    }
}

/// A directed edge.
#[derive(Clone)]
pub struct Edge {
    kind: EdgeKind,
    from: NodeRef,
    to: NodeRef,
    attributes: Attributes,
}

impl Edge {
    pub fn new(kind: EdgeKind, from: NodeRef, to: NodeRef, attributes: Attributes) -> Self {
        Self {
            kind,
            from,
            to,
            attributes,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn from(&self) -> &NodeRef {
        &self.from
    }

    pub fn to(&self) -> &NodeRef {
        &self.to
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Look up a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn id(&self) -> EdgeId {
        EdgeId {
            kind: self.kind,
            from: self.from.key().clone(),
            to: self.to.key().clone(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("kind", &self.kind)
            .field("from", self.from.key())
            .field("to", self.to.key())
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Comparator returning `true` iff the first edge sorts before the second.
pub type EdgeLess = fn(&Edge, &Edge) -> bool;

/// Stable sort of `edges` with a "less than" comparator.
pub fn sort_edges(edges: &mut [Edge], less: EdgeLess) {
    edges.sort_by(|a, b| {
        if less(a, b) {
            Ordering::Less
        } else if less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
}

/// Origin keys of `edges`, in order.
pub fn from_keys(edges: &[Edge]) -> Vec<NodeKey> {
    edges.iter().map(|e| e.from().key().clone()).collect()
}

/// Destination keys of `edges`, in order.
pub fn to_keys(edges: &[Edge]) -> Vec<NodeKey> {
    edges.iter().map(|e| e.to().key().clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BasicNode;
    use serde_json::json;

    fn edge(from: &str, to: &str, index: Option<i64>) -> Edge {
        let mut attrs = Attributes::new();
        if let Some(i) = index {
            attrs.insert("arg".into(), json!(i));
        }
        Edge::new(
            EdgeKind(1),
            BasicNode::new(from).into_ref(),
            BasicNode::new(to).into_ref(),
            attrs,
        )
    }

    fn by_arg(a: &Edge, b: &Edge) -> bool {
        let ia = a.attribute("arg").and_then(Value::as_i64).unwrap_or(0);
        let ib = b.attribute("arg").and_then(Value::as_i64).unwrap_or(0);
        ia < ib
    }

    #[test]
    fn test_edge_display() {
        assert_eq!(edge("x1", "sumX", None).to_string(), "1(x1,sumX)");
    }

    #[test]
    fn test_sort_edges_uses_less() {
        let mut edges = vec![edge("y1", "s", Some(2)), edge("x3", "s", Some(0)), edge("y2", "s", Some(1))];
        sort_edges(&mut edges, by_arg);
        let keys: Vec<_> = from_keys(&edges).into_iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["x3", "y2", "y1"]);
    }

    #[test]
    fn test_sort_edges_is_stable_for_ties() {
        let mut edges = vec![edge("b", "s", None), edge("a", "s", None)];
        sort_edges(&mut edges, by_arg);
        assert_eq!(from_keys(&edges), vec![NodeKey::from("b"), NodeKey::from("a")]);
    }
}
