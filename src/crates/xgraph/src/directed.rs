//! The [`Graph`] interface consumed by compilers, and an in-memory implementation.
//!
//! ```text
//!   x1 ──┐
//!   x2 ──┼──> sumX ──┐
//!   x3 ──┤           ├──> ratio
//!        └──> sumY ──┘
//!   y1 ──────┘ │
//!   y2 ────────┘
//! ```
//!
//! Consumers need three things from a graph: a topologically ordered node list
//! for one edge kind, the inbound and outbound edges of a node for that kind, and
//! the attribute maps carried by nodes and edges. [`directed_sort`] and
//! [`directed_cycles`] are written against the trait so any implementation can be
//! compiled.

use crate::edge::{Edge, EdgeId, EdgeKind};
use crate::error::{GraphError, Result};
use crate::node::{Attributes, NodeKey, NodeRef};
use std::collections::{HashMap, HashSet, VecDeque};

/// Read-only view of a directed, multi-relation graph.
pub trait Graph: Send + Sync {
    /// Look up a node by key.
    fn node(&self, key: &str) -> Option<NodeRef>;

    /// All member nodes in insertion order.
    fn nodes(&self) -> Vec<NodeRef>;

    /// Edges of `kind` whose destination is `node`, in insertion order.
    fn inbound(&self, kind: EdgeKind, node: &NodeKey) -> Vec<Edge>;

    /// Edges of `kind` whose origin is `node`, in insertion order.
    fn outbound(&self, node: &NodeKey, kind: EdgeKind) -> Vec<Edge>;

    /// Every edge of `kind`, in insertion order.
    fn edges(&self, kind: EdgeKind) -> Vec<Edge>;

    fn has(&self, key: &str) -> bool {
        self.node(key).is_some()
    }
}

/// In-memory [`Graph`] keyed by [`NodeKey`].
#[derive(Debug, Default, Clone)]
pub struct DirectedGraph {
    nodes: Vec<NodeRef>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeId, usize>,
}

impl DirectedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Fails if another node already uses its key.
    pub fn add(&mut self, node: NodeRef) -> Result<()> {
        self.add_all([node])
    }

    /// Add several nodes at once; nothing is added if any key collides.
    pub fn add_all(&mut self, nodes: impl IntoIterator<Item = NodeRef>) -> Result<()> {
        let nodes: Vec<NodeRef> = nodes.into_iter().collect();
        let mut seen = HashSet::new();
        for node in &nodes {
            let key = node.key();
            if self.index.contains_key(key) || !seen.insert(key.clone()) {
                return Err(GraphError::DuplicateKey(key.clone()));
            }
        }
        for node in nodes {
            self.index.insert(node.key().clone(), self.nodes.len());
            self.nodes.push(node);
        }
        Ok(())
    }

    /// Connect `from` to `to` under `kind`.
    ///
    /// Associating the same pair twice under one kind replaces the attributes of
    /// the existing edge.
    pub fn associate(
        &mut self,
        from: &str,
        kind: EdgeKind,
        to: &str,
        attributes: Attributes,
    ) -> Result<Edge> {
        let from = self.node(from).ok_or_else(|| GraphError::NoSuchNode {
            role: "from",
            key: NodeKey::from(from),
        })?;
        let to = self.node(to).ok_or_else(|| GraphError::NoSuchNode {
            role: "to",
            key: NodeKey::from(to),
        })?;

        let edge = Edge::new(kind, from, to, attributes);
        match self.edge_index.get(&edge.id()) {
            Some(&i) => self.edges[i] = edge.clone(),
            None => {
                self.edge_index.insert(edge.id(), self.edges.len());
                self.edges.push(edge.clone());
            }
        }
        Ok(edge)
    }

    /// Whether an edge of `kind` connects `from` to `to`.
    pub fn edge(&self, from: &str, kind: EdgeKind, to: &str) -> bool {
        self.edge_index.contains_key(&EdgeId {
            kind,
            from: NodeKey::from(from),
            to: NodeKey::from(to),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Graph for DirectedGraph {
    fn node(&self, key: &str) -> Option<NodeRef> {
        self.index.get(key).map(|&i| self.nodes[i].clone())
    }

    fn nodes(&self) -> Vec<NodeRef> {
        self.nodes.clone()
    }

    fn inbound(&self, kind: EdgeKind, node: &NodeKey) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.kind() == kind && e.to().key() == node)
            .cloned()
            .collect()
    }

    fn outbound(&self, node: &NodeKey, kind: EdgeKind) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.kind() == kind && e.from().key() == node)
            .cloned()
            .collect()
    }

    fn edges(&self, kind: EdgeKind) -> Vec<Edge> {
        self.edges.iter().filter(|e| e.kind() == kind).cloned().collect()
    }
}

/// Nodes touched by at least one edge of `kind`, in insertion order.
fn members(g: &dyn Graph, kind: EdgeKind) -> Vec<NodeRef> {
    let mut touched = HashSet::new();
    for edge in g.edges(kind) {
        touched.insert(edge.from().key().clone());
        touched.insert(edge.to().key().clone());
    }
    g.nodes()
        .into_iter()
        .filter(|n| touched.contains(n.key()))
        .collect()
}

/// Topologically sort the nodes participating in `kind`.
///
/// Kahn's algorithm seeded in insertion order, so the result is deterministic
/// for a given graph. Nodes with no edge of `kind` are not part of that relation
/// and are omitted.
pub fn directed_sort(g: &dyn Graph, kind: EdgeKind) -> Result<Vec<NodeRef>> {
    let nodes = members(g, kind);
    let mut in_degree: HashMap<NodeKey, usize> = nodes
        .iter()
        .map(|n| (n.key().clone(), g.inbound(kind, n.key()).len()))
        .collect();

    let mut ready: VecDeque<NodeRef> = nodes
        .iter()
        .filter(|n| in_degree[n.key()] == 0)
        .cloned()
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_front() {
        for edge in g.outbound(node.key(), kind) {
            if let Some(degree) = in_degree.get_mut(edge.to().key()) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(edge.to().clone());
                }
            }
        }
        sorted.push(node);
    }

    if sorted.len() != nodes.len() {
        let path = directed_cycles(g, kind).into_iter().next().unwrap_or_default();
        return Err(GraphError::Cycle { kind: kind.0, path });
    }
    Ok(sorted)
}

/// Cycles of `kind` discovered by depth-first search.
///
/// Each back edge yields one cycle, reported as a closed path (first key repeated
/// at the end). This is not an enumeration of every elementary cycle.
pub fn directed_cycles(g: &dyn Graph, kind: EdgeKind) -> Vec<Vec<NodeKey>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        g: &dyn Graph,
        kind: EdgeKind,
        key: &NodeKey,
        marks: &mut HashMap<NodeKey, Mark>,
        stack: &mut Vec<NodeKey>,
        cycles: &mut Vec<Vec<NodeKey>>,
    ) {
        marks.insert(key.clone(), Mark::OnStack);
        stack.push(key.clone());
        for edge in g.outbound(key, kind) {
            let next = edge.to().key();
            match marks.get(next).copied().unwrap_or(Mark::Unvisited) {
                Mark::Unvisited => visit(g, kind, next, marks, stack, cycles),
                Mark::OnStack => {
                    if let Some(start) = stack.iter().position(|k| k == next) {
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(next.clone());
                        cycles.push(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks.insert(key.clone(), Mark::Done);
    }

    let mut marks = HashMap::new();
    let mut cycles = Vec::new();
    for node in members(g, kind) {
        if marks.get(node.key()).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
            visit(g, kind, node.key(), &mut marks, &mut Vec::new(), &mut cycles);
        }
    }
    cycles
}
