//! # xgraph - named-node directed graphs
//!
//! A small graph library used as the structural input to the `xgraph-flow`
//! dataflow compiler. It provides:
//!
//! - [`Node`] - a keyed graph member with optional attribute and operator
//!   capabilities, plus [`BasicNode`] as a ready-made implementation
//! - [`Edge`] / [`EdgeKind`] - typed, attributed edges; several kinds can
//!   coexist over the same node set
//! - [`Graph`] - the read-only interface compilers consume
//! - [`DirectedGraph`] - an in-memory implementation
//! - [`directed_sort`] / [`directed_cycles`] - topological order and cycle
//!   detection per edge kind
//!
//! ## Example
//!
//! ```rust
//! use xgraph::{directed_sort, Attributes, BasicNode, DirectedGraph, EdgeKind};
//!
//! let deps = EdgeKind(1);
//! let mut g = DirectedGraph::new();
//! g.add_all([
//!     BasicNode::new("a").into_ref(),
//!     BasicNode::new("b").into_ref(),
//! ])
//! .unwrap();
//! g.associate("a", deps, "b", Attributes::new()).unwrap();
//!
//! let order: Vec<_> = directed_sort(&g, deps)
//!     .unwrap()
//!     .iter()
//!     .map(|n| n.key().to_string())
//!     .collect();
//! assert_eq!(order, vec!["a", "b"]);
//! ```

pub mod directed;
pub mod edge;
pub mod error;
pub mod node;

pub use directed::{directed_cycles, directed_sort, DirectedGraph, Graph};
pub use edge::{from_keys, sort_edges, to_keys, Edge, EdgeId, EdgeKind, EdgeLess};
pub use error::{GraphError, Result};
pub use node::{
    Attributes, BasicNode, Node, NodeKey, NodeRef, OperatorError, OperatorFunc, Value,
};
