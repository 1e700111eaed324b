//! Named orderings of a node's inbound edges.
//!
//! The order of a node's inbound edges is the order of its operator's
//! arguments. Orderings are selected by name, per node through the
//! `edge_sorter` attribute or graph-wide through
//! [`Options::default_edge_sorter`](crate::Options::default_edge_sorter).

use xgraph::{Edge, EdgeLess, Value};

/// Name of the ordering used when none is configured.
pub const DEFAULT_EDGE_SORTER: &str = "edge_attr_order_or_node_key";

/// Edge attributes consulted for an explicit argument position, in priority order.
pub const POSITION_ATTRIBUTES: [&str; 2] = ["arg", "order"];

const SORTERS: &[(&str, EdgeLess)] = &[
    (
        DEFAULT_EDGE_SORTER,
        order_by_edge_attribute_or_node_key as EdgeLess,
    ),
    ("node_key", order_by_node_key as EdgeLess),
];

/// Look up an ordering by name, falling back to [`DEFAULT_EDGE_SORTER`].
pub fn edge_sorter(name: Option<&str>) -> EdgeLess {
    name.and_then(lookup)
        .unwrap_or(order_by_edge_attribute_or_node_key)
}

/// Look up an ordering by name.
pub fn lookup(name: &str) -> Option<EdgeLess> {
    SORTERS.iter().find(|(n, _)| *n == name).map(|(_, less)| *less)
}

/// Names of every registered ordering.
pub fn sorter_names() -> impl Iterator<Item = &'static str> {
    SORTERS.iter().map(|(name, _)| *name)
}

/// Order by the integer position attribute, then by origin node key.
///
/// Edges carrying a position come before edges without one.
pub fn order_by_edge_attribute_or_node_key(a: &Edge, b: &Edge) -> bool {
    match (position(a), position(b)) {
        (Some(pa), Some(pb)) if pa != pb => pa < pb,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        _ => order_by_node_key(a, b),
    }
}

/// Order by origin node key.
pub fn order_by_node_key(a: &Edge, b: &Edge) -> bool {
    a.from().key() < b.from().key()
}

fn position(edge: &Edge) -> Option<i64> {
    POSITION_ATTRIBUTES
        .iter()
        .find_map(|name| edge.attribute(name).and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use xgraph::{from_keys, sort_edges, Attributes, BasicNode, EdgeKind, NodeKey};

    fn edge(from: &str, attr: Option<(&str, i64)>) -> Edge {
        let mut attrs = Attributes::new();
        if let Some((name, value)) = attr {
            attrs.insert(name.to_string(), json!(value));
        }
        Edge::new(
            EdgeKind(1),
            BasicNode::new(from).into_ref(),
            BasicNode::new("sink").into_ref(),
            attrs,
        )
    }

    fn sorted(mut edges: Vec<Edge>, less: EdgeLess) -> Vec<String> {
        sort_edges(&mut edges, less);
        from_keys(&edges).into_iter().map(|k: NodeKey| k.to_string()).collect()
    }

    #[test]
    fn test_position_attribute_wins() {
        let edges = vec![
            edge("y1", Some(("arg", 2))),
            edge("x3", Some(("arg", 0))),
            edge("y2", Some(("arg", 1))),
        ];
        assert_eq!(sorted(edges, edge_sorter(None)), vec!["x3", "y2", "y1"]);
    }

    #[test]
    fn test_order_attribute_is_accepted() {
        let edges = vec![edge("a", Some(("order", 1))), edge("b", Some(("order", 0)))];
        assert_eq!(sorted(edges, edge_sorter(None)), vec!["b", "a"]);
    }

    #[test]
    fn test_falls_back_to_node_key() {
        let edges = vec![edge("c", None), edge("a", None), edge("b", None)];
        assert_eq!(sorted(edges, edge_sorter(None)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_positioned_edges_come_first() {
        let edges = vec![
            edge("b", None),
            edge("a", Some(("arg", 2))),
            edge("c", Some(("arg", 1))),
            edge("d", None),
        ];
        assert_eq!(sorted(edges, edge_sorter(None)), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_ties_broken_by_node_key() {
        let edges = vec![edge("b", Some(("arg", 1))), edge("a", Some(("arg", 1)))];
        assert_eq!(sorted(edges, edge_sorter(None)), vec!["a", "b"]);
    }

    #[test]
    fn test_node_key_sorter_ignores_attributes() {
        let edges = vec![edge("b", Some(("arg", 0))), edge("a", Some(("arg", 1)))];
        assert_eq!(sorted(edges, edge_sorter(Some("node_key"))), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_name_uses_default() {
        assert!(lookup("no_such_sorter").is_none());
        let edges = vec![edge("b", Some(("arg", 0))), edge("a", Some(("arg", 1)))];
        assert_eq!(sorted(edges, edge_sorter(Some("no_such_sorter"))), vec!["b", "a"]);
    }

    #[test]
    fn test_registered_names() {
        let names: Vec<_> = sorter_names().collect();
        assert_eq!(names, vec![DEFAULT_EDGE_SORTER, "node_key"]);
    }

    proptest! {
        #[test]
        fn prop_positions_then_keys(
            positions in proptest::collection::vec(proptest::option::of(-3i64..3), 1..40)
        ) {
            let edges: Vec<Edge> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| edge(&format!("n{:02}", i), p.map(|p| ("arg", p))))
                .collect();
            let mut expected: Vec<(bool, i64, String)> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| (p.is_none(), p.unwrap_or(0), format!("n{:02}", i)))
                .collect();
            expected.sort();
            let expected: Vec<String> = expected.into_iter().map(|(_, _, k)| k).collect();
            prop_assert_eq!(sorted(edges, edge_sorter(None)), expected);
        }
    }
}
