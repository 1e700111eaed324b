//! Compile-time resolution of what a node does when it runs.

use std::fmt;
use xgraph::{NodeKey, NodeRef, OperatorFunc};

/// A node as seen by a worker: either it applies an operator to its ordered
/// inputs, or it collects them into an object keyed by upstream node.
#[derive(Clone)]
pub enum FlowNode {
    Operator { key: NodeKey, operator: OperatorFunc },
    Plain { key: NodeKey },
}

impl FlowNode {
    /// Probe the node's operator capability once.
    pub fn resolve(node: &NodeRef) -> Self {
        match node.operator() {
            Some(operator) => Self::Operator {
                key: node.key().clone(),
                operator,
            },
            None => Self::Plain {
                key: node.key().clone(),
            },
        }
    }

    /// Collector with no operator.
    pub fn plain(key: impl Into<NodeKey>) -> Self {
        Self::Plain { key: key.into() }
    }

    pub fn key(&self) -> &NodeKey {
        match self {
            Self::Operator { key, .. } | Self::Plain { key } => key,
        }
    }

    pub fn operator(&self) -> Option<&OperatorFunc> {
        match self {
            Self::Operator { operator, .. } => Some(operator),
            Self::Plain { .. } => None,
        }
    }
}

impl fmt::Debug for FlowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator { key, .. } => write!(f, "Operator({})", key),
            Self::Plain { key } => write!(f, "Plain({})", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xgraph::BasicNode;

    #[test]
    fn test_resolve_operator_node() {
        let node = BasicNode::new("sum").with_operator(|_| Ok(json!(0))).into_ref();
        let resolved = FlowNode::resolve(&node);
        assert_eq!(resolved.key().as_str(), "sum");
        assert!(resolved.operator().is_some());
    }

    #[test]
    fn test_resolve_plain_node() {
        let resolved = FlowNode::resolve(&BasicNode::new("x1").into_ref());
        assert!(resolved.operator().is_none());
        assert_eq!(format!("{:?}", resolved), "Plain(x1)");
    }
}
