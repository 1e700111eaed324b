//! Node identity, capabilities and a ready-made node implementation.
//!
//! A node is anything with a stable [`NodeKey`]. Two optional capabilities can be
//! layered on top through default trait methods:
//!
//! - **attributes** – an opaque key/value bag (timeouts, concurrency limits, ...)
//! - **operator** – the function a dataflow engine invokes with the node's
//!   positional arguments
//!
//! Consumers resolve both capabilities once, when they compile the graph, rather
//! than probing them on every invocation.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Dynamic value passed between operators.
pub type Value = serde_json::Value;

/// Opaque attribute bag attached to nodes and edges.
pub type Attributes = serde_json::Map<String, Value>;

/// Error type returned by operators.
pub type OperatorError = Box<dyn std::error::Error + Send + Sync>;

/// A pure function from an ordered argument list to a result.
pub type OperatorFunc = Arc<dyn Fn(Vec<Value>) -> Result<Value, OperatorError> + Send + Sync>;

/// Shared handle to a node.
pub type NodeRef = Arc<dyn Node>;

/// Stable, human-readable identity of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&NodeKey> for NodeKey {
    fn from(key: &NodeKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A member of a graph.
///
/// Only [`key`](Node::key) is required. Implement [`attributes`](Node::attributes)
/// and [`operator`](Node::operator) to opt into the corresponding capabilities.
pub trait Node: fmt::Debug + Send + Sync + 'static {
    /// Stable key used for lookup, ordering and diagnostics.
    fn key(&self) -> &NodeKey;

    /// Attribute bag, if the node carries one.
    fn attributes(&self) -> Option<&Attributes> {
        None
    }

    /// Operator to invoke for this node, if any.
    fn operator(&self) -> Option<OperatorFunc> {
        None
    }
}

/// General purpose [`Node`] built from a key, optional operator and attributes.
///
/// # Example
///
/// ```rust
/// use xgraph::{BasicNode, Node};
/// use serde_json::json;
///
/// let node = BasicNode::new("sum")
///     .with_operator(|args| Ok(json!(args.len())))
///     .with_attribute("max_workers", json!(4));
///
/// assert_eq!(node.key().as_str(), "sum");
/// assert!(node.operator().is_some());
/// ```
#[derive(Clone)]
pub struct BasicNode {
    key: NodeKey,
    attributes: Attributes,
    operator: Option<OperatorFunc>,
}

impl BasicNode {
    pub fn new(key: impl Into<NodeKey>) -> Self {
        Self {
            key: key.into(),
            attributes: Attributes::new(),
            operator: None,
        }
    }

    /// Attach an operator.
    pub fn with_operator<F>(mut self, operator: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, OperatorError> + Send + Sync + 'static,
    {
        self.operator = Some(Arc::new(operator));
        self
    }

    /// Attach an already shared operator.
    pub fn with_operator_func(mut self, operator: OperatorFunc) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Set a single attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Replace the whole attribute bag.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Wrap into a shared [`NodeRef`].
    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }
}

impl fmt::Debug for BasicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicNode")
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .field("operator", &self.operator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Node for BasicNode {
    fn key(&self) -> &NodeKey {
        &self.key
    }

    fn attributes(&self) -> Option<&Attributes> {
        if self.attributes.is_empty() {
            None
        } else {
            Some(&self.attributes)
        }
    }

    fn operator(&self) -> Option<OperatorFunc> {
        self.operator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_node_key_borrows_as_str() {
        let mut map = HashMap::new();
        map.insert(NodeKey::from("x1"), 1);
        assert_eq!(map.get("x1"), Some(&1));
    }

    #[test]
    fn test_node_key_ordering_is_lexicographic() {
        let mut keys = vec![NodeKey::from("y1"), NodeKey::from("x3"), NodeKey::from("x1")];
        keys.sort();
        assert_eq!(keys, vec![NodeKey::from("x1"), NodeKey::from("x3"), NodeKey::from("y1")]);
    }

    #[test]
    fn test_basic_node_without_capabilities() {
        let node = BasicNode::new("plain");
        assert!(node.attributes().is_none());
        assert!(node.operator().is_none());
    }

    #[test]
    fn test_basic_node_operator_is_callable() {
        let node = BasicNode::new("len").with_operator(|args| Ok(json!(args.len())));
        let op = node.operator().unwrap();
        assert_eq!(op(vec![json!(1), json!(2)]).unwrap(), json!(2));
    }

    #[test]
    fn test_basic_node_attributes() {
        let node = BasicNode::new("slow")
            .with_attribute("timeout", json!("1s"))
            .with_attribute("inline", json!(true));
        let attrs = node.attributes().unwrap();
        assert_eq!(attrs.get("timeout"), Some(&json!("1s")));
        assert_eq!(attrs.get("inline"), Some(&json!(true)));
    }
}
