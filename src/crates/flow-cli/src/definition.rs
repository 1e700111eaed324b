//! YAML graph definitions
//!
//! ```yaml
//! name: ratio
//! description: Ratio of two partial sums
//! options:
//!   channel_capacity: 8
//! nodes:
//!   x1: {}
//!   x2: {}
//!   total:
//!     op: sum
//!     attributes:
//!       timeout: 1s
//! edges:
//!   - from: x1
//!     to: total
//!     arg: 0
//!   - from: x2
//!     to: total
//!     arg: 1
//! ```
//!
//! Nodes without `op` collect their inputs into an object keyed by upstream
//! node. `arg` is shorthand for the edge attribute of the same name.

use crate::operators;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use xgraph::{directed_sort, Attributes, BasicNode, DirectedGraph, EdgeKind};
use xgraph_flow::{NodeAttributes, Options};

/// Edge kind used for every dependency in a definition.
pub const DEPENDS_ON: EdgeKind = EdgeKind(1);

/// Top-level YAML graph definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDef {
    /// Graph name, used as the executor reference
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Engine options
    #[serde(default)]
    pub options: Options,

    /// Node definitions keyed by node key
    pub nodes: BTreeMap<String, NodeDef>,

    #[serde(default)]
    pub edges: Vec<EdgeDef>,
}

/// Node definition in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDef {
    /// Built-in operator name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,

    /// Node attributes (`timeout`, `max_workers`, `inline`, `edge_sorter`)
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// Edge definition in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,

    /// Argument position at the destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<i64>,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl EdgeDef {
    fn merged_attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        if let Some(arg) = self.arg {
            attributes.insert("arg".to_string(), json!(arg));
        }
        attributes
    }
}

impl GraphDef {
    /// Load a graph definition from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse a graph definition from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check operators, attributes, edge endpoints, options and acyclicity.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("graph '{}' has no nodes", self.name);
        }
        self.options.validate()?;

        for (key, node) in &self.nodes {
            if let Some(op) = &node.op {
                if operators::builtin(op, key).is_none() {
                    bail!(
                        "node '{}' uses unknown operator '{}', expected one of: {}",
                        key,
                        op,
                        operators::BUILTIN.join(", ")
                    );
                }
            }
            NodeAttributes::from_attributes(Some(&node.attributes))
                .with_context(|| format!("node '{}' has invalid attributes", key))?;
        }

        let mut seen = HashSet::new();
        for edge in &self.edges {
            for (role, key) in [("from", &edge.from), ("to", &edge.to)] {
                if !self.nodes.contains_key(key) {
                    bail!("edge {} -> {} references unknown {} node '{}'", edge.from, edge.to, role, key);
                }
            }
            if !seen.insert((edge.from.as_str(), edge.to.as_str())) {
                bail!("duplicate edge {} -> {}", edge.from, edge.to);
            }
        }

        let graph = self.build()?;
        directed_sort(&graph, DEPENDS_ON)?;
        Ok(())
    }

    /// Build the in-memory graph with built-in operators attached.
    pub fn build(&self) -> Result<DirectedGraph> {
        let mut graph = DirectedGraph::new();
        for (key, node) in &self.nodes {
            let mut built = BasicNode::new(key.as_str()).with_attributes(node.attributes.clone());
            if let Some(op) = &node.op {
                let operator = operators::builtin(op, key)
                    .ok_or_else(|| anyhow!("node '{}' uses unknown operator '{}'", key, op))?;
                built = built.with_operator_func(operator);
            }
            graph.add(built.into_ref())?;
        }
        for edge in &self.edges {
            graph.associate(&edge.from, DEPENDS_ON, &edge.to, edge.merged_attributes())?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATIO: &str = r#"
name: ratio
nodes:
  x1: {}
  x2: {}
  x3: {}
  y1: {}
  sumX:
    op: sum
  sumY:
    op: sum
    attributes:
      timeout: 1s
  ratio:
    op: format
edges:
  - { from: x1, to: sumX }
  - { from: x2, to: sumX }
  - { from: x3, to: sumX }
  - { from: x3, to: sumY, arg: 0 }
  - { from: y1, to: sumY, arg: 1 }
  - { from: sumX, to: ratio, arg: 0 }
  - { from: sumY, to: ratio, arg: 1 }
"#;

    #[test]
    fn test_parse_and_validate() {
        let def = GraphDef::from_yaml_str(RATIO).unwrap();
        assert_eq!(def.name, "ratio");
        assert_eq!(def.nodes.len(), 7);
        assert_eq!(def.edges.len(), 7);
        assert_eq!(def.options.channel_capacity, 16);
        def.validate().unwrap();
    }

    #[test]
    fn test_arg_becomes_edge_attribute() {
        let def = GraphDef::from_yaml_str(RATIO).unwrap();
        let graph = def.build().unwrap();
        assert!(graph.edge("x3", DEPENDS_ON, "sumY"));
        let attrs = def.edges[3].merged_attributes();
        assert_eq!(attrs.get("arg"), Some(&json!(0)));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let yaml = "name: g\nnodes:\n  a:\n    op: divide\n";
        let err = GraphDef::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("unknown operator 'divide'"));
    }

    #[test]
    fn test_unknown_edge_endpoint_is_rejected() {
        let yaml = "name: g\nnodes:\n  a: {}\nedges:\n  - { from: a, to: b }\n";
        let err = GraphDef::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("unknown to node 'b'"));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let yaml = "name: g\nnodes:\n  a: {}\n  b: {}\nedges:\n  - { from: a, to: b }\n  - { from: b, to: a }\n";
        let err = GraphDef::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("Cycle detected"));
    }

    #[test]
    fn test_bad_attribute_is_rejected() {
        let yaml = "name: g\nnodes:\n  a:\n    attributes:\n      timeout: soon\n";
        let err = GraphDef::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("node 'a' has invalid attributes"));
    }

    #[test]
    fn test_bad_options_are_rejected() {
        let yaml = "name: g\noptions:\n  channel_capacity: 0\nnodes:\n  a: {}\n";
        let err = GraphDef::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }
}
