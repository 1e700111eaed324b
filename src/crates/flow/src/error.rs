//! Error types for compiling and executing flow graphs
//!
//! Every failure the engine can report is a [`FlowError`]. The type is `Clone`
//! because a settled [`Awaitable`](crate::Awaitable) hands the same error to any
//! number of readers; foreign errors (serde, io) are therefore captured as
//! messages rather than wrapped.
//!
//! # Error Hierarchy
//!
//! ```text
//! FlowError
//! ├── MissingChannel     - compile: inbound edge with no allocated channel
//! ├── Attributes         - compile: node attribute bag does not parse
//! ├── Graph              - compile: sort/cycle errors from xgraph
//! ├── NotAnInput         - exec: key is not an entry node
//! ├── Closed             - exec: executor already shut down
//! ├── MissingFuture      - run: gathered inputs lack a required node
//! ├── Operator           - run: the node's operator returned an error
//! ├── Panicked           - run: the node's computation panicked
//! ├── Canceled           - run: owning context was canceled
//! ├── DeadlineExceeded   - run: owning context passed its deadline
//! ├── Shutdown           - close: a worker stage did not exit cleanly
//! └── Configuration      - options / definitions could not be loaded
//! ```
//!
//! Operator errors propagate: a node whose upstream failed settles with the
//! upstream error, so the failure surfaces on every output that depends on it.

use crate::context::FlowId;
use thiserror::Error;
use xgraph::{GraphError, NodeKey, OperatorError};

/// Result type for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors produced while compiling or executing a flow graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// An inbound edge has no channel allocated by its producer.
    ///
    /// The node list handed to the compiler was not topologically sorted.
    #[error("No channel allocated for edge {edge}")]
    MissingChannel {
        /// Display form of the edge, `kind(from,to)`
        edge: String,
    },

    /// A node's attribute bag could not be parsed.
    #[error("Invalid attributes for node '{node}': {message}")]
    Attributes {
        /// Node carrying the attributes
        node: NodeKey,
        /// Parser message
        message: String,
    },

    /// Error reported by the graph collaborator (sorting, membership).
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A value was supplied for a node that is not a graph input.
    #[error("Not an input node: {0}")]
    NotAnInput(NodeKey),

    /// The executor was closed before the call.
    #[error("Executor is closed")]
    Closed,

    /// A node's gathered inputs do not contain a required upstream node.
    ///
    /// Unreachable when the completeness check holds; reported instead of
    /// panicking.
    #[error("{flow}: missing future for {node}")]
    MissingFuture {
        /// Flow being evaluated
        flow: FlowId,
        /// Required upstream node
        node: NodeKey,
    },

    /// The node's operator returned an error.
    #[error("Operator '{node}' failed: {message}")]
    Operator {
        /// Node whose operator failed
        node: NodeKey,
        /// Error message returned by the operator
        message: String,
    },

    /// The node's computation panicked.
    #[error("Computation panicked: {0}")]
    Panicked(String),

    /// The owning context was canceled.
    #[error("context canceled")]
    Canceled,

    /// The owning context passed its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A worker stage failed while shutting down.
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Options or definitions could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FlowError {
    /// Wrap an operator error for `node`.
    pub fn operator(node: &NodeKey, error: OperatorError) -> Self {
        Self::Operator {
            node: node.clone(),
            message: error.to_string(),
        }
    }

    /// Whether this error came from a canceled or expired context.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Configuration(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        FlowError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_error_keeps_message() {
        let err = FlowError::operator(&NodeKey::from("ratio"), "division by zero".into());
        assert_eq!(err.to_string(), "Operator 'ratio' failed: division by zero");
    }

    #[test]
    fn test_context_errors() {
        assert!(FlowError::Canceled.is_context_error());
        assert!(FlowError::DeadlineExceeded.is_context_error());
        assert!(!FlowError::Closed.is_context_error());
    }

    #[test]
    fn test_graph_error_converts() {
        let err: FlowError = GraphError::DuplicateKey(NodeKey::from("x")).into();
        assert!(matches!(err, FlowError::Graph(_)));
    }

    #[test]
    fn test_yaml_error_becomes_configuration() {
        let err: FlowError = serde_yaml::from_str::<u32>("[").unwrap_err().into();
        assert!(matches!(err, FlowError::Configuration(_)));
    }
}
