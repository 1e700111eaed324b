//! Graph compiler: turns a sorted node list into a wired set of workers.
//!
//! # Wiring
//!
//! Nodes are visited in topological order. For every node:
//!
//! 1. each outbound edge gets a bounded channel; the sender goes to this
//!    node's scatter stage, the receiver is parked under the edge id
//! 2. inbound edges are ordered with the node's edge sorter and their parked
//!    receivers are claimed, in that order, for the gather stage
//! 3. a node with no inbound edges becomes a graph **input**: the executor
//!    writes straight into its collector
//! 4. a node with no outbound edges becomes a graph **output**: it gets an
//!    exit channel into the terminal collector
//!
//! ```text
//!   x1 ──┐
//!   x2 ──┼─► sumX ──┐
//!   x3 ──┤          ├─► ratio ──► [terminal collector] ──► flow result
//!   y1 ──┼─► sumY ──┘
//!   y2 ──┘
//! ```
//!
//! The terminal collector is keyed by the graph's reference name and gathers
//! every output (sorted by key) for each flow.

use crate::attributes::NodeAttributes;
use crate::config::Options;
use crate::error::{FlowError, Result};
use crate::logger::Logger;
use crate::node::FlowNode;
use crate::sort::edge_sorter;
use crate::work::Work;
use crate::worker::{Worker, WorkerSpec, WorkerState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use xgraph::{from_keys, sort_edges, EdgeId, EdgeKind, Graph, NodeKey, NodeRef};

/// A compiled, runnable graph.
pub struct CompiledGraph {
    reference: NodeKey,
    inputs: HashMap<NodeKey, mpsc::Sender<Work>>,
    input_keys: Vec<NodeKey>,
    outputs: Vec<NodeKey>,
    workers: Mutex<Vec<Worker>>,
    closed: AtomicBool,
    logger: Arc<dyn Logger>,
}

/// Compile `ordered` (topologically sorted by `kind`) into workers.
///
/// `reference` names the terminal collector. Fails with
/// [`FlowError::MissingChannel`] if a node appears before one of its
/// producers.
pub fn analyze(
    reference: impl Into<NodeKey>,
    graph: &dyn Graph,
    kind: EdgeKind,
    ordered: &[NodeRef],
    options: &Options,
) -> Result<CompiledGraph> {
    options.validate()?;
    let reference = reference.into();
    let capacity = options.channel_capacity;
    let logger = options.resolve_logger();

    let mut links: HashMap<EdgeId, mpsc::Receiver<Work>> = HashMap::new();
    let mut inputs = HashMap::new();
    let mut exits: Vec<(NodeKey, mpsc::Receiver<Work>)> = Vec::new();
    let mut workers = Vec::with_capacity(ordered.len() + 1);

    for node in ordered {
        let key = node.key();
        let attributes =
            NodeAttributes::from_attributes(node.attributes()).map_err(|e| FlowError::Attributes {
                node: key.clone(),
                message: e.to_string(),
            })?;

        let from = graph.outbound(key, kind);
        let mut outbound = Vec::with_capacity(from.len() + 1);
        for edge in &from {
            let (tx, rx) = mpsc::channel(capacity);
            links.insert(edge.id(), rx);
            outbound.push(tx);
        }

        let mut to = graph.inbound(kind, key);
        let sorter = attributes
            .edge_sorter
            .as_deref()
            .or(options.default_edge_sorter.as_deref());
        sort_edges(&mut to, edge_sorter(sorter));
        let mut inbound = Vec::with_capacity(to.len());
        for edge in &to {
            let rx = links
                .remove(&edge.id())
                .ok_or_else(|| FlowError::MissingChannel {
                    edge: edge.to_string(),
                })?;
            inbound.push(rx);
        }

        if from.is_empty() {
            let (tx, rx) = mpsc::channel(capacity);
            outbound.push(tx);
            exits.push((key.clone(), rx));
        }

        let (collect_tx, collect_rx) = mpsc::channel(capacity);
        if to.is_empty() {
            inputs.insert(key.clone(), collect_tx.clone());
        }

        let input_from = from_keys(&to);
        logger.log(
            "Compiled node",
            format_args!(
                "node={} inputs={:?} outbound={}",
                key,
                input_from,
                outbound.len()
            ),
        );
        workers.push(Worker::new(
            WorkerSpec {
                node: FlowNode::resolve(node),
                attributes,
                input_from,
                inbound,
                outbound,
                collect_tx,
                collect_rx,
                terminal: false,
            },
            options,
        ));
    }

    exits.sort_by(|a, b| a.0.cmp(&b.0));
    let (outputs, exit_rx): (Vec<_>, Vec<_>) = exits.into_iter().unzip();
    let (collect_tx, collect_rx) = mpsc::channel(capacity);
    workers.push(Worker::new(
        WorkerSpec {
            node: FlowNode::plain(reference.clone()),
            attributes: NodeAttributes::default(),
            input_from: outputs.clone(),
            inbound: exit_rx,
            outbound: Vec::new(),
            collect_tx,
            collect_rx,
            terminal: true,
        },
        options,
    ));

    let mut input_keys: Vec<NodeKey> = inputs.keys().cloned().collect();
    input_keys.sort();
    logger.log(
        "Compiled graph",
        format_args!("graph={} inputs={:?} outputs={:?}", reference, input_keys, outputs),
    );

    Ok(CompiledGraph {
        reference,
        inputs,
        input_keys,
        outputs,
        workers: Mutex::new(workers),
        closed: AtomicBool::new(false),
        logger,
    })
}

impl CompiledGraph {
    /// Name of the terminal collector.
    pub fn reference(&self) -> &NodeKey {
        &self.reference
    }

    /// Nodes without inbound edges, sorted by key.
    pub fn input_nodes(&self) -> &[NodeKey] {
        &self.input_keys
    }

    /// Nodes without outbound edges, sorted by key.
    pub fn output_nodes(&self) -> &[NodeKey] {
        &self.outputs
    }

    pub fn is_input(&self, key: &str) -> bool {
        self.inputs.contains_key(key)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Lifecycle state of every worker in compile order, terminal collector last.
    pub async fn worker_states(&self) -> Vec<(NodeKey, WorkerState)> {
        let workers = self.workers.lock().await;
        workers.iter().map(|w| (w.key().clone(), w.state())).collect()
    }

    /// Start every worker, returning once all of them are accepting work.
    pub async fn run(&self) {
        let mut workers = self.workers.lock().await;
        for worker in workers.iter_mut() {
            worker.run().await;
        }
        self.logger.log(
            "Graph running",
            format_args!("graph={} workers={}", self.reference, workers.len()),
        );
    }

    /// Stop every worker. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut workers = self.workers.lock().await;
        let mut first_error = None;
        for worker in workers.iter_mut() {
            if let Err(e) = worker.close().await {
                first_error.get_or_insert(e);
            }
        }
        self.logger.log("Graph closed", format_args!("graph={}", self.reference));
        first_error.map_or(Ok(()), Err)
    }

    /// Deliver `work` to the collector of input node `key`.
    pub(crate) async fn inject(&self, key: &NodeKey, work: Work) -> Result<()> {
        let tx = self
            .inputs
            .get(key)
            .ok_or_else(|| FlowError::NotAnInput(key.clone()))?;
        tx.send(work).await.map_err(|_| FlowError::Closed)
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("reference", &self.reference)
            .field("inputs", &self.input_keys)
            .field("outputs", &self.outputs)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xgraph::{directed_sort, Attributes, BasicNode, DirectedGraph};

    const DEPS: EdgeKind = EdgeKind(1);

    fn diamond() -> DirectedGraph {
        let mut g = DirectedGraph::new();
        g.add_all(["a", "b", "c", "d"].map(|k| BasicNode::new(k).into_ref()))
            .unwrap();
        for (from, to) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            g.associate(from, DEPS, to, Attributes::new()).unwrap();
        }
        g
    }

    #[tokio::test]
    async fn test_inputs_and_outputs() {
        let g = diamond();
        let ordered = directed_sort(&g, DEPS).unwrap();
        let compiled = analyze("diamond", &g, DEPS, &ordered, &Options::default()).unwrap();
        assert_eq!(compiled.reference().as_str(), "diamond");
        assert_eq!(compiled.input_nodes(), &[NodeKey::from("a")]);
        assert_eq!(compiled.output_nodes(), &[NodeKey::from("d")]);
        assert!(compiled.is_input("a"));
        assert!(!compiled.is_input("d"));
    }

    #[tokio::test]
    async fn test_unsorted_nodes_report_missing_channel() {
        let g = diamond();
        let mut ordered = directed_sort(&g, DEPS).unwrap();
        ordered.reverse();
        let err = analyze("diamond", &g, DEPS, &ordered, &Options::default()).unwrap_err();
        assert!(matches!(err, FlowError::MissingChannel { .. }));
    }

    #[tokio::test]
    async fn test_bad_attributes_are_reported() {
        let mut g = DirectedGraph::new();
        g.add(BasicNode::new("a").with_attribute("timeout", json!("soon")).into_ref())
            .unwrap();
        g.add(BasicNode::new("b").into_ref()).unwrap();
        g.associate("a", DEPS, "b", Attributes::new()).unwrap();
        let ordered = directed_sort(&g, DEPS).unwrap();
        let err = analyze("g", &g, DEPS, &ordered, &Options::default()).unwrap_err();
        assert!(matches!(err, FlowError::Attributes { node, .. } if node.as_str() == "a"));
    }

    #[tokio::test]
    async fn test_run_and_close_are_idempotent() {
        let g = diamond();
        let ordered = directed_sort(&g, DEPS).unwrap();
        let compiled = analyze("diamond", &g, DEPS, &ordered, &Options::default()).unwrap();
        let states = compiled.worker_states().await;
        assert_eq!(states.len(), 5);
        assert!(states.iter().all(|(_, s)| *s == WorkerState::NotStarted));
        assert_eq!(states[4].0.as_str(), "diamond");

        compiled.run().await;
        compiled.run().await;
        assert!(compiled
            .worker_states()
            .await
            .iter()
            .all(|(_, s)| *s == WorkerState::Running));
        compiled.close().await.unwrap();
        compiled.close().await.unwrap();
        assert!(compiled.is_closed());
        assert!(compiled
            .worker_states()
            .await
            .iter()
            .all(|(_, s)| *s == WorkerState::Stopped));
    }
}
