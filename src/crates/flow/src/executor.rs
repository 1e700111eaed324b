//! Executor: compiled graph plus the flow API.
//!
//! An [`Executor`] sorts and compiles a graph once, starts its workers, and then
//! accepts any number of concurrent flows. Each call to [`Executor::exec`] feeds
//! values into some of the graph inputs; calls sharing a [`FlowContext`] belong
//! to the same flow and are joined by flow id.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use xgraph::{Attributes, BasicNode, DirectedGraph, EdgeKind};
//! use xgraph_flow::{Executor, FlowContext, Options};
//!
//! # async fn example() -> xgraph_flow::Result<()> {
//! let deps = EdgeKind(1);
//! let mut g = DirectedGraph::new();
//! g.add(BasicNode::new("x").into_ref())?;
//! g.add(
//!     BasicNode::new("double")
//!         .with_operator(|args| Ok(json!(args[0].as_i64().unwrap_or(0) * 2)))
//!         .into_ref(),
//! )?;
//! g.associate("x", deps, "double", Attributes::new())?;
//!
//! let executor = Executor::new("doubler", &g, deps, Options::default()).await?;
//! let (_ctx, result) = executor.exec(FlowContext::background(), [("x", json!(21))]).await?;
//! let outputs = result.await?;
//! assert_eq!(outputs["double"].value().await, Some(json!(42)));
//! executor.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::analyze::{analyze, CompiledGraph};
use crate::config::Options;
use crate::context::{Context, FlowContext};
use crate::error::{FlowError, Result};
use crate::future::Awaitable;
use crate::gather::Outputs;
use crate::logger::Logger;
use crate::work::Work;
use crate::worker::WorkerState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use xgraph::{directed_sort, EdgeKind, Graph, NodeKey, Value};

/// Runs flows through a compiled graph.
pub struct Executor {
    graph: CompiledGraph,
    logger: Arc<dyn Logger>,
    shutdown: CancellationToken,
}

impl Executor {
    /// Sort, compile and start `graph` over edges of `kind`.
    ///
    /// `reference` names the graph in diagnostics and keys its terminal
    /// collector.
    pub async fn new(
        reference: impl Into<NodeKey>,
        graph: &dyn Graph,
        kind: EdgeKind,
        options: Options,
    ) -> Result<Self> {
        let ordered = directed_sort(graph, kind)?;
        let compiled = analyze(reference, graph, kind, &ordered, &options)?;
        compiled.run().await;
        Ok(Self {
            graph: compiled,
            logger: options.resolve_logger(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn reference(&self) -> &NodeKey {
        self.graph.reference()
    }

    /// Graph inputs, sorted by key.
    pub fn input_nodes(&self) -> &[NodeKey] {
        self.graph.input_nodes()
    }

    /// Graph outputs, sorted by key.
    pub fn output_nodes(&self) -> &[NodeKey] {
        self.graph.output_nodes()
    }

    /// Lifecycle state of every worker, see [`CompiledGraph::worker_states`].
    pub async fn worker_states(&self) -> Vec<(NodeKey, WorkerState)> {
        self.graph.worker_states().await
    }

    /// Feed plain values into graph inputs.
    ///
    /// See [`exec_awaitables`](Self::exec_awaitables).
    pub async fn exec<I, K>(&self, ctx: FlowContext, args: I) -> Result<(FlowContext, Awaitable<Outputs>)>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<NodeKey>,
    {
        let args = args
            .into_iter()
            .map(|(k, v)| (k, Awaitable::ready(v)));
        self.exec_awaitables(ctx, args).await
    }

    /// Feed awaitables into graph inputs.
    ///
    /// Every key must be a graph input, otherwise nothing is sent and
    /// [`FlowError::NotAnInput`] is returned. The first call on a context
    /// assigns its flow id and result handle; the returned context carries both,
    /// so passing it (or a context derived from it) to a later call supplies
    /// more inputs to the same flow.
    ///
    /// The result settles once every output node has produced its awaitable.
    /// If the context finishes before that, the result settles with every
    /// output mapped to the context error. This also covers flows whose
    /// partial gathers were swept after the context finished.
    pub async fn exec_awaitables<I, K>(
        &self,
        mut ctx: FlowContext,
        args: I,
    ) -> Result<(FlowContext, Awaitable<Outputs>)>
    where
        I: IntoIterator<Item = (K, Awaitable)>,
        K: Into<NodeKey>,
    {
        if self.graph.is_closed() {
            return Err(FlowError::Closed);
        }

        let args: BTreeMap<NodeKey, Awaitable> =
            args.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some(key) = args.keys().find(|k| !self.graph.is_input(k.as_str())) {
            return Err(FlowError::NotAnInput(key.clone()));
        }

        let (id, result) = ctx.stamp();
        let logger = ctx
            .logger()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.logger));
        let keys: Vec<&NodeKey> = args.keys().collect();
        logger.log(
            "Start flow run",
            format_args!("graph={} flow={} inputs={:?}", self.reference(), id, keys),
        );

        if self.graph.input_nodes().is_empty() {
            result.yield_value(Outputs::new());
        }

        for (key, payload) in args {
            let work = Work {
                ctx: ctx.context().clone(),
                id,
                from: key.clone(),
                payload,
                result: result.clone(),
                logger: Arc::clone(&logger),
            };
            self.graph.inject(&key, work).await?;
        }

        if !result.is_settled() {
            self.watch(ctx.context().clone(), result.clone());
        }
        Ok((ctx, result))
    }

    /// Settle `result` with failed outputs if `ctx` finishes first.
    fn watch(&self, ctx: Context, result: Awaitable<Outputs>) {
        let outputs = self.graph.output_nodes().to_vec();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let err = tokio::select! {
                _ = result.result() => return,
                err = ctx.done() => err,
                _ = shutdown.cancelled() => FlowError::Closed,
            };
            let failed = outputs
                .into_iter()
                .map(|k| (k, Awaitable::failed(err.clone())))
                .collect();
            result.yield_value(failed);
        });
    }

    /// Stop every worker. Safe to call more than once.
    ///
    /// Flows still waiting for inputs settle with [`FlowError::Closed`].
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.graph.close().await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("graph", &self.graph).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xgraph::{Attributes, BasicNode, DirectedGraph};

    const DEPS: EdgeKind = EdgeKind(1);

    fn pair_graph() -> DirectedGraph {
        let mut g = DirectedGraph::new();
        g.add(BasicNode::new("a").into_ref()).unwrap();
        g.add(BasicNode::new("b").into_ref()).unwrap();
        g.add(
            BasicNode::new("join")
                .with_operator(|args| Ok(json!(format!("{}+{}", args[0], args[1]))))
                .into_ref(),
        )
        .unwrap();
        g.associate("a", DEPS, "join", Attributes::new()).unwrap();
        g.associate("b", DEPS, "join", Attributes::new()).unwrap();
        g
    }

    #[tokio::test]
    async fn test_exec_single_call() {
        let executor = Executor::new("pair", &pair_graph(), DEPS, Options::default())
            .await
            .unwrap();
        assert_eq!(executor.input_nodes(), &[NodeKey::from("a"), NodeKey::from("b")]);
        assert_eq!(executor.output_nodes(), &[NodeKey::from("join")]);

        let (ctx, result) = executor
            .exec(FlowContext::background(), [("a", json!(1)), ("b", json!(2))])
            .await
            .unwrap();
        assert!(ctx.flow_id().is_some());
        let outputs = result.await.unwrap();
        assert_eq!(outputs["join"].value().await, Some(json!("1+2")));
        executor.close().await.unwrap();
        let states = executor.worker_states().await;
        assert_eq!(states.len(), 4);
        assert!(states.iter().all(|(_, s)| *s == WorkerState::Stopped));
    }

    #[tokio::test]
    async fn test_not_an_input_sends_nothing() {
        let executor = Executor::new("pair", &pair_graph(), DEPS, Options::default())
            .await
            .unwrap();
        let err = executor
            .exec(FlowContext::background(), [("a", json!(1)), ("join", json!(2))])
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::NotAnInput(NodeKey::from("join")));
        executor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_exec_after_close_fails() {
        let executor = Executor::new("pair", &pair_graph(), DEPS, Options::default())
            .await
            .unwrap();
        executor.close().await.unwrap();
        executor.close().await.unwrap();
        let err = executor
            .exec(FlowContext::background(), [("a", json!(1))])
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Closed);
    }

    #[tokio::test]
    async fn test_close_settles_incomplete_flows() {
        let executor = Executor::new("pair", &pair_graph(), DEPS, Options::default())
            .await
            .unwrap();
        let (_, result) = executor
            .exec(FlowContext::background(), [("a", json!(1))])
            .await
            .unwrap();
        executor.close().await.unwrap();
        let outputs = result.await.unwrap();
        assert_eq!(outputs["join"].error().await, Some(FlowError::Closed));
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let mut g = pair_graph();
        g.associate("join", DEPS, "a", Attributes::new()).unwrap();
        let err = Executor::new("pair", &g, DEPS, Options::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Graph(_)));
    }
}
