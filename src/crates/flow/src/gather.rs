//! Per-flow collection of upstream results.

use crate::context::{Context, FlowId};
use crate::error::{FlowError, Result};
use crate::future::Awaitable;
use std::collections::HashMap;
use xgraph::{NodeKey, Value};

/// Result of one flow: every output node mapped to its awaitable.
pub type Outputs = HashMap<NodeKey, Awaitable<Value>>;

/// Awaitables received by a node for one flow, keyed by the node that sent them.
#[derive(Clone, Debug, Default)]
pub struct Gather {
    entries: HashMap<NodeKey, Awaitable>,
}

impl Gather {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the awaitable sent by `from`, returning the one it replaced.
    pub fn insert(&mut self, from: NodeKey, future: Awaitable) -> Option<Awaitable> {
        self.entries.insert(from, future)
    }

    pub fn get(&self, from: &str) -> Option<&Awaitable> {
        self.entries.get(from)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every key in `required` has arrived.
    pub fn has_keys(&self, required: &[NodeKey]) -> bool {
        required.iter().all(|k| self.entries.contains_key(k))
    }

    /// Awaitables for `required`, in that order.
    pub fn futures_for(&self, flow: FlowId, required: &[NodeKey]) -> Result<Vec<Awaitable>> {
        required
            .iter()
            .map(|k| {
                self.entries
                    .get(k)
                    .cloned()
                    .ok_or_else(|| FlowError::MissingFuture {
                        flow,
                        node: k.clone(),
                    })
            })
            .collect()
    }

    /// Resolved values for `required`, in that order.
    ///
    /// Fails with the first upstream error, or with the context error if `ctx`
    /// finishes before every value is ready.
    pub async fn args(&self, ctx: &Context, flow: FlowId, required: &[NodeKey]) -> Result<Vec<Value>> {
        let futures = self.futures_for(flow, required)?;
        wait_all(ctx, &futures).await
    }

    pub fn into_outputs(self) -> Outputs {
        self.entries
    }
}

/// Wait for every awaitable, preserving order and failing fast.
pub async fn wait_all(ctx: &Context, futures: &[Awaitable]) -> Result<Vec<Value>> {
    let all = futures::future::try_join_all(futures.iter().map(Awaitable::result));
    tokio::select! {
        biased;
        err = ctx.done() => Err(err),
        values = all => values,
    }
}
