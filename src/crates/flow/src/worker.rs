//! Per-node worker: a gather stage and a scatter stage.
//!
//! ```text
//!   inbound edges            collector              outbound edges
//!   ───────────►┐                                  ┌──────────────►
//!   ───────────►├─ gather ──► [ mpsc ] ──► scatter ─┼──────────────►
//!   ───────────►┘   (fan-in)    ▲         (per-flow └──────────────►
//!                               │          gathering)
//!             executor injects ─┘ (graph inputs only)
//! ```
//!
//! The gather stage merges every inbound edge into the collector. The scatter
//! stage groups arriving work by flow id; once a flow has an awaitable from
//! every upstream node it derives the node's own awaitable and sends it down
//! every outbound edge. Nodes without inbound edges forward the injected
//! awaitable unchanged.
//!
//! The terminal collector is a worker too. Instead of forwarding, it settles
//! the flow's result with the gathered output awaitables.

use crate::attributes::NodeAttributes;
use crate::config::Options;
use crate::context::{Context, FlowId};
use crate::error::{FlowError, Result};
use crate::future::Awaitable;
use crate::gather::Gather;
use crate::logger::Logger;
use crate::node::FlowNode;
use crate::selector::select_into;
use crate::work::Work;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use xgraph::{NodeKey, Value};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Gather,
    Scatter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Gather => f.write_str("gather"),
            Stage::Scatter => f.write_str("scatter"),
        }
    }
}

/// Everything the compiler wires up for one worker.
pub(crate) struct WorkerSpec {
    pub node: FlowNode,
    pub attributes: NodeAttributes,
    /// Upstream keys in argument order.
    pub input_from: Vec<NodeKey>,
    /// One receiver per inbound edge, same order as `input_from`.
    pub inbound: Vec<mpsc::Receiver<Work>>,
    /// One sender per outbound edge (plus the exit channel for outputs).
    pub outbound: Vec<mpsc::Sender<Work>>,
    pub collect_tx: mpsc::Sender<Work>,
    pub collect_rx: mpsc::Receiver<Work>,
    /// Settle the flow result instead of forwarding.
    pub terminal: bool,
}

pub(crate) struct Worker {
    key: NodeKey,
    state: WorkerState,
    stop: CancellationToken,
    gather: Option<GatherStage>,
    scatter: Option<ScatterStage>,
    handles: Vec<(Stage, JoinHandle<()>)>,
    logger: Arc<dyn Logger>,
}

struct GatherStage {
    inbound: Vec<mpsc::Receiver<Work>>,
    collect: mpsc::Sender<Work>,
}

struct ScatterStage {
    node: FlowNode,
    attributes: NodeAttributes,
    input_from: Arc<[NodeKey]>,
    collect: mpsc::Receiver<Work>,
    outbound: Vec<mpsc::Sender<Work>>,
    semaphore: Option<Arc<Semaphore>>,
    terminal: bool,
    sweep_interval: Duration,
    stop: CancellationToken,
    logger: Arc<dyn Logger>,
}

struct PendingFlow {
    ctx: Context,
    gathered: Gather,
}

enum Event {
    Work(Work),
    Sweep,
    Exit,
}

impl Worker {
    pub fn new(spec: WorkerSpec, options: &Options) -> Self {
        let logger = options.resolve_logger();
        let stop = CancellationToken::new();
        let semaphore = match spec.attributes.max_workers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let key = spec.node.key().clone();
        Self {
            key,
            state: WorkerState::NotStarted,
            stop: stop.clone(),
            gather: Some(GatherStage {
                inbound: spec.inbound,
                collect: spec.collect_tx,
            }),
            scatter: Some(ScatterStage {
                node: spec.node,
                attributes: spec.attributes,
                input_from: spec.input_from.into(),
                collect: spec.collect_rx,
                outbound: spec.outbound,
                semaphore,
                terminal: spec.terminal,
                sweep_interval: options.sweep_interval.max(Duration::from_millis(1)),
                stop,
                logger: Arc::clone(&logger),
            }),
            handles: Vec::with_capacity(2),
            logger,
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Start both stages and return once both are polling.
    pub async fn run(&mut self) {
        if self.state != WorkerState::NotStarted {
            return;
        }
        let (Some(gather), Some(scatter)) = (self.gather.take(), self.scatter.take()) else {
            return;
        };

        let (gather_ready, gather_started) = oneshot::channel();
        let (scatter_ready, scatter_started) = oneshot::channel();

        let stop = self.stop.clone();
        let logger = Arc::clone(&self.logger);
        let key = self.key.clone();
        self.handles.push((
            Stage::Gather,
            tokio::spawn(async move {
                let _ = gather_ready.send(());
                let exit = select_into(stop, gather.inbound, gather.collect).await;
                logger.log("Gather stage exited", format_args!("node={} reason={:?}", key, exit));
            }),
        ));
        self.handles
            .push((Stage::Scatter, tokio::spawn(scatter.run(scatter_ready))));

        let _ = gather_started.await;
        let _ = scatter_started.await;
        self.state = WorkerState::Running;
        self.logger.log("Worker running", format_args!("node={}", self.key));
    }

    /// Stop both stages and wait for them. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            WorkerState::Stopped => return Ok(()),
            WorkerState::NotStarted => {
                self.gather = None;
                self.scatter = None;
                self.state = WorkerState::Stopped;
                return Ok(());
            }
            WorkerState::Running | WorkerState::Stopping => {}
        }

        self.state = WorkerState::Stopping;
        self.stop.cancel();

        let mut first_error = None;
        for (stage, handle) in self.handles.drain(..) {
            if let Err(e) = handle.await {
                self.logger.warn(
                    "Worker stage failed",
                    format_args!("node={} stage={} error={}", self.key, stage, e),
                );
                first_error.get_or_insert_with(|| {
                    FlowError::Shutdown(format!("{} stage of node '{}': {}", stage, self.key, e))
                });
            }
        }
        self.state = WorkerState::Stopped;
        self.logger.log("Worker stopped", format_args!("node={}", self.key));
        first_error.map_or(Ok(()), Err)
    }
}

impl ScatterStage {
    async fn run(mut self, ready: oneshot::Sender<()>) {
        let mut pending: HashMap<FlowId, PendingFlow> = HashMap::new();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = ready.send(());

        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => Event::Exit,
                next = self.collect.recv() => next.map_or(Event::Exit, Event::Work),
                _ = sweep.tick() => Event::Sweep,
            };
            match event {
                Event::Work(work) => self.accept(&mut pending, work).await,
                Event::Sweep => self.sweep(&mut pending),
                Event::Exit => break,
            }
        }

        self.logger.log(
            "Scatter stage exited",
            format_args!("node={} pending={}", self.node.key(), pending.len()),
        );
    }

    async fn accept(&self, pending: &mut HashMap<FlowId, PendingFlow>, work: Work) {
        let key = self.node.key();
        work.logger.log(
            "Got work",
            format_args!("node={} flow={} from={}", key, work.id, work.from),
        );

        let flow = pending.entry(work.id).or_insert_with(|| PendingFlow {
            ctx: work.ctx.clone(),
            gathered: Gather::new(),
        });
        if let Some(previous) = flow.gathered.insert(work.from.clone(), work.payload.clone()) {
            work.logger.warn(
                "Duplicate awaitable",
                format_args!(
                    "node={} flow={} from={} old={:?} new={:?}",
                    key, work.id, work.from, previous, work.payload
                ),
            );
        }
        if !flow.gathered.has_keys(&self.input_from) {
            return;
        }
        let Some(flow) = pending.remove(&work.id) else {
            return;
        };

        if self.terminal {
            work.logger.log(
                "Flow complete",
                format_args!("flow={} outputs={}", work.id, flow.gathered.len()),
            );
            work.result.yield_value(flow.gathered.into_outputs());
            return;
        }

        let payload = if self.input_from.is_empty() {
            work.payload.clone()
        } else {
            self.evaluate(&work, flow.gathered)
        };
        self.dispatch(work.forward(key.clone(), payload)).await;
    }

    fn evaluate(&self, work: &Work, gathered: Gather) -> Awaitable {
        let ctx = if self.attributes.timeout.is_zero() {
            work.ctx.clone()
        } else {
            work.ctx.with_timeout(self.attributes.timeout)
        };
        let computation = compute(
            self.node.clone(),
            Arc::clone(&self.input_from),
            self.semaphore.clone(),
            work.id,
            ctx.clone(),
            gathered,
        );
        if self.attributes.inline {
            Awaitable::inline(&ctx, computation)
        } else {
            Awaitable::spawn(&ctx, computation)
        }
    }

    async fn dispatch(&self, work: Work) {
        for (index, tx) in self.outbound.iter().enumerate() {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return,
                sent = tx.send(work.clone()) => {
                    if sent.is_err() {
                        self.logger.warn(
                            "Downstream closed",
                            format_args!("node={} edge={} flow={}", self.node.key(), index, work.id),
                        );
                    }
                }
            }
        }
    }

    fn sweep(&self, pending: &mut HashMap<FlowId, PendingFlow>) {
        let key = self.node.key();
        pending.retain(|id, flow| match flow.ctx.err() {
            None => true,
            Some(err) => {
                self.logger.warn(
                    "Dropping abandoned flow",
                    format_args!(
                        "node={} flow={} reason={} received={}",
                        key,
                        id,
                        err,
                        flow.gathered.len()
                    ),
                );
                false
            }
        });
    }
}

/// Resolve the gathered arguments and apply the node.
async fn compute(
    node: FlowNode,
    input_from: Arc<[NodeKey]>,
    semaphore: Option<Arc<Semaphore>>,
    flow: FlowId,
    ctx: Context,
    gathered: Gather,
) -> Result<Value> {
    let args = gathered.args(&ctx, flow, &input_from).await?;
    let Some(operator) = node.operator() else {
        let object = input_from.iter().map(|k| k.to_string()).zip(args).collect();
        return Ok(Value::Object(object));
    };
    let _permit = match semaphore {
        Some(semaphore) => Some(
            semaphore
                .acquire_owned()
                .await
                .map_err(|_| FlowError::Shutdown(format!("worker pool of '{}' closed", node.key())))?,
        ),
        None => None,
    };
    operator(args).map_err(|e| FlowError::operator(node.key(), e))
}
