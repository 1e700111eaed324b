//! # xgraph-flow - DAGs as concurrent dataflow pipelines
//!
//! `xgraph-flow` compiles an [`xgraph`] directed acyclic graph into a network of
//! workers connected by bounded channels, then runs any number of concurrent
//! *flows* through it. Each node's operator is applied to the results of its
//! upstream nodes once all of them are available; results travel as
//! [`Awaitable`]s so downstream work is wired up before upstream values exist.
//!
//! ## Core Concepts
//!
//! - **[`Awaitable`]** - single-assignment result, eager (background task) or
//!   inline (evaluated by the first reader)
//! - **Worker** - per node: a gather stage fanning in every inbound edge and a
//!   scatter stage grouping arrivals by flow id
//! - **[`analyze`]** - wires workers for a topologically sorted node list
//! - **[`Executor`]** - owns the compiled graph and exposes [`Executor::exec`]
//! - **[`FlowContext`]** - cancellation scope, flow id and result handle of a flow
//!
//! ## Node attributes
//!
//! Nodes may carry `timeout`, `max_workers`, `inline` and `edge_sorter`
//! attributes, see [`NodeAttributes`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use xgraph::{Attributes, BasicNode, DirectedGraph, EdgeKind};
//! use xgraph_flow::{Executor, FlowContext, Options};
//!
//! # async fn example() -> xgraph_flow::Result<()> {
//! let deps = EdgeKind(1);
//! let mut g = DirectedGraph::new();
//! for key in ["a", "b"] {
//!     g.add(BasicNode::new(key).into_ref())?;
//! }
//! g.add(
//!     BasicNode::new("sum")
//!         .with_operator(|args| Ok(json!(args.iter().filter_map(|v| v.as_i64()).sum::<i64>())))
//!         .into_ref(),
//! )?;
//! g.associate("a", deps, "sum", Attributes::new())?;
//! g.associate("b", deps, "sum", Attributes::new())?;
//!
//! let executor = Executor::new("adder", &g, deps, Options::default()).await?;
//!
//! // Inputs may arrive in separate calls; the returned context joins them.
//! let (ctx, result) = executor.exec(FlowContext::background(), [("a", json!(1))]).await?;
//! executor.exec(ctx, [("b", json!(2))]).await?;
//!
//! let outputs = result.await?;
//! assert_eq!(outputs["sum"].value().await, Some(json!(3)));
//! executor.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod analyze;
pub mod attributes;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod future;
pub mod gather;
pub mod logger;
pub mod node;
pub mod selector;
pub mod sort;
mod work;
pub mod worker;

pub use analyze::{analyze, CompiledGraph};
pub use attributes::{parse_duration, NodeAttributes};
pub use config::{LogMode, Options};
pub use context::{Context, FlowContext, FlowId};
pub use error::{FlowError, Result};
pub use executor::Executor;
pub use future::{Awaitable, Settled};
pub use gather::{Gather, Outputs};
pub use logger::{CapturingLogger, LogEntry, Logger, NoLogging, TracingLogger};
pub use node::FlowNode;
pub use sort::{edge_sorter, DEFAULT_EDGE_SORTER};
pub use worker::WorkerState;
