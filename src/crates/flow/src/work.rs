//! Messages exchanged between workers.

use crate::context::{Context, FlowId};
use crate::future::Awaitable;
use crate::gather::Outputs;
use crate::logger::Logger;
use std::fmt;
use std::sync::Arc;
use xgraph::NodeKey;

/// One upstream result travelling along an edge.
#[derive(Clone)]
pub(crate) struct Work {
    /// Cancellation scope of the flow.
    pub ctx: Context,
    pub id: FlowId,
    /// Node that produced `payload`; the injecting node for graph inputs.
    pub from: NodeKey,
    pub payload: Awaitable,
    /// Settled by the terminal collector once every output has arrived.
    pub result: Awaitable<Outputs>,
    pub logger: Arc<dyn Logger>,
}

impl Work {
    /// Same flow, new sender and payload.
    pub fn forward(&self, from: NodeKey, payload: Awaitable) -> Self {
        Self {
            ctx: self.ctx.clone(),
            id: self.id,
            from,
            payload,
            result: self.result.clone(),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("payload", &self.payload)
            .finish()
    }
}
