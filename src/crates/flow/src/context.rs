//! Cancellation scopes and per-flow execution context.
//!
//! [`Context`] is a cancellation token plus an optional deadline. Derived
//! contexts are canceled with their parent and never outlive its deadline.
//!
//! [`FlowContext`] is what callers thread through
//! [`Executor::exec`](crate::Executor::exec): it wraps a [`Context`] and carries
//! the flow id, the flow's result handle and an optional logger. The executor
//! fills the flow id and result handle on the first call and hands the updated
//! context back, so a later call made with it joins the same flow.

use crate::error::FlowError;
use crate::future::Awaitable;
use crate::gather::Outputs;
use crate::logger::Logger;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifier shared by every value belonging to one execution of a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(Uuid);

impl FlowId {
    /// Fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FlowId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cancellation token with an optional deadline.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never canceled unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derived context that can be canceled without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derived context expiring after `timeout`, or earlier if `self` does.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derived context expiring at `deadline`, or earlier if `self` does.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<FlowError> {
        if self.token.is_cancelled() {
            Some(FlowError::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(FlowError::DeadlineExceeded)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is canceled or expired.
    pub async fn done(&self) -> FlowError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => FlowError::Canceled,
                _ = tokio::time::sleep_until(deadline) => FlowError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                FlowError::Canceled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Execution context for one flow.
#[derive(Clone)]
pub struct FlowContext {
    ctx: Context,
    flow_id: Option<FlowId>,
    result: Option<Awaitable<Outputs>>,
    logger: Option<Arc<dyn Logger>>,
}

impl FlowContext {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            flow_id: None,
            result: None,
            logger: None,
        }
    }

    pub fn background() -> Self {
        Self::new(Context::background())
    }

    /// Use `logger` for this flow instead of the executor's.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Pin the flow id instead of letting the executor generate one.
    pub fn with_flow_id(mut self, id: FlowId) -> Self {
        self.flow_id = Some(id);
        self
    }

    /// Same flow, derived cancellation scope expiring after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            ctx: self.ctx.with_timeout(timeout),
            ..self.clone()
        }
    }

    /// Same flow, derived cancellation scope.
    pub fn child(&self) -> Self {
        Self {
            ctx: self.ctx.child(),
            ..self.clone()
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn flow_id(&self) -> Option<FlowId> {
        self.flow_id
    }

    /// Result handle of the flow, once the executor has started it.
    pub fn result(&self) -> Option<&Awaitable<Outputs>> {
        self.result.as_ref()
    }

    pub fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.logger.as_ref()
    }

    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Assign a flow id and result handle unless already present.
    pub(crate) fn stamp(&mut self) -> (FlowId, Awaitable<Outputs>) {
        let id = *self.flow_id.get_or_insert_with(FlowId::new);
        let result = self.result.get_or_insert_with(Awaitable::pending).clone();
        (id, result)
    }
}

impl From<Context> for FlowContext {
    fn from(ctx: Context) -> Self {
        Self::new(ctx)
    }
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext")
            .field("ctx", &self.ctx)
            .field("flow_id", &self.flow_id)
            .field("started", &self.result.is_some())
            .finish()
    }
}
