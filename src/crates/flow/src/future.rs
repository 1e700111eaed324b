//! Single-assignment awaitable results.
//!
//! An [`Awaitable`] is a cheaply clonable handle to a value that is produced at
//! most once and may be read by any number of tasks. Two flavours exist:
//!
//! ```text
//!   eager (spawn / pending)              inline (inline)
//!   ┌──────────────┐                     ┌──────────────┐
//!   │ tokio task   │──settle──┐          │ boxed future │◄── first reader polls
//!   └──────────────┘          ▼          └──────┬───────┘
//!                      ┌────────────┐           │ memoized
//!   yield_result() ──► │ watch cell │           ▼
//!                      └─────┬──────┘    every reader sees the
//!                            ▼           same settled result
//!                    readers wait_for
//! ```
//!
//! Eager awaitables start work immediately on a background task; whoever holds
//! a clone may also settle one directly with [`yield_result`](Awaitable::yield_result).
//! Only the first settlement counts. Inline awaitables do nothing until first
//! read; the reader drives the computation and later readers share the result.
//!
//! Computations are raced against the [`Context`] they were created with: if
//! the context is canceled or expires first, the awaitable settles with
//! [`FlowError::Canceled`] or [`FlowError::DeadlineExceeded`]. A panicking
//! computation settles with [`FlowError::Panicked`].

use crate::context::Context;
use crate::error::{FlowError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use xgraph::Value;

/// Outcome of an [`Awaitable`].
pub type Settled<T> = Result<T>;

/// Handle to a value produced at most once.
pub struct Awaitable<T = Value> {
    inner: Arc<Inner<T>>,
}

enum Inner<T> {
    Eager(Cell<T>),
    Inline(Shared<BoxFuture<'static, Settled<T>>>),
}

struct Cell<T> {
    completed: Mutex<bool>,
    state: watch::Sender<Option<Settled<T>>>,
}

impl<T: Clone> Cell<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            completed: Mutex::new(false),
            state,
        }
    }

    fn settle(&self, result: Settled<T>) -> bool {
        let mut completed = self.completed.lock();
        if *completed {
            return false;
        }
        *completed = true;
        self.state.send_replace(Some(result));
        true
    }

    fn peek(&self) -> Option<Settled<T>> {
        self.state.borrow().clone()
    }

    async fn wait(&self) -> Settled<T> {
        let mut rx = self.state.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(settled) = current {
                return settled;
            }
            if rx.changed().await.is_err() {
                return Err(FlowError::Shutdown("awaitable dropped".to_string()));
            }
        }
    }
}

impl<T> Awaitable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unsettled eager awaitable; settle it with [`yield_result`](Self::yield_result).
    pub fn pending() -> Self {
        Self {
            inner: Arc::new(Inner::Eager(Cell::new())),
        }
    }

    /// Already settled with `value`.
    pub fn ready(value: T) -> Self {
        let awaitable = Self::pending();
        awaitable.yield_value(value);
        awaitable
    }

    /// Already settled with `err`.
    pub fn failed(err: FlowError) -> Self {
        let awaitable = Self::pending();
        awaitable.yield_error(err);
        awaitable
    }

    /// Run `computation` on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(ctx: &Context, computation: F) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        let awaitable = Self::pending();
        let cell = awaitable.clone();
        let guarded = guard(ctx.clone(), computation);
        tokio::spawn(async move {
            cell.yield_result(guarded.await);
        });
        awaitable
    }

    /// Defer `computation` until the first read; later reads share its result.
    pub fn inline<F>(ctx: &Context, computation: F) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner::Inline(guard(ctx.clone(), computation).boxed().shared())),
        }
    }

    /// Settle with `result`. Returns `false` if already settled or inline.
    pub fn yield_result(&self, result: Settled<T>) -> bool {
        match &*self.inner {
            Inner::Eager(cell) => cell.settle(result),
            Inner::Inline(_) => false,
        }
    }

    pub fn yield_value(&self, value: T) -> bool {
        self.yield_result(Ok(value))
    }

    pub fn yield_error(&self, err: FlowError) -> bool {
        self.yield_result(Err(err))
    }

    /// Wait for the outcome.
    pub async fn result(&self) -> Settled<T> {
        match &*self.inner {
            Inner::Eager(cell) => cell.wait().await,
            Inner::Inline(shared) => shared.clone().await,
        }
    }

    /// Wait and return the value, `None` on error.
    pub async fn value(&self) -> Option<T> {
        self.result().await.ok()
    }

    /// Wait and return the error, `None` on success.
    pub async fn error(&self) -> Option<FlowError> {
        self.result().await.err()
    }

    /// Outcome if already settled, without waiting or driving inline work.
    pub fn peek(&self) -> Option<Settled<T>> {
        match &*self.inner {
            Inner::Eager(cell) => cell.peek(),
            Inner::Inline(shared) => shared.peek().cloned(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.peek(), Some(Err(FlowError::Canceled)))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.peek(), Some(Err(FlowError::DeadlineExceeded)))
    }

    pub fn is_inline(&self) -> bool {
        matches!(&*self.inner, Inner::Inline(_))
    }

    /// Whether both handles refer to the same underlying value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

async fn guard<T, F>(ctx: Context, computation: F) -> Settled<T>
where
    F: Future<Output = Settled<T>> + Send,
{
    let computation = AssertUnwindSafe(computation).catch_unwind();
    tokio::select! {
        biased;
        outcome = computation => {
            outcome.unwrap_or_else(|panic| Err(FlowError::Panicked(panic_message(&*panic))))
        }
        err = ctx.done() => Err(err),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<T> Clone for Awaitable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> IntoFuture for Awaitable<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Settled<T>;
    type IntoFuture = BoxFuture<'static, Settled<T>>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.result().await }.boxed()
    }
}

impl<T> fmt::Debug for Awaitable<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_inline() { "inline" } else { "eager" };
        match self.peek() {
            Some(Ok(value)) => write!(f, "Awaitable({}, Ok({:?}))", mode, value),
            Some(Err(err)) => write!(f, "Awaitable({}, Err({}))", mode, err),
            None => write!(f, "Awaitable({}, pending)", mode),
        }
    }
}
